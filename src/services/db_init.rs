use mongodb::{bson::doc, options::IndexOptions, Database, IndexModel};

use crate::error::Result;
use crate::services::notification_store::COLLECTION;

pub async fn ensure_indexes(db: &Database) -> Result<()> {
    let col = db.collection::<mongodb::bson::Document>(COLLECTION);

    // monitor scan: active notifications grouped by market
    {
        let model = IndexModel::builder()
            .keys(doc! { "is_active": 1, "symbol": 1, "quote": 1 })
            .options(IndexOptions::builder().name("active_market".to_string()).build())
            .build();

        col.create_index(model, None).await?;
    }

    // per-user listing, newest first
    {
        let model = IndexModel::builder()
            .keys(doc! { "chat_id": 1, "created_at": -1 })
            .build();

        col.create_index(model, None).await?;
    }

    Ok(())
}
