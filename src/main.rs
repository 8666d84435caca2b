use std::net::SocketAddr;
use std::sync::Arc;

use mongodb::Client;

use cryptoalerts::config::{self, StoreBackend};
use cryptoalerts::error::{AlertError, Result};
use cryptoalerts::services::alert_monitor::AlertMonitor;
use cryptoalerts::services::db_init;
use cryptoalerts::services::notification_store::{
    MemoryNotificationStore, MongoNotificationStore, NotificationStore,
};
use cryptoalerts::services::price_feed::{BingxClient, PriceFeed};
use cryptoalerts::{routes, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "cryptoalerts stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let settings = config::load()?;
    settings.validate()?;

    let store: Arc<dyn NotificationStore> = match settings.store_backend {
        StoreBackend::Mongo => {
            let client = Client::with_uri_str(&settings.mongodb_uri).await?;
            let db = client.database(&settings.mongodb_db);
            db_init::ensure_indexes(&db).await?;
            Arc::new(MongoNotificationStore::new(db))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; notifications are lost on restart");
            Arc::new(MemoryNotificationStore::new())
        }
    };

    let feed: Arc<dyn PriceFeed> = Arc::new(BingxClient::new(
        settings.bingx_api_url.clone(),
        settings.bingx_api_key.clone(),
    ));

    let state = AppState::new(settings.clone(), store, feed);

    let monitor = AlertMonitor::new(Arc::clone(&state.engine));
    let app = routes::app(state);

    let ip = settings
        .host
        .parse::<std::net::IpAddr>()
        .map_err(|e| AlertError::Config {
            field: "HOST",
            reason: e.to_string(),
        })?;
    let addr = SocketAddr::from((ip, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    monitor.start(settings.tick_interval())?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await;

    monitor.stop().await;

    Ok(served?)
}
