use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::models::TriggerEvent;

/// Delivers trigger events to users. Retrying delivery is the implementor's concern.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn emit(&self, event: &TriggerEvent) -> Result<()>;
}

/// Fans trigger events out to every live subscriber (the SSE stream).
#[derive(Clone)]
pub struct BroadcastDispatcher {
    tx: broadcast::Sender<TriggerEvent>,
}

impl BroadcastDispatcher {
    pub fn new(tx: broadcast::Sender<TriggerEvent>) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TriggerEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Dispatcher for BroadcastDispatcher {
    async fn emit(&self, event: &TriggerEvent) -> Result<()> {
        tracing::info!(
            notification_id = %event.notification_id,
            chat_id = %event.chat_id,
            market = %event.market,
            "{}",
            event.message()
        );

        // no subscribers is fine, the event is already logged
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}
