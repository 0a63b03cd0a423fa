use redis::AsyncCommands;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::documents::models::{DocumentId, DocumentStatus};

/// Redis pub/sub channel document events are forwarded to.
pub const REDIS_CHANNEL: &str = "documents:events";

/// Everything observable about a document's lifecycle, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentEvent {
    Created {
        document_id: DocumentId,
        filename: String,
    },
    Progress {
        document_id: DocumentId,
        percent: u8,
    },
    StatusChanged {
        document_id: DocumentId,
        from: DocumentStatus,
        to: DocumentStatus,
    },
    Deleted {
        document_id: DocumentId,
    },
}

impl DocumentEvent {
    pub fn document_id(&self) -> DocumentId {
        match self {
            DocumentEvent::Created { document_id, .. }
            | DocumentEvent::Progress { document_id, .. }
            | DocumentEvent::StatusChanged { document_id, .. }
            | DocumentEvent::Deleted { document_id } => *document_id,
        }
    }
}

/// Republishes every in-process event to Redis as JSON. Runs until the
/// registry (and with it the broadcast sender) is dropped.
pub async fn spawn_redis_forwarder(
    client: redis::Client,
    mut events: broadcast::Receiver<DocumentEvent>,
) -> anyhow::Result<JoinHandle<()>> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    info!("Forwarding document events to Redis channel '{REDIS_CHANNEL}'");

    Ok(tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Redis forwarder lagged, {skipped} events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let payload = match serde_json::to_string(&event) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Could not serialize event for {}: {e}", event.document_id());
                    continue;
                }
            };

            if let Err(e) = conn.publish::<_, _, ()>(REDIS_CHANNEL, payload).await {
                warn!("Redis publish failed: {e}");
            }
        }
        info!("Redis event forwarder stopped");
    }))
}
