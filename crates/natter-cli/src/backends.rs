//! Persistence backends behind the core `Persister` port.
//!
//! Two variants, selected once at startup from configuration: a console sink
//! that logs every routed message, and a JSON-lines sink that appends each
//! message to a file. Both are best-effort; the engine routes on regardless
//! of what they return.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

use natter_core::{Message, PersistError, Persister};

use crate::config::{BackendConfig, BackendKind};
use crate::error::Result;

/// Build the configured backend
pub async fn select(config: &BackendConfig) -> Result<Arc<dyn Persister>> {
    match config.kind {
        BackendKind::Console => Ok(Arc::new(ConsoleSink)),
        BackendKind::Jsonl => Ok(Arc::new(JsonlSink::create(&config.path).await?)),
    }
}

// ----------------------------------------------------------------------------
// Console Sink
// ----------------------------------------------------------------------------

/// Logs each persisted message to the server's own output
pub struct ConsoleSink;

#[async_trait]
impl Persister for ConsoleSink {
    async fn persist(&self, message: &Message) -> std::result::Result<(), PersistError> {
        if message.is_broadcast() {
            info!(sender = %message.sender, "message: {} -> global : {}", message.sender, message.text);
        } else {
            info!(
                sender = %message.sender,
                "message: {} -> {} : {}",
                message.sender,
                message.recipient,
                message.text
            );
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// JSON-Lines Sink
// ----------------------------------------------------------------------------

/// Appends each persisted message as one JSON object per line
pub struct JsonlSink {
    writer: Mutex<BufWriter<tokio::fs::File>>,
}

impl JsonlSink {
    /// Open (or create) the output file in append mode
    pub async fn create(path: &std::path::Path) -> std::result::Result<Self, PersistError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

#[async_trait]
impl Persister for JsonlSink {
    async fn persist(&self, message: &Message) -> std::result::Result<(), PersistError> {
        let mut line = serde_json::to_string(message).map_err(|e| PersistError::Backend {
            reason: e.to_string(),
        })?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
