//! Persistence port.
//!
//! The session engine mirrors every routed message to a `Persister`. Which
//! backend sits behind the trait is a startup decision made by the binary;
//! the engine only relies on the call returning promptly and treats failure
//! as non-fatal (logged, routing proceeds).

use async_trait::async_trait;

use crate::errors::PersistError;
use crate::message::Message;

/// Capability to durably record a routed message
#[async_trait]
pub trait Persister: Send + Sync {
    /// Record one message. Best-effort relative to delivery: errors are
    /// reported to the caller but must never block routing indefinitely.
    async fn persist(&self, message: &Message) -> Result<(), PersistError>;
}
