//! Shared registry of live sessions.
//!
//! The registry is touched concurrently by the acceptor (insert), every
//! reader loop (remove on exit), and the router (lookups and snapshots on
//! every routed message). All of that goes through one mutex, so each
//! operation is a single atomic unit: concurrent handshakes can never end up
//! with a duplicate nickname, and a snapshot never observes a half-inserted
//! entry.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::mpsc;

use natter_core::RegistryError;

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// One admitted, registered connection.
///
/// The session itself is a cheap handle: the connection's write half lives in
/// a dedicated writer task, and `outbound` is the channel feeding it. Cloning
/// a session clones the handle, not the connection.
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque registry key, the peer's remote address
    pub peer: String,
    /// Unique nickname claimed at handshake, immutable afterwards
    pub nickname: String,
    outbound: mpsc::Sender<Vec<u8>>,
}

impl Session {
    /// Queue framed bytes for delivery to this session's connection.
    ///
    /// Never blocks: the queue is bounded, and a target whose writer has
    /// gone away or whose queue is full (a client that stopped reading)
    /// just loses this frame. Nobody else is affected.
    pub fn deliver(&self, frame: Vec<u8>) -> Result<(), mpsc::error::TrySendError<Vec<u8>>> {
        self.outbound.try_send(frame)
    }
}

// ----------------------------------------------------------------------------
// Session Registry
// ----------------------------------------------------------------------------

/// Concurrency-safe mapping from peer identity to registered session
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock means some task panicked mid-operation; the map itself
    // is still a valid HashMap, so keep serving rather than cascading panics.
    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically check nickname uniqueness and insert the session.
    ///
    /// Rejection means the caller should notify the peer and close the
    /// connection; there is no retry.
    pub fn try_register(
        &self,
        peer: &str,
        nickname: &str,
        outbound: mpsc::Sender<Vec<u8>>,
    ) -> Result<Session, RegistryError> {
        let mut sessions = self.sessions();

        if sessions.values().any(|s| s.nickname == nickname) {
            return Err(RegistryError::NicknameTaken {
                nickname: nickname.to_string(),
            });
        }

        let session = Session {
            peer: peer.to_string(),
            nickname: nickname.to_string(),
            outbound,
        };
        sessions.insert(peer.to_string(), session.clone());
        Ok(session)
    }

    /// Find the session registered under `nickname`, if any
    pub fn lookup_by_nickname(&self, nickname: &str) -> Option<Session> {
        self.sessions()
            .values()
            .find(|s| s.nickname == nickname)
            .cloned()
    }

    /// Point-in-time view of all live sessions
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions().values().cloned().collect()
    }

    /// Remove the session for `peer`. Idempotent: removing an absent peer is
    /// a no-op.
    pub fn remove(&self, peer: &str) {
        self.sessions().remove(peer);
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
