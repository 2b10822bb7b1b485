//! Delivery fan-out.
//!
//! The router decides the delivery set for one stamped message and queues the
//! identical frame bytes onto each target's write handle. A target whose
//! writer has gone away just loses that frame; other targets are unaffected.

use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use natter_core::Message;

use crate::registry::{Session, SessionRegistry};

/// Route one encoded frame to its delivery set.
///
/// Empty recipient broadcasts to every session in the registry snapshot,
/// sender included. A named recipient gets the frame plus an echo to the
/// sender's own session. A recipient that is not registered is silently
/// skipped — the sender still sees the echo but no error. Known limitation
/// carried over from the original behavior.
pub fn route(registry: &SessionRegistry, message: &Message, frame: &[u8]) {
    if message.is_broadcast() {
        let targets = registry.snapshot();
        debug!(sender = %message.sender, targets = targets.len(), "broadcasting");
        for session in &targets {
            deliver(session, frame);
        }
        return;
    }

    match registry.lookup_by_nickname(&message.recipient) {
        Some(target) => deliver(&target, frame),
        None => debug!(
            sender = %message.sender,
            recipient = %message.recipient,
            "recipient not registered, dropping direct message"
        ),
    }

    // Echo so the sender sees their own sent message, once even if they
    // messaged themselves.
    if message.sender != message.recipient {
        if let Some(echo) = registry.lookup_by_nickname(&message.sender) {
            deliver(&echo, frame);
        }
    }
}

fn deliver(session: &Session, frame: &[u8]) {
    match session.deliver(frame.to_vec()) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!(
            nickname = %session.nickname,
            peer = %session.peer,
            "outbound queue full, dropping frame"
        ),
        Err(TrySendError::Closed(_)) => warn!(
            nickname = %session.nickname,
            peer = %session.peer,
            "delivery target gone, dropping frame"
        ),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn register(
        registry: &SessionRegistry,
        peer: &str,
        nickname: &str,
    ) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(8);
        registry.try_register(peer, nickname, tx).unwrap();
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn broadcast_reaches_every_session_including_sender() {
        let registry = SessionRegistry::new();
        let mut alice = register(&registry, "p1", "alice");
        let mut bob = register(&registry, "p2", "bob");
        let mut carol = register(&registry, "p3", "carol");

        let msg = Message::chat("alice", "", "hi all");
        route(&registry, &msg, b"frame-bytes");

        for rx in [&mut alice, &mut bob, &mut carol] {
            assert_eq!(drain(rx), vec![b"frame-bytes".to_vec()]);
        }
    }

    #[test]
    fn direct_reaches_recipient_and_echoes_sender_only() {
        let registry = SessionRegistry::new();
        let mut alice = register(&registry, "p1", "alice");
        let mut bob = register(&registry, "p2", "bob");
        let mut carol = register(&registry, "p3", "carol");

        let msg = Message::chat("alice", "bob", "psst");
        route(&registry, &msg, b"secret");

        assert_eq!(drain(&mut alice).len(), 1);
        assert_eq!(drain(&mut bob).len(), 1);
        assert!(drain(&mut carol).is_empty());
    }

    #[test]
    fn missing_recipient_still_echoes_sender() {
        let registry = SessionRegistry::new();
        let mut alice = register(&registry, "p1", "alice");

        let msg = Message::chat("alice", "carol", "anyone there?");
        route(&registry, &msg, b"lost");

        assert_eq!(drain(&mut alice).len(), 1);
    }

    #[test]
    fn self_message_delivered_once() {
        let registry = SessionRegistry::new();
        let mut alice = register(&registry, "p1", "alice");

        let msg = Message::chat("alice", "alice", "note to self");
        route(&registry, &msg, b"memo");

        assert_eq!(drain(&mut alice).len(), 1);
    }

    #[test]
    fn slow_consumer_loses_excess_frames_without_blocking_others() {
        let registry = SessionRegistry::new();
        let (slow_tx, mut slow) = mpsc::channel(2);
        registry.try_register("p1", "slow", slow_tx).unwrap();
        let mut fast = register(&registry, "p2", "fast");

        let msg = Message::chat("fast", "", "flood");
        for _ in 0..5 {
            route(&registry, &msg, b"frame");
        }

        // The full queue sheds frames instead of growing or blocking
        assert_eq!(drain(&mut slow).len(), 2);
        assert_eq!(drain(&mut fast).len(), 5);
    }

    #[test]
    fn dead_target_does_not_block_others() {
        let registry = SessionRegistry::new();
        let mut alice = register(&registry, "p1", "alice");
        let bob_rx = register(&registry, "p2", "bob");
        drop(bob_rx);

        let msg = Message::chat("alice", "", "still here?");
        route(&registry, &msg, b"frame");

        assert_eq!(drain(&mut alice).len(), 1);
    }
}
