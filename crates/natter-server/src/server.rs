//! Connection acceptor.
//!
//! Binding failures are fatal; once listening, a failed accept is logged and
//! the loop keeps serving, unless accepts keep failing with no success in
//! between, which means the listener itself is broken. Every accepted
//! connection gets its own task and its failures stay its own.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use natter_core::{Persister, Result};

use crate::config::RelayConfig;
use crate::connection;
use crate::registry::SessionRegistry;

/// Accept failures in a row before the listener is declared unusable
const MAX_CONSECUTIVE_ACCEPT_FAILURES: u32 = 10;

/// Tracks consecutive accept failures; any successful accept resets the
/// streak.
#[derive(Debug, Default)]
struct AcceptFailureStreak {
    consecutive: u32,
}

impl AcceptFailureStreak {
    /// Record one failed accept; true once the streak marks the listener
    /// unusable
    fn record_failure(&mut self) -> bool {
        self.consecutive += 1;
        self.consecutive >= MAX_CONSECUTIVE_ACCEPT_FAILURES
    }

    fn record_success(&mut self) {
        self.consecutive = 0;
    }
}

/// The listening relay: acceptor plus the shared session registry
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    persister: Arc<dyn Persister>,
    handshake_timeout: Duration,
}

impl RelayServer {
    /// Bind the listener. Failure here is the one condition worth exiting
    /// the process over.
    pub async fn bind(config: &RelayConfig, persister: Arc<dyn Persister>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!(addr = %listener.local_addr()?, "relay listening");

        Ok(Self {
            listener,
            registry: Arc::new(SessionRegistry::new()),
            persister,
            handshake_timeout: config.handshake_timeout(),
        })
    }

    /// Actual bound address, useful when the port was 0
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle to the shared session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the task is dropped.
    ///
    /// Transient accept errors are logged and retried; a run of them with no
    /// successful accept in between means the listener itself is unusable,
    /// and `run` returns the last error so the process can exit with a
    /// clear diagnostic.
    pub async fn run(self) -> Result<()> {
        let mut failures = AcceptFailureStreak::default();
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => {
                    failures.record_success();
                    accepted
                }
                Err(e) => {
                    // Transient accept errors (per-connection resets, fd
                    // pressure) must not take the whole relay down.
                    if failures.record_failure() {
                        error!(error = %e, failures = failures.consecutive, "listener unusable, giving up");
                        return Err(e.into());
                    }
                    warn!(error = %e, "accept failed, continuing");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            info!(peer = %addr, "connection accepted");
            let registry = Arc::clone(&self.registry);
            let persister = Arc::clone(&self.persister);
            let handshake_timeout = self.handshake_timeout;

            tokio::spawn(async move {
                if let Err(e) = connection::serve(
                    stream,
                    addr.to_string(),
                    registry,
                    persister,
                    handshake_timeout,
                )
                .await
                {
                    warn!(peer = %addr, error = %e, "connection ended with error");
                }
            });
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_failure_streak_trips_at_the_cap() {
        let mut streak = AcceptFailureStreak::default();
        for _ in 0..MAX_CONSECUTIVE_ACCEPT_FAILURES - 1 {
            assert!(!streak.record_failure());
        }
        assert!(streak.record_failure());
    }

    #[test]
    fn successful_accept_resets_the_streak() {
        let mut streak = AcceptFailureStreak::default();
        for _ in 0..MAX_CONSECUTIVE_ACCEPT_FAILURES - 1 {
            streak.record_failure();
        }
        streak.record_success();
        assert!(!streak.record_failure());
    }
}
