//! Session and routing engine for the natter chat relay.
//!
//! The server accepts TCP connections, runs the registration handshake,
//! keeps all live sessions in a shared registry, and fans routed frames out
//! to their delivery set. One reader task per session, one writer task per
//! session, and a single mutex-guarded registry between them.

pub mod config;
pub mod connection;
pub mod registry;
pub mod router;
pub mod server;

pub use config::RelayConfig;
pub use registry::{Session, SessionRegistry};
pub use server::RelayServer;
