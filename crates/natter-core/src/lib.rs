//! Protocol layer for the natter chat relay.
//!
//! This crate defines the wire-level message model, the binary codec and
//! framing used on the wire, the persistence port consumed by the session
//! engine, and the shared error taxonomy. It is transport-agnostic: the
//! server crate owns sockets and sessions, this crate owns bytes and types.

pub mod errors;
pub mod message;
pub mod persist;
pub mod wire;

pub use errors::{CodecError, NatterError, PersistError, RegistryError, Result};
pub use message::{Message, MessageKind};
pub use persist::Persister;
