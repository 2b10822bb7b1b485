//! Binary crate pieces for the natter relay: CLI surface, configuration,
//! persistence backends, and the interactive chat client.

pub mod backends;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
