//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::BackendKind;

#[derive(Parser)]
#[command(name = "natter", author, version, about = "Minimal real-time chat relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay server
    Serve {
        /// Host to listen on (overrides config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config file)
        #[arg(long)]
        port: Option<u16>,

        /// Persistence backend (overrides config file)
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
    },
    /// Connect to a relay as an interactive chat client
    Chat {
        /// Your nickname
        #[arg(short, long)]
        nick: String,

        /// Relay host to connect to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Relay port to connect to
        #[arg(long, default_value_t = 9001)]
        port: u16,
    },
}
