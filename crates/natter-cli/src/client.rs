//! Interactive line-based chat client.
//!
//! Connects, sends the handshake, then bridges stdin lines to Chat frames
//! and incoming frames to stdout. A leading `@nick ` addresses one
//! recipient; `/quit` disconnects.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tracing::warn;

use natter_core::{wire, Message, MessageKind};

use crate::error::Result;

/// Run the client until `/quit`, stdin EOF, or the server goes away
pub async fn run(host: &str, port: u16, nick: &str) -> Result<()> {
    let stream = TcpStream::connect((host, port)).await?;
    let (reader, mut writer) = stream.into_split();

    let handshake = wire::encode(&Message::handshake(nick))?;
    wire::write_frame(&mut writer, &handshake).await?;
    println!("connected to {}:{} as {}", host, port, nick);

    let mut printer = tokio::spawn(print_incoming(reader, nick.to_string()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "/quit" {
                    break;
                }

                let (recipient, text) = parse_line(line);
                let message = Message::chat(nick, recipient, text);
                let payload = wire::encode(&message)?;
                wire::write_frame(&mut writer, &payload).await?;
            }
            _ = &mut printer => {
                // Server side closed; nothing left to print or send
                break;
            }
        }
    }

    printer.abort();
    Ok(())
}

/// Print frames from the server until the connection ends
async fn print_incoming(mut reader: OwnedReadHalf, nick: String) {
    loop {
        let payload = match wire::read_frame(&mut reader).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                println!("server closed the connection");
                return;
            }
            Err(e) => {
                warn!(error = %e, "connection lost");
                return;
            }
        };

        match wire::decode(&payload) {
            Ok(message) => render(&message, &nick),
            Err(e) => warn!(error = %e, "dropping undecodable frame"),
        }
    }
}

fn render(message: &Message, nick: &str) {
    if message.kind == MessageKind::System {
        println!("[system] {}", message.text);
    } else if message.sender == nick {
        println!("you said: {}", message.text);
    } else {
        println!("{} said: {}", message.sender, message.text);
    }
}

/// Split a line into `(recipient, text)`; `@bob hello` addresses bob,
/// anything else broadcasts.
fn parse_line(line: &str) -> (&str, &str) {
    if let Some(rest) = line.strip_prefix('@') {
        if let Some((recipient, text)) = rest.split_once(char::is_whitespace) {
            if !recipient.is_empty() {
                return (recipient, text.trim_start());
            }
        }
    }
    ("", line)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
