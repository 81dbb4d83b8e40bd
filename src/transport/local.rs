//! Local transport — stdin/stdout loop for development.
//!
//! Each stdin line becomes an inbound message from `local-user`; sends are
//! printed to stdout. Lines prefixed `sender-id: text` fake a specific
//! contact, and a chat id ending in `@g.us` is reported as a group.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::error::TransportError;
use crate::transport::{
    ChatMetadata, ContactMetadata, IncomingMessage, MessageStream, Transport,
};

/// Development transport backed by the terminal.
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn name(&self) -> &str {
        "local"
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn start(&self) -> Result<MessageStream, TransportError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let (sender, text) = match line.split_once(": ") {
                            Some((s, t)) if !s.contains(' ') => (s.to_string(), t.to_string()),
                            _ => ("local-user".to_string(), line),
                        };
                        let msg =
                            IncomingMessage::new(&Uuid::new_v4().to_string(), &sender, &text);
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        println!("\n→ {recipient}: {text}\n");
        eprint!("> ");
        Ok(())
    }

    async fn contact_metadata(&self, _id: &str) -> Result<ContactMetadata, TransportError> {
        Ok(ContactMetadata::default())
    }

    async fn chat_metadata(&self, id: &str) -> Result<ChatMetadata, TransportError> {
        Ok(ChatMetadata {
            is_group: id.ends_with("@g.us"),
            name: None,
        })
    }
}
