//! Boundary with the chat platform.
//!
//! The platform hands us [`IncomingEvent`]s and [`Interaction`]s; we answer
//! through a [`ReplySink`] bound to the originating channel. Nothing in the
//! pipeline knows which platform is on the other side.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

use crate::errors::TransportError;
use crate::settings::SettingsView;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// A message posted in a channel the bot can see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncomingEvent {
    pub author_id: String,
    /// Set by the transport when the bot itself authored the message.
    #[serde(default)]
    pub from_self: bool,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A click on one of the settings buttons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Caller whose settings view was clicked.
    pub owner_id: String,
    /// Caller who clicked.
    pub user_id: String,
    pub setting: String,
}

#[derive(Debug)]
pub enum Reply<'a> {
    Text(String),
    /// Visible only to the user who triggered it.
    Ephemeral(String),
    File {
        message: String,
        filename: String,
        path: &'a Path,
    },
    Settings(SettingsView),
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, reply: Reply<'_>) -> Result<(), TransportError>;
}

/// An owned copy of a delivered reply, with file contents read eagerly.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectedReply {
    Text(String),
    Ephemeral(String),
    File {
        message: String,
        filename: String,
        bytes: Vec<u8>,
    },
    Settings(SettingsView),
}

/// Sink that buffers replies so a request/response transport can return
/// them in one go.
#[derive(Default)]
pub struct CollectingSink {
    replies: Mutex<Vec<CollectedReply>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_replies(self) -> Vec<CollectedReply> {
        self.replies
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, reply: CollectedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(reply);
    }
}

#[async_trait]
impl ReplySink for CollectingSink {
    async fn send(&self, reply: Reply<'_>) -> Result<(), TransportError> {
        let collected = match reply {
            Reply::Text(text) => CollectedReply::Text(text),
            Reply::Ephemeral(text) => CollectedReply::Ephemeral(text),
            Reply::File {
                message,
                filename,
                path,
            } => CollectedReply::File {
                message,
                filename,
                bytes: tokio::fs::read(path).await?,
            },
            Reply::Settings(view) => CollectedReply::Settings(view),
        };
        self.push(collected);
        Ok(())
    }
}
