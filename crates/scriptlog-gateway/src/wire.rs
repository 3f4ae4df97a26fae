//! JSON shapes exchanged with the relay.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use scriptlog_core::dispatcher::{DispatchOutcome, InteractionOutcome};
use scriptlog_core::pipeline::PipelineOutcome;
use scriptlog_core::settings::SettingsView;
use scriptlog_core::transport::CollectedReply;

/// One reply the relay should post back into the originating channel.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireReply {
    Text {
        content: String,
    },
    Ephemeral {
        content: String,
    },
    File {
        message: String,
        filename: String,
        data_base64: String,
    },
    Settings {
        view: SettingsView,
        /// Fallback rendering for relays without rich embeds.
        text: String,
    },
}

impl From<CollectedReply> for WireReply {
    fn from(reply: CollectedReply) -> Self {
        match reply {
            CollectedReply::Text(content) => WireReply::Text { content },
            CollectedReply::Ephemeral(content) => WireReply::Ephemeral { content },
            CollectedReply::File {
                message,
                filename,
                bytes,
            } => WireReply::File {
                message,
                filename,
                data_base64: STANDARD.encode(bytes),
            },
            CollectedReply::Settings(view) => {
                let text = view.to_text();
                WireReply::Settings { view, text }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GatewayResponse {
    pub request_id: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub replies: Vec<WireReply>,
}

impl GatewayResponse {
    pub fn new(
        request_id: String,
        (outcome, detail): (&'static str, Option<String>),
        replies: Vec<CollectedReply>,
    ) -> Self {
        Self {
            request_id,
            outcome,
            detail,
            replies: replies.into_iter().map(WireReply::from).collect(),
        }
    }
}

pub fn describe_dispatch(outcome: &DispatchOutcome) -> (&'static str, Option<String>) {
    match outcome {
        DispatchOutcome::Ignored => ("ignored", None),
        DispatchOutcome::SettingsShown => ("settings_shown", None),
        DispatchOutcome::Log(PipelineOutcome::Delivered { .. }) => ("delivered", None),
        DispatchOutcome::Log(PipelineOutcome::NoCode) => ("no_code", None),
        DispatchOutcome::Log(PipelineOutcome::Failed { stage, reason }) => {
            ("failed", Some(format!("{:?}: {}", stage, reason)))
        }
    }
}

pub fn describe_interaction(outcome: &InteractionOutcome) -> (&'static str, Option<String>) {
    match outcome {
        InteractionOutcome::Toggled { toggle, enabled } => {
            ("toggled", Some(format!("{}={}", toggle, enabled)))
        }
        InteractionOutcome::NotOwner => ("not_owner", None),
        InteractionOutcome::Rejected(reason) => ("rejected", Some(reason.clone())),
    }
}
