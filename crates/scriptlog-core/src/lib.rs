//! Core of the scriptlog bot: run untrusted scripts through an external
//! engine and hand the output back to the chat.
//!
//! - **Settings**: per-caller engine toggles, persisted as JSON
//! - **Source resolution**: pick the code to run from an attachment, a fenced
//!   block, a link or the message text
//! - **Execution**: the engine as a time-bounded child process fed a temp file
//!   and `SETTING_*` environment variables
//! - **Output routing**: inline code block or file attachment by size
//! - **Dispatch**: command parsing and the settings buttons
//!
//! The chat platform itself sits behind [`transport::ReplySink`].

pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod executors;
pub mod output;
pub mod pipeline;
pub mod settings;
pub mod source;
pub mod transport;

pub use config::{ConfigLoader, ScriptlogConfig};
pub use dispatcher::{DispatchOutcome, Dispatcher, InteractionOutcome};
pub use executors::{CodeExecutor, ExecutionRequest, ExecutionResult, ProcessExecutor};
pub use output::{OutputPayload, OutputRouter};
pub use pipeline::{PipelineOutcome, ScriptPipeline, Stage};
pub use settings::{CallerSettings, SettingsStore, SettingsView, Toggle};
pub use source::{SourceCandidate, SourceResolver, SourceShape};
pub use transport::{Attachment, CollectedReply, CollectingSink, IncomingEvent, Interaction, Reply, ReplySink};
