//! Routes platform events to the settings view or the log pipeline.

use std::sync::Arc;

use crate::config::{BotConfig, ScriptlogConfig};
use crate::errors::{SettingsError, StartupError};
use crate::executors::{CodeExecutor, ProcessExecutor};
use crate::pipeline::{PipelineOutcome, ScriptPipeline};
use crate::settings::{SettingsStore, SettingsView, Toggle};
use crate::source::{HttpFetcher, SourceFetcher, SourceResolver};
use crate::transport::{IncomingEvent, Interaction, Reply, ReplySink};

pub const NOT_YOUR_SETTINGS: &str = "❌ These are not your settings!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Settings,
    /// Text following the command word, untrimmed.
    Log(&'a str),
}

/// Matches `<prefix><word>` at the start of the message. The settings word is
/// checked first; anything after the log word is its payload.
pub fn parse_command<'a>(bot: &BotConfig, content: &'a str) -> Option<Command<'a>> {
    let rest = content.strip_prefix(bot.command_prefix.as_str())?;
    if rest.starts_with(bot.settings_command.as_str()) {
        return Some(Command::Settings);
    }
    rest.strip_prefix(bot.log_command.as_str()).map(Command::Log)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Ignored,
    SettingsShown,
    Log(PipelineOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Toggled { toggle: Toggle, enabled: bool },
    NotOwner,
    Rejected(String),
}

pub struct Dispatcher {
    bot: BotConfig,
    store: Arc<SettingsStore>,
    pipeline: ScriptPipeline,
}

impl Dispatcher {
    pub fn new(bot: BotConfig, store: Arc<SettingsStore>, pipeline: ScriptPipeline) -> Self {
        Self {
            bot,
            store,
            pipeline,
        }
    }

    /// Wires the production collaborators: HTTP fetches, the engine process
    /// and the JSON settings file named in `config`.
    pub async fn from_config(config: &ScriptlogConfig) -> Result<Self, StartupError> {
        let store = Arc::new(SettingsStore::open(&config.settings.path).await?);
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(HttpFetcher::new(
            config.fetch.timeout(),
            config.fetch.max_bytes,
        )?);
        let executor: Arc<dyn CodeExecutor> = Arc::new(ProcessExecutor::new(
            config.engine.locator(),
            config.engine.command(),
        ));
        let pipeline = ScriptPipeline::new(
            store.clone(),
            SourceResolver::new(fetcher),
            executor,
            config.output.router(config.engine.scratch_dir.clone()),
            config.engine.timeout(),
        );
        Ok(Self::new(config.bot.clone(), store, pipeline))
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &ScriptPipeline {
        &self.pipeline
    }

    pub async fn handle_event(&self, event: &IncomingEvent, sink: &dyn ReplySink) -> DispatchOutcome {
        if event.from_self {
            return DispatchOutcome::Ignored;
        }

        match parse_command(&self.bot, &event.content) {
            Some(Command::Settings) => {
                let settings = self.store.get(&event.author_id).await;
                let view = SettingsView::new(&event.author_id, &settings);
                if let Err(e) = sink.send(Reply::Settings(view)).await {
                    log::error!("Failed to send settings view: {}", e);
                }
                DispatchOutcome::SettingsShown
            }
            Some(Command::Log(payload)) => {
                log::info!(
                    "Log request from {} ({} attachment(s))",
                    event.author_id,
                    event.attachments.len()
                );
                let outcome = self
                    .pipeline
                    .run(&event.author_id, payload, &event.attachments, sink)
                    .await;
                DispatchOutcome::Log(outcome)
            }
            None => DispatchOutcome::Ignored,
        }
    }

    /// A settings button was clicked. Only the owner of the view may toggle.
    pub async fn handle_interaction(
        &self,
        interaction: &Interaction,
        sink: &dyn ReplySink,
    ) -> InteractionOutcome {
        if interaction.user_id != interaction.owner_id {
            send_or_log(sink, Reply::Ephemeral(NOT_YOUR_SETTINGS.to_string())).await;
            return InteractionOutcome::NotOwner;
        }

        let toggle: Toggle = match interaction.setting.parse() {
            Ok(toggle) => toggle,
            Err(e) => return reject(sink, e).await,
        };

        match self.store.toggle(&interaction.owner_id, toggle).await {
            Ok(settings) => {
                let enabled = settings.get(toggle);
                log::info!(
                    "Caller {} set {} to {}",
                    interaction.owner_id,
                    toggle,
                    enabled
                );
                let view = SettingsView::new(&interaction.owner_id, &settings);
                send_or_log(sink, Reply::Settings(view)).await;
                InteractionOutcome::Toggled { toggle, enabled }
            }
            Err(e) => reject(sink, e).await,
        }
    }
}

async fn send_or_log(sink: &dyn ReplySink, reply: Reply<'_>) {
    if let Err(e) = sink.send(reply).await {
        log::error!("Failed to send reply: {}", e);
    }
}

async fn reject(sink: &dyn ReplySink, err: SettingsError) -> InteractionOutcome {
    log::warn!("Settings interaction rejected: {}", err);
    let message = format!("❌ {}", err);
    send_or_log(sink, Reply::Ephemeral(message.clone())).await;
    InteractionOutcome::Rejected(message)
}
