//! `scriptlog`: runs the HTTP gateway for a chat relay, or the pipeline
//! locally for one script.

mod console;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use std::path::PathBuf;
use std::sync::Arc;

use console::ConsoleSink;
use scriptlog_core::pipeline::PipelineOutcome;
use scriptlog_core::settings::{SettingsStore, SettingsView, Toggle};
use scriptlog_core::{ConfigLoader, Dispatcher, ScriptlogConfig};
use scriptlog_gateway::{Gateway, ServerConfig};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Script logger bot: reconstructs submitted Lua in a sandboxed engine")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, default_value = "scriptlog.yaml", help = "Configuration file (defaults apply when it does not exist)")]
    config: PathBuf,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the relay gateway (default command)
    Serve {
        #[clap(long, help = "Override gateway.bind_addr")]
        bind_addr: Option<String>,
    },
    /// Run one script through the pipeline and print the replies
    Exec {
        #[clap(long, default_value = "local")]
        caller: String,

        #[clap(long, short, conflicts_with = "text", help = "Read the submission from a file")]
        file: Option<PathBuf>,

        #[clap(long, default_value = ".", help = "Where file replies are written")]
        out_dir: PathBuf,

        /// Submission text: code, a fenced block or a URL
        #[clap(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Show a caller's settings, optionally flipping one first
    Settings {
        #[clap(long, default_value = "local")]
        caller: String,

        #[clap(long)]
        toggle: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    let config = ConfigLoader::load_or_default(&cli.config)
        .await
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Some(Commands::Serve { bind_addr }) => run_gateway(config, bind_addr).await,
        Some(Commands::Exec {
            caller,
            file,
            out_dir,
            text,
        }) => run_exec(config, caller, file, out_dir, text).await,
        Some(Commands::Settings { caller, toggle }) => run_settings(config, caller, toggle).await,
        None => run_gateway(config, None).await,
    }
}

async fn run_gateway(mut config: ScriptlogConfig, bind_addr: Option<String>) -> Result<()> {
    if let Some(addr) = bind_addr {
        config.gateway.bind_addr = addr;
    }

    // Checked before anything else starts so a missing token fails fast.
    let server_config = ServerConfig::from_gateway_config(&config.gateway)?;
    let dispatcher = Dispatcher::from_config(&config).await?;
    log::info!(
        "Settings store at {}, engine '{}' with {}s limit",
        dispatcher.store().path().display(),
        config.engine.binary,
        config.engine.timeout_secs
    );

    Gateway::new(Arc::new(dispatcher), server_config)
        .serve()
        .await?;
    Ok(())
}

async fn run_exec(
    config: ScriptlogConfig,
    caller: String,
    file: Option<PathBuf>,
    out_dir: PathBuf,
    text: Vec<String>,
) -> Result<()> {
    let payload = match file {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => text.join(" "),
    };

    let dispatcher = Dispatcher::from_config(&config).await?;
    let sink = ConsoleSink::new(out_dir, std::io::stdout());
    match dispatcher.pipeline().run(&caller, &payload, &[], &sink).await {
        PipelineOutcome::Failed { stage, reason } => {
            bail!("{:?} failed: {}", stage, reason)
        }
        outcome => {
            log::debug!("Finished with {:?}", outcome);
            Ok(())
        }
    }
}

async fn run_settings(config: ScriptlogConfig, caller: String, toggle: Option<String>) -> Result<()> {
    let store = SettingsStore::open(&config.settings.path).await?;
    let settings = match toggle {
        Some(name) => {
            let toggle: Toggle = name.parse()?;
            store.toggle(&caller, toggle).await?
        }
        None => store.get(&caller).await,
    };
    println!("{}", SettingsView::new(&caller, &settings).to_text());
    Ok(())
}
