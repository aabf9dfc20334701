//! Conversational documentation agent.
//!
//! Drives a language model through the agent-cycle protocol to fill a tree of
//! project documentation, from the terminal.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use docagent::controller::{SendOutcome, SessionController, SessionEvent};
use docagent::core::path::file_paths;
use docagent::core::types::Provider;
use docagent::io::archive::write_archive;
use docagent::io::config::{DocAgentConfig, write_config};
use docagent::io::paths::StatePaths;
use docagent::io::settings::{load_settings, write_settings};
use docagent::logging;
use docagent::tree::default_tree;

#[derive(Parser)]
#[command(
    name = "docagent",
    version,
    about = "Conversational agent that writes project documentation"
)]
struct Cli {
    /// Directory holding `config.toml` and `settings.json`.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every file path of the seeded documentation tree.
    Tree,
    /// Write the seeded documentation tree as a zip archive.
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Write `config.toml` with every default spelled out.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Show or change the provider and API keys.
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Send a prompt and follow the agent until it stops.
    Chat {
        prompt: String,
        /// Write the resulting tree as a zip archive.
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Create `config.toml` from the defaults.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the active provider and which keys are set.
    Show,
    /// Select the active provider (`google` or `openrouter`).
    Provider { provider: Provider },
    /// Store the API key for a provider.
    Key { provider: Provider, key: String },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Tree => cmd_tree(),
        Command::Export { out } => write_archive(&default_tree(), &out),
        Command::Config { action } => {
            let paths = StatePaths::resolve(cli.state_dir)?;
            cmd_config(&paths, action)
        }
        Command::Settings { action } => {
            let paths = StatePaths::resolve(cli.state_dir)?;
            cmd_settings(&paths, action)
        }
        Command::Chat { prompt, export } => {
            let paths = StatePaths::resolve(cli.state_dir)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("start async runtime")?;
            runtime.block_on(cmd_chat(&paths, &prompt, export.as_deref()))
        }
    }
}

fn cmd_tree() -> Result<()> {
    for path in file_paths(&default_tree()) {
        println!("{}", path);
    }
    Ok(())
}

fn cmd_config(paths: &StatePaths, action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Init { force } => {
            if paths.config_path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    paths.config_path.display()
                );
            }
            write_config(&paths.config_path, &DocAgentConfig::default())?;
            println!("wrote {}", paths.config_path.display());
            Ok(())
        }
    }
}

fn cmd_settings(paths: &StatePaths, action: SettingsCommand) -> Result<()> {
    let mut settings = load_settings(&paths.settings_path)?;
    match action {
        SettingsCommand::Show => {
            println!("provider: {}", settings.provider.id());
            for provider in Provider::ALL {
                let set = settings
                    .api_keys
                    .get(&provider)
                    .is_some_and(|key| !key.is_empty());
                println!(
                    "{}: {}",
                    provider.id(),
                    if set { "key set" } else { "no key" }
                );
            }
            return Ok(());
        }
        SettingsCommand::Provider { provider } => settings.provider = provider,
        SettingsCommand::Key { provider, key } => {
            settings.api_keys.insert(provider, key.trim().to_string());
        }
    }
    write_settings(&paths.settings_path, &settings)
}

async fn cmd_chat(paths: &StatePaths, prompt: &str, export: Option<&Path>) -> Result<()> {
    let controller = SessionController::bootstrap(paths)?;
    let mut events = controller.subscribe();
    match controller.send(prompt)? {
        SendOutcome::Started { .. } => {}
        SendOutcome::Busy => bail!("session is busy"),
    }

    let mut transcript = Transcript::default();
    let idle = controller.wait_until_idle();
    tokio::pin!(idle);
    loop {
        tokio::select! {
            _ = &mut idle => break,
            event = events.recv() => match event {
                Ok(event) => transcript.show(&event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "transcript lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    while let Ok(event) = events.try_recv() {
        transcript.show(&event);
    }

    if let Some(out) = export {
        write_archive(&controller.snapshot().tree, out)?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

/// Prints assistant text once, even when a message is rewritten in place.
#[derive(Default)]
struct Transcript {
    index: Option<usize>,
    printed: usize,
}

impl Transcript {
    fn show(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Message { index, message } if message.is_assistant() => {
                if self.index != Some(*index) {
                    self.index = Some(*index);
                    self.printed = 0;
                }
                let content = &message.content;
                if let Some(fresh) = content.get(self.printed..)
                    && !fresh.is_empty()
                {
                    println!("{}", fresh.trim_start_matches('\n'));
                    self.printed = content.len();
                }
            }
            SessionEvent::ContinuationScheduled { delay_ms } => {
                eprintln!("(continuing in {} ms)", delay_ms);
            }
            SessionEvent::Warning { message } => eprintln!("warning: {}", message),
            SessionEvent::Tree {
                last_updated_file: Some(path),
                ..
            } => eprintln!("updated {}", path),
            _ => {}
        }
    }
}
