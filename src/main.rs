//! `ani` - chat front end over an interactive coding assistant session
//!
//! The assistant runs in a pseudo-terminal owned by this process; a local
//! model phrases every reply.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::{Cli, Commands};
use ani_core::config::{self, Config};
use ani_core::logger::{self, Level};
use ani_core::{info_log, warn_log};
use ani_core::approval::PromptInterceptor;
use ani_core::{
    EventBus, HistoryStore, OllamaClient, Orchestrator, PersonalitySource, SecondaryModel,
    SessionManager, SessionTransport, SharedOutputLog, StreamClassifier,
};

mod cli;
mod repl;

/// Longest wait for the session's startup banner to settle
const STARTUP_SETTLE_LIMIT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        let blue = Style::new().blue();
        println!(
            "{} v{} ({})",
            blue.apply_to("ani"),
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH")
        );
        return Ok(());
    }

    let (mut config, config_path) = match &cli.config {
        Some(path) => (
            Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
            Some(path.clone()),
        ),
        None => Config::load_or_default().context("Failed to load configuration")?,
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;
    init_logging(&config, cli.verbose);
    info_log!("Starting ani (config: {:?})", config_path);

    match &cli.command {
        Some(Commands::Config { init, path }) => {
            return handle_config(&config, config_path, *init, *path);
        }
        Some(Commands::Check) => return handle_check(&config).await,
        _ => {}
    }

    let runtime = Runtime::start(&config, &cli)?;
    runtime.settle(&config).await;
    let result = match &cli.command {
        Some(Commands::Ask { query }) => {
            let query = query.join(" ");
            match runtime.orchestrator.submit(&query).await {
                Ok(outcome) => {
                    println!("{}", repl::format_outcome(&outcome));
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{}", Style::new().red().apply_to(format!("Error: {}", e.user_message())));
                    Err(e.into())
                }
            }
        }
        _ => repl::run(runtime.orchestrator.clone()).await,
    };

    runtime.shutdown();
    result
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(host) = &cli.host {
        config.secondary.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.secondary.port = port;
    }
    if let Some(model) = &cli.model {
        config.secondary.model = model.clone();
    }
    if let Some(program) = &cli.program {
        config.session.command = program.clone();
    }
    if cli.no_session {
        config.session.enabled = false;
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        Level::Debug
    } else {
        config.logging.level.parse().unwrap_or(Level::Info)
    };
    logger::set_level(level);
    if config.logging.file {
        logger::init(config::get_data_dir());
    }
}

/// Process-wide state: the session and the orchestrator built around it.
struct Runtime {
    orchestrator: Arc<Orchestrator>,
    session: Option<Arc<SessionManager>>,
    log: SharedOutputLog,
}

impl Runtime {
    fn start(config: &Config, cli: &Cli) -> Result<Self> {
        let events = EventBus::default();
        let log = SharedOutputLog::new(
            config.orchestrator.log_capacity,
            config.orchestrator.log_low_watermark,
        );
        let model: Arc<dyn SecondaryModel> = Arc::new(OllamaClient::new(&config.secondary)?);
        let personality = PersonalitySource::from_config(&config.personality);

        let mut orchestrator = Orchestrator::new(
            &config.orchestrator,
            log.clone(),
            model,
            personality,
            events.clone(),
        )
        .with_interceptor(PromptInterceptor::from_config(&config.approval));
        if let Some(mode) = cli.mode {
            orchestrator = orchestrator.with_mode(mode);
        }

        let session = if config.session.enabled {
            match SessionManager::spawn(
                &config.session,
                log.clone(),
                Arc::new(StreamClassifier::default()),
                events,
            ) {
                Ok(session) => Some(Arc::new(session)),
                Err(e) => {
                    eprintln!(
                        "{}",
                        Style::new().yellow().apply_to(format!("Warning: {}", e.user_message()))
                    );
                    None
                }
            }
        } else {
            None
        };
        if let Some(session) = &session {
            orchestrator = orchestrator.with_session(session.clone());
        }

        if config.history.enabled {
            match HistoryStore::from_config(config) {
                Ok(history) => {
                    orchestrator = orchestrator.with_history(history, config.history.context_limit)
                }
                Err(e) => warn_log!("History disabled: {}", e),
            }
        }

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            session,
            log,
        })
    }

    /// Wait for the session's startup output to stop growing so it does not
    /// land in the first request's window.
    async fn settle(&self, config: &Config) {
        if self.session.is_none() {
            return;
        }
        let settled = wait_for_quiet(
            &self.log,
            config.orchestrator.tick_interval(),
            config.orchestrator.stability_ticks,
            STARTUP_SETTLE_LIMIT,
        )
        .await;
        if !settled {
            warn_log!("Session startup output did not settle within {:?}", STARTUP_SETTLE_LIMIT);
        }
    }

    fn shutdown(&self) {
        if let Some(session) = &self.session {
            session.kill();
        }
    }
}

/// Poll `log` until it has output and has not grown for `quiet_ticks`
/// consecutive ticks. Returns false when `limit` runs out first.
async fn wait_for_quiet(log: &SharedOutputLog, tick: Duration, quiet_ticks: u32, limit: Duration) -> bool {
    let started = tokio::time::Instant::now();
    let mut last = log.len();
    let mut quiet = 0;
    while quiet < quiet_ticks {
        if started.elapsed() >= limit {
            return false;
        }
        tokio::time::sleep(tick).await;
        let len = log.len();
        if len > last {
            last = len;
            quiet = 0;
        } else if len > 0 {
            quiet += 1;
        }
    }
    true
}

fn handle_config(config: &Config, loaded_from: Option<PathBuf>, init: bool, path_only: bool) -> Result<()> {
    let target = loaded_from
        .clone()
        .or_else(Config::default_path)
        .context("Could not determine config directory")?;

    if path_only {
        println!("{}", target.display());
        return Ok(());
    }

    if init {
        if target.exists() {
            println!("Config already exists at {}", target.display());
            return Ok(());
        }
        Config::default().save(&target)?;
        println!("Wrote default config to {}", target.display());
        return Ok(());
    }

    match &loaded_from {
        Some(path) => println!("# {}", path.display()),
        None => println!("# defaults (no config file found)"),
    }
    print!(
        "{}",
        toml::to_string_pretty(config).context("Failed to render configuration")?
    );
    Ok(())
}

async fn handle_check(config: &Config) -> Result<()> {
    let ok = Style::new().green();
    let bad = Style::new().red();

    let client = OllamaClient::new(&config.secondary)?;
    if client.test_connection().await {
        println!("{} model server at {} ({})", ok.apply_to("✓"), client.base_url(), client.name());
        match client.list_models().await {
            Ok(models) if !models.iter().any(|m| m == &config.secondary.model) => {
                println!(
                    "  {} model '{}' is not pulled on the server",
                    bad.apply_to("!"),
                    config.secondary.model
                );
            }
            _ => {}
        }
    } else {
        println!("{} model server at {} is unreachable", bad.apply_to("✗"), client.base_url());
    }

    if !config.session.enabled {
        println!("- session disabled in config");
        return Ok(());
    }
    let log = SharedOutputLog::new(
        config.orchestrator.log_capacity,
        config.orchestrator.log_low_watermark,
    );
    match SessionManager::spawn(
        &config.session,
        log,
        Arc::new(StreamClassifier::default()),
        EventBus::default(),
    ) {
        Ok(session) => {
            println!(
                "{} session '{}' started (pid {:?})",
                ok.apply_to("✓"),
                config.session.command,
                session.pid()
            );
            session.kill();
        }
        Err(e) => println!("{} {}", bad.apply_to("✗"), e),
    }
    Ok(())
}
