//! Slotbridge - period-keyed message bridge
//!
//! CLI entry point: hosts the bridge (`serve`) or talks to a running one.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use slotbridge::bridge::{BridgeError, ControlBridge};
use slotbridge::cli::{Cli, Command, get_log_path};
use slotbridge::config::Config;
use slotbridge::dispatch::Dispatcher;
use slotbridge::domain::{Envelope, PeriodIndex};
use slotbridge::events::spawn_event_journal;
use slotbridge::ipc::{self, BridgeClient};
use slotbridge::session::Session;
use slotbridge::sync::DelayProbe;

fn parse_level(level: Option<&str>) -> tracing::Level {
    match level.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    }
}

fn setup_logging(level: tracing::Level, to_file: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_file {
        let log_path = get_log_path();
        if let Some(log_dir) = log_path.parent() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    // CLI --log-level > config file > INFO
    let level = parse_level(cli.log_level.as_deref().or(config.log_level.as_deref()));
    setup_logging(level, cli.command.is_server()).context("Failed to setup logging")?;

    let socket_path = cli.socket.clone().unwrap_or_else(|| config.socket_path.clone());
    let client = BridgeClient::with_socket_path(socket_path.clone());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve { feed } => cmd_serve(&config, &socket_path, feed).await,
        Command::LogTest { text } => {
            client.log_test(&text).await?;
            println!("{} Logged: {}", "✓".green(), text);
            Ok(())
        }
        Command::WaitStart { timeout_ms } => {
            report_wait(client.await_session_start(timeout_ms.map(std::time::Duration::from_millis)).await)?;
            println!("{} Session started", "✓".green());
            Ok(())
        }
        Command::WaitPeriod { after, timeout_ms } => {
            let period = report_wait(
                client
                    .await_period_complete(after, timeout_ms.map(std::time::Duration::from_millis))
                    .await,
            )?;
            println!("{} Period complete: {}", "✓".green(), period.to_string().cyan());
            Ok(())
        }
        Command::Take { period } => cmd_take(&client, period).await,
        Command::Submit { message_type, payload } => {
            let payload: serde_json::Value = serde_json::from_str(&payload).context("Payload is not valid JSON")?;
            client.submit(Envelope::new(message_type.as_str(), payload)).await?;
            println!("{} Submitted: {}", "✓".green(), message_type.cyan());
            Ok(())
        }
        Command::Config => {
            print!("{}", serde_yaml::to_string(&config).context("Failed to render config")?);
            Ok(())
        }
        Command::Probe { rounds } => cmd_probe(&config, rounds).await,
    }
}

/// Print a friendlier line for timed-out waits before propagating
fn report_wait<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result
        && let Some(BridgeError::TimedOut(limit)) = e.downcast_ref::<BridgeError>()
    {
        println!("{} Timed out after {:?}", "✗".yellow(), limit);
    }
    result
}

async fn cmd_take(client: &BridgeClient, period: PeriodIndex) -> Result<()> {
    let messages = client.take_messages(period).await?;
    if messages.is_empty() {
        println!("Period {}: {}", period.to_string().cyan(), "no messages".dimmed());
        return Ok(());
    }

    println!(
        "Period {}: {} message(s) across {} type(s)",
        period.to_string().cyan(),
        messages.message_count(),
        messages.type_count()
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&messages).context("Failed to render messages")?
    );
    Ok(())
}

/// Host the bridge and its gateway until SIGINT or SIGTERM
async fn cmd_serve(config: &Config, socket_path: &Path, feed: Option<PathBuf>) -> Result<()> {
    debug!(?socket_path, ?feed, "cmd_serve: called");
    let session = Session::assemble(config);
    let session_id = session.session_id().to_string();
    info!(%session_id, "Bridge session starting");

    let journal_handle = match &config.journal_dir {
        Some(dir) => Some(spawn_event_journal(Arc::clone(&session.events), dir)?),
        None => None,
    };

    let mut outbound = session.outbound;
    let outbound_handle = tokio::spawn(async move {
        while let Some(envelope) = outbound.recv().await {
            info!(message_type = %envelope.message_type, payload = %envelope.payload, "Outbound message");
        }
    });

    let listener = ipc::create_listener_at(socket_path)?;
    info!(?socket_path, "Gateway socket listening");
    println!("{} Bridge {} listening on {}", "✓".green(), session_id.cyan(), socket_path.display());

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    let gateway_bridge: Arc<ControlBridge> = Arc::clone(&session.bridge);
    let gateway_handle = tokio::spawn(async move {
        if let Err(e) = ipc::serve(listener, gateway_bridge, shutdown_rx).await {
            tracing::error!(error = %e, "Gateway error");
        }
    });

    let feed_handle = feed.map(|path| {
        let dispatcher = Arc::clone(&session.dispatcher);
        tokio::task::spawn_blocking(move || replay_feed(&dispatcher, &path))
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                warn!("SIGINT received");
            }
            _ = sigterm.recv() => {
                warn!("SIGTERM received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    info!("Bridge shutting down...");
    let _ = shutdown_tx.send(()).await;
    let _ = gateway_handle.await;
    ipc::cleanup_socket(socket_path);

    if let Some(handle) = feed_handle
        && !handle.is_finished()
    {
        warn!("Feed still running at shutdown");
    }

    let stats = session.bridge.exchange_stats();
    info!(?stats, "Exchange totals");

    outbound_handle.abort();
    if let Some(handle) = journal_handle {
        handle.abort();
    }
    Ok(())
}

/// Dispatch every line of a JSONL feed in order
fn replay_feed(dispatcher: &Dispatcher, path: &Path) {
    info!(?path, "Replaying feed");
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(?path, error = %e, "Failed to open feed");
            return;
        }
    };

    let mut count = 0usize;
    for line in BufReader::new(file).lines() {
        match line {
            Ok(line) => {
                dispatcher.dispatch_line(&line);
                count += 1;
            }
            Err(e) => {
                tracing::error!(?path, error = %e, "Failed to read feed");
                break;
            }
        }
    }
    info!(lines = count, cash = dispatcher.cash_balance(), "Feed replay complete");
}

async fn cmd_probe(config: &Config, rounds: u32) -> Result<()> {
    let delay = config.delay_probe();
    println!("Probing {} round(s) of {:?}", rounds.to_string().cyan(), delay);

    let probe = DelayProbe::spawn(delay).context("Failed to spawn delay probe")?;
    let completed = tokio::task::spawn_blocking(move || {
        for _ in 0..rounds {
            probe.start_delay();
        }
        probe.wait_for_delay()
    })
    .await
    .context("Delay probe task failed")?;

    println!("{} Completed {} delay cycle(s)", "✓".green(), completed);
    Ok(())
}
