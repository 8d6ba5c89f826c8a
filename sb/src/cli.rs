//! CLI command definitions and subcommands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::PeriodIndex;

/// Slotbridge - period-keyed message bridge for a control process
#[derive(Debug, Parser)]
#[command(
    name = "sb",
    about = "Period-keyed message exchange and barriers between an event source and a control process",
    version = env!("CARGO_PKG_VERSION"),
    after_help = after_help(),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Gateway socket, overriding the config file
    #[arg(short, long, global = true, help = "Gateway socket path")]
    pub socket: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge and its gateway
    Serve {
        /// JSONL file of inbound messages to dispatch in order
        #[arg(short, long)]
        feed: Option<PathBuf>,
    },

    /// Ask the bridge to write a line to its log
    LogTest {
        /// Text to log
        text: String,
    },

    /// Block until the session has started
    WaitStart {
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Block until a period newer than AFTER completes
    WaitPeriod {
        #[arg(allow_hyphen_values = true)]
        after: PeriodIndex,

        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },

    /// Take the messages stored for a period
    Take {
        #[arg(allow_hyphen_values = true)]
        period: PeriodIndex,
    },

    /// Submit a message to the server
    Submit {
        /// Message type name, e.g. Order
        #[arg(value_name = "TYPE")]
        message_type: String,

        /// JSON payload
        payload: String,
    },

    /// Print the effective configuration
    Config,

    /// Run the delay probe locally
    Probe {
        /// Number of delay cycles to request
        #[arg(short, long, default_value = "1")]
        rounds: u32,
    },
}

impl Command {
    /// Whether this command hosts the bridge, as opposed to talking to one
    pub fn is_server(&self) -> bool {
        matches!(self, Command::Serve { .. })
    }
}

/// Get the log file path used by `serve`
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slotbridge")
        .join("logs")
        .join("slotbridge.log")
}

fn after_help() -> String {
    format!("Server logs are written to: {}", get_log_path().display())
}
