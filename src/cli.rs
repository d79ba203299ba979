//! CLI definitions for reqflow.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use reqflow_store::RequestStatus;

/// reqflow CLI.
#[derive(Parser)]
#[command(name = "reqflow")]
#[command(about = "Prioritized request lifecycle engine for a submit-then-poll data provider")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/reqflow.toml", global = true, env = "REQFLOW_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the submitter loop until EXIT or Ctrl-C
    Submitter,

    /// Run the poller loop
    Poller {
        /// Exit once no submitted requests remain
        #[arg(long)]
        run_to_completion: bool,
    },

    /// Send a command token (EXIT, PAUSE, RESUME, CLR_QUEUES or a data-pull token)
    Send {
        /// Command token
        token: String,

        /// Queue to send to
        #[arg(long, value_enum, default_value_t = SendTarget::Request)]
        target: SendTarget,

        /// Explicit priority (lower runs first)
        #[arg(long, conflicts_with = "last")]
        priority: Option<i64>,

        /// Run after all queued work
        #[arg(long)]
        last: bool,
    },

    /// Build a data request and enqueue it
    Request {
        /// Request template name
        #[arg(long)]
        name: String,

        /// Human-readable title
        #[arg(long, default_value = "")]
        title: String,

        /// Identifier type of the universe
        #[arg(long, default_value = "CUSIP")]
        identifier_type: String,

        /// Comma-separated identifiers
        #[arg(long, value_delimiter = ',', required = true)]
        identifiers: Vec<String>,

        /// Comma-separated field mnemonics
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,

        /// Output media type
        #[arg(long, default_value = "text/csv")]
        format: String,

        /// Priority (lower runs first)
        #[arg(long)]
        priority: Option<i64>,
    },

    /// Remove every entry from one or all queues
    Clear {
        #[arg(long, value_enum, default_value_t = ClearTarget::All)]
        target: ClearTarget,
    },

    /// Show the tracked state of one request
    Status {
        /// Request id
        request_id: String,
    },

    /// List tracked requests in a given status
    List {
        #[arg(long)]
        status: RequestStatus,
    },

    /// Delete terminal records older than the retention window
    Purge {
        /// Age in days; defaults to store.retention_days
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum SendTarget {
    Request,
    Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ClearTarget {
    Request,
    Command,
    Response,
    Error,
    All,
}
