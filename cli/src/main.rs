//! LexMarket command-line client.
//!
//! Browses cases, lawyers, conversations and appointments, and listens on
//! the realtime channel. The session is kept in the storage file between
//! runs; `login` writes it and `logout` removes it.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use lexmarket_sdk::client::config::DEFAULT_BASE_URL;
use lexmarket_sdk::realtime::config::DEFAULT_SERVER_URL;
use lexmarket_sdk::session::FileStore;
use lexmarket_sdk::{AppContext, ClientConfig, RealtimeConfig};
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lexmarket", about = "LexMarket legal-services marketplace client")]
struct Args {
    /// REST API base URL
    #[arg(long, env = "LEXMARKET_API_URL", default_value = DEFAULT_BASE_URL)]
    api_url: String,

    /// Realtime server URL
    #[arg(long, env = "LEXMARKET_REALTIME_URL", default_value = DEFAULT_SERVER_URL)]
    realtime_url: String,

    /// Session storage file (defaults to the platform config directory)
    #[arg(long, env = "LEXMARKET_STORAGE")]
    storage: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Disable colored status tags
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a session
    Login {
        /// User ID
        user_id: String,
        /// Bearer token
        #[arg(long, env = "LEXMARKET_TOKEN")]
        token: String,
    },
    /// Remove the stored session
    Logout,
    /// Show the stored session
    Whoami,
    /// List cases
    Cases,
    /// Show one case with its bids
    Case {
        /// Case ID
        id: String,
    },
    /// Post a new case
    NewCase {
        /// Title
        title: String,
        /// Description
        description: String,
        /// Practice area
        #[arg(long)]
        category: Option<String>,
        /// Budget in USD
        #[arg(long)]
        budget: Option<Decimal>,
        /// Deadline (RFC 3339)
        #[arg(long)]
        deadline: Option<DateTime<Utc>>,
    },
    /// Bid on a case
    Bid {
        /// Case ID
        case_id: String,
        /// Fee in USD
        amount: Decimal,
        /// Cover message
        #[arg(default_value = "")]
        message: String,
    },
    /// List lawyers
    Lawyers,
    /// List ratings for a lawyer
    Ratings {
        /// Lawyer ID
        lawyer_id: String,
    },
    /// Rate a lawyer
    Rate {
        /// Lawyer ID
        lawyer_id: String,
        /// Score from 1 to 5
        score: u8,
        /// Review text
        #[arg(default_value = "")]
        comment: String,
        /// Case the rating refers to
        #[arg(long)]
        case: Option<String>,
    },
    /// List conversations
    Conversations,
    /// List messages in a conversation
    Messages {
        /// Conversation ID
        conversation_id: String,
    },
    /// Send a message
    Send {
        /// Conversation ID
        conversation_id: String,
        /// Message text
        body: String,
    },
    /// List appointments
    Appointments,
    /// Download an appointment as an iCalendar file
    Calendar {
        /// Appointment ID
        appointment_id: String,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Print the download URL instead
        #[arg(long)]
        url_only: bool,
    },
    /// Print realtime events until interrupted
    Listen {
        /// Event names
        #[arg(required = true)]
        events: Vec<String>,
        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Send a realtime event
    Emit {
        /// Event name
        event: String,
        /// JSON payload
        #[arg(default_value = "null")]
        payload: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,lexmarket_sdk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let store = match &args.storage {
        Some(path) => FileStore::open(path)?,
        None => FileStore::open_default()?,
    };
    tracing::debug!("Using storage {}", store.path().display());

    let ctx = AppContext::new(
        ClientConfig::new(&args.api_url).with_timeout(Duration::from_secs(args.timeout)),
        RealtimeConfig::new(&args.realtime_url),
        Arc::new(store),
    )?;

    let style = commands::row_style(args.no_color);
    let result = commands::dispatch(&ctx, args.command, style).await;
    ctx.connections().disconnect();
    result
}
