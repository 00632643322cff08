// Command-line client for the event registration service

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use evreg_client::{ApiError, EventStatus};

mod app;
mod commands;
mod output;

use app::App;

#[derive(Parser)]
#[command(name = "evreg")]
#[command(about = "Browse events, manage registrations and your own events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Locale for server messages and dates (overrides EVREG_LOCALE)
    #[arg(long, global = true)]
    locale: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session tokens
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign out and forget the stored tokens
    Logout,

    /// Show the signed-in user
    Me,

    /// Browse and manage events
    Events {
        #[command(subcommand)]
        command: EventsCommand,
    },

    /// Register for an event
    RegisterFor {
        /// Event ID
        event_id: String,

        /// Attendee name
        #[arg(short, long)]
        name: String,

        /// Attendee email
        #[arg(short, long)]
        email: String,

        /// Promo code to apply
        #[arg(long)]
        promo: Option<String>,
    },

    /// Cancel a registration
    Cancel {
        /// Registration ID
        registration_id: String,

        /// Event the registration belongs to
        #[arg(short, long)]
        event: String,
    },

    /// List registrations
    Registrations {
        #[command(subcommand)]
        command: RegistrationsCommand,
    },

    /// Promo codes
    Promo {
        #[command(subcommand)]
        command: PromoCommand,
    },

    /// Open a localized page path such as /ko/events/42
    Open {
        path: String,
    },
}

#[derive(Subcommand)]
enum EventsCommand {
    /// List published events
    List {
        #[command(flatten)]
        page: PageArgs,

        /// Full-text search
        #[arg(short, long)]
        search: Option<String>,

        #[arg(short, long)]
        category: Option<String>,

        /// Only events that have not started yet
        #[arg(short, long)]
        upcoming: bool,
    },

    /// Show one event
    Show { id: String },

    /// Create an event
    Create {
        #[arg(short, long)]
        title: String,

        /// Start time (RFC 3339, e.g. 2026-11-05T18:00:00Z)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End time (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,

        #[arg(short, long)]
        capacity: u32,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        price: Option<f64>,
    },

    /// Update fields of an event
    Update {
        id: String,

        #[arg(short, long)]
        title: Option<String>,

        #[arg(long)]
        start: Option<DateTime<Utc>>,

        #[arg(long)]
        end: Option<DateTime<Utc>>,

        #[arg(short, long)]
        capacity: Option<u32>,

        #[arg(short, long)]
        location: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[arg(long)]
        price: Option<f64>,

        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Delete an event
    Delete { id: String },

    /// Events you organize
    Mine {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum RegistrationsCommand {
    /// Your registrations
    Mine {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Registrations for an event you organize
    ForEvent {
        event_id: String,

        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum PromoCommand {
    /// Check a promo code for an event
    Validate {
        code: String,

        #[arg(short, long)]
        event: String,
    },
}

#[derive(Args, Clone, Copy)]
struct PageArgs {
    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    page: u32,

    /// Page size (defaults to the configured list size)
    #[arg(long)]
    limit: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl From<StatusArg> for EventStatus {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::Draft => EventStatus::Draft,
            StatusArg::Published => EventStatus::Published,
            StatusArg::Cancelled => EventStatus::Cancelled,
            StatusArg::Completed => EventStatus::Completed,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // .env is optional; the environment may already be set
    let dotenv = dotenvy::dotenv();
    init_logging(cli.verbose);
    match dotenv {
        Ok(path) => log::debug!("Loaded .env file from: {:?}", path),
        Err(_) => log::debug!(".env file not found, using environment variables"),
    }

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ApiError>() {
            Some(api) => eprintln!("Error: {}", api.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = evreg_config::AppConfig::load();
    let app = App::new(config, cli.locale.as_deref())?;
    commands::dispatch(&app, cli.command).await
}
