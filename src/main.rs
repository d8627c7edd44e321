use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nuri::config::Config;
use nuri::models::{ContentStatus, Platform, PlatformTarget};

mod commands;

use commands::{content::CreateParams, monitor::ErrorsParams, App};

#[derive(Parser)]
#[command(
    name = "nuri",
    version,
    about = "Korean blog publishing pipeline with duplicate screening and scheduled multi-platform publishing",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// TOML configuration file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a DRAFT content
    Create {
        /// Title
        #[arg(short, long)]
        title: String,

        /// Body text (markdown)
        #[arg(short, long, conflicts_with = "file")]
        body: Option<String>,

        /// Read the body from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Short summary
        #[arg(long)]
        excerpt: Option<String>,

        /// Target platform (tistory, wordpress, both)
        #[arg(short, long, default_value = "tistory")]
        platform: PlatformTarget,

        /// Author user id
        #[arg(long)]
        author: Option<i64>,

        /// Screen for duplicates before creating
        #[arg(long)]
        screen: bool,
    },

    /// Show a content with its history, attempts and pending jobs
    Show {
        /// Content id
        id: i64,
    },

    /// Move a content to another status
    Status {
        /// Content id
        id: i64,

        /// Target status (draft, review, approved or Korean names)
        status: ContentStatus,

        /// Acting user id
        #[arg(long)]
        user: Option<i64>,
    },

    /// Show the pipeline board and bottlenecks
    Pipeline,

    /// Search contents
    List {
        /// Text matched against title and body
        #[arg(short, long)]
        query: Option<String>,

        /// Only this status
        #[arg(short, long)]
        status: Option<ContentStatus>,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Items per page
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Schedule an APPROVED content for publishing
    Schedule {
        /// Content id
        id: i64,

        /// When to publish (RFC3339 or "YYYY-MM-DD HH:MM" UTC)
        #[arg(long)]
        at: String,

        /// Target platform; defaults to the content's platform
        #[arg(short, long)]
        platform: Option<PlatformTarget>,

        /// Acting user id
        #[arg(long)]
        user: Option<i64>,
    },

    /// Cancel a pending job and return its content to APPROVED
    Cancel {
        /// Job id
        job_id: i64,

        /// Acting user id
        #[arg(long)]
        user: Option<i64>,
    },

    /// Move a pending job to a new time
    Reschedule {
        /// Job id
        job_id: i64,

        /// New publish time
        #[arg(long)]
        at: String,
    },

    /// Return a FAILED job to the queue
    Requeue {
        /// Job id
        job_id: i64,

        /// Acting user id
        #[arg(long)]
        user: Option<i64>,
    },

    /// Publish a content immediately
    Publish {
        /// Content id
        id: i64,

        /// Target platform; defaults to the content's platform
        #[arg(short, long)]
        platform: Option<PlatformTarget>,

        /// Acting user id
        #[arg(long)]
        user: Option<i64>,
    },

    /// Run due scheduled jobs
    Dispatch {
        /// Keep sweeping until interrupted
        #[arg(long = "loop")]
        run_loop: bool,

        /// Print Prometheus metrics when done
        #[arg(long)]
        metrics: bool,
    },

    /// Show the publishing calendar
    Calendar {
        /// Month as YYYY-MM; defaults to the current month
        #[arg(short, long, conflicts_with = "week")]
        month: Option<String>,

        /// Seven days starting at YYYY-MM-DD
        #[arg(short, long)]
        week: Option<String>,
    },

    /// List platform API errors
    Errors {
        /// Only this platform
        #[arg(short, long)]
        platform: Option<Platform>,

        /// Only unresolved errors
        #[arg(short, long)]
        unresolved: bool,

        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Items per page
        #[arg(long, default_value = "20")]
        limit: u32,

        /// Show aggregate statistics instead of the list
        #[arg(long)]
        stats: bool,
    },

    /// Mark an API error as resolved
    ResolveError {
        /// Error id
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate().context("Invalid configuration")?;

    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    if let Err(e) = nuri::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics registration failed");
    }

    let app = App::open(config)?;

    match cli.command {
        Commands::Create {
            title,
            body,
            file,
            excerpt,
            platform,
            author,
            screen,
        } => {
            tracing::info!(title = %title, %platform, screen, "Starting create command");
            commands::create(
                &app,
                CreateParams {
                    title,
                    body,
                    file,
                    excerpt,
                    platform,
                    author,
                    screen,
                },
            )?;
        }

        Commands::Show { id } => commands::show(&app, id)?,

        Commands::Status { id, status, user } => {
            tracing::info!(id, %status, "Starting status command");
            commands::status(&app, id, status, user)?;
        }

        Commands::Pipeline => commands::pipeline(&app)?,

        Commands::List {
            query,
            status,
            page,
            limit,
        } => commands::list(&app, query, status, page, limit)?,

        Commands::Schedule {
            id,
            at,
            platform,
            user,
        } => {
            tracing::info!(id, at = %at, platform = ?platform, "Starting schedule command");
            commands::schedule(&app, id, &at, platform, user)?;
        }

        Commands::Cancel { job_id, user } => commands::cancel(&app, job_id, user)?,

        Commands::Reschedule { job_id, at } => commands::reschedule(&app, job_id, &at)?,

        Commands::Requeue { job_id, user } => commands::requeue(&app, job_id, user)?,

        Commands::Publish { id, platform, user } => {
            tracing::info!(id, platform = ?platform, "Starting publish command");
            commands::publish(&app, id, platform, user).await?;
        }

        Commands::Dispatch { run_loop, metrics } => {
            tracing::info!(run_loop, metrics, "Starting dispatch command");
            commands::dispatch(&app, run_loop, metrics).await?;
        }

        Commands::Calendar { month, week } => commands::calendar(&app, month, week)?,

        Commands::Errors {
            platform,
            unresolved,
            page,
            limit,
            stats,
        } => commands::errors(
            &app,
            ErrorsParams {
                platform,
                unresolved,
                page,
                limit,
                stats,
            },
        )?,

        Commands::ResolveError { id } => commands::resolve_error(&app, id)?,
    }

    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("nuri=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("nuri={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
