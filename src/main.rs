//! Thin CLI entry point over the `newsloom` orchestration core. The CLI
//! surface itself is out of scope (spec §1) — this binary exists only to
//! exercise the Task Service Facade and Scheduler query contract from a
//! terminal, the way an operator would before wiring a real HTTP surface
//! on top of this crate.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use newsloom::models::Crawler;
use newsloom::repository::{DbContext, TaskFilter};
use newsloom::task_service::TaskService;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "newsloomd")]
#[command(about = "Crawler task orchestration core for news-article ingestion")]
#[command(version)]
struct Cli {
    /// SQLite database path (defaults to $DATABASE_URL or ./newsloom.sqlite3)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database file and its schema if they don't exist yet.
    Init,

    /// Register a new crawler backend.
    CrawlerAdd {
        name: String,
        module_name: String,
        base_url: String,
        crawler_type: String,
        config_file_name: String,
    },

    /// List registered crawlers.
    CrawlerList,

    /// Create a task bound to a crawler.
    TaskCreate {
        name: String,
        crawler_id: String,
        /// Raw JSON task_args document, e.g. '{"scrape_mode":"full_scrape"}'
        task_args: String,
        #[arg(long)]
        is_auto: bool,
        #[arg(long)]
        cron: Option<String>,
    },

    /// List tasks, optionally narrowed by crawler or active flag.
    TaskList {
        #[arg(long)]
        crawler_id: Option<String>,
        #[arg(long)]
        active_only: bool,
    },

    /// Show a single task's current status.
    TaskStatus { id: String },

    /// Request cancellation of an in-flight task run.
    TaskCancel { id: String },

    /// List the most recent history rows for a task.
    TaskHistory {
        id: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Find tasks due to fire for a given cron expression, right now.
    SchedulerDue { cron: String },

    /// Find active tasks whose most recent run failed within the window.
    SchedulerFailed {
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "newsloom=debug" } else { "newsloom=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = cli
        .database_url
        .unwrap_or_else(|| PathBuf::from("./newsloom.sqlite3"));
    let db = DbContext::new(&db_path).await?;
    let service = TaskService::new(db.clone());

    match cli.command {
        Commands::Init => {
            tracing::info!(path = %db_path.display(), "database initialized");
        }
        Commands::CrawlerAdd { name, module_name, base_url, crawler_type, config_file_name } => {
            use newsloom::repository::CrawlerRepository;
            let crawler = Crawler::new(name, module_name, base_url, crawler_type, config_file_name);
            let created = db.crawlers().create(&crawler).await?;
            println!("{}", serde_json::to_string_pretty(&created)?);
        }
        Commands::CrawlerList => {
            use newsloom::repository::CrawlerRepository;
            let crawlers = db.crawlers().find_all_active().await?;
            println!("{}", serde_json::to_string_pretty(&crawlers)?);
        }
        Commands::TaskCreate { name, crawler_id, task_args, is_auto, cron } => {
            let args: serde_json::Value = serde_json::from_str(&task_args)?;
            let envelope = service
                .create_task(&name, &crawler_id, is_auto, cron.as_deref(), &args)
                .await;
            println!("{}", serde_json::to_string_pretty(&envelope_to_json(envelope))?);
        }
        Commands::TaskList { crawler_id, active_only } => {
            let mut filter = TaskFilter::new();
            filter.crawler_id = crawler_id;
            if active_only {
                filter.is_active = Some(true);
            }
            let envelope = service.find_tasks_advanced(&filter).await;
            println!("{}", serde_json::to_string_pretty(&envelope_to_json(envelope))?);
        }
        Commands::TaskStatus { id } => {
            let envelope = service.get_task_status(&id).await;
            println!("{}", serde_json::to_string_pretty(&envelope_to_json(envelope))?);
        }
        Commands::TaskCancel { id } => {
            // The CLI process doesn't own a live `CancelRegistry` for runs
            // started elsewhere; this demonstrates the call shape an
            // in-process scheduler/worker would make against its own
            // registry instance.
            let registry = newsloom::CancelRegistry::new();
            let cancelled = registry.cancel(&id).await;
            println!("{{\"cancelled\": {cancelled}}}");
        }
        Commands::TaskHistory { id, limit } => {
            let envelope = service.find_task_history(&id, limit).await;
            println!("{}", serde_json::to_string_pretty(&envelope_to_json(envelope))?);
        }
        Commands::SchedulerDue { cron } => {
            let due = newsloom::scheduler::find_due_tasks(&db.tasks(), &cron).await?;
            println!("{}", serde_json::to_string_pretty(&due)?);
        }
        Commands::SchedulerFailed { days } => {
            let failed = newsloom::scheduler::find_failed_tasks(&db.tasks(), days).await?;
            println!("{}", serde_json::to_string_pretty(&failed)?);
        }
    }

    Ok(())
}

/// Flatten an `Envelope<T>` into a plain JSON value for CLI printing.
fn envelope_to_json<T: serde::Serialize>(envelope: newsloom::Envelope<T>) -> serde_json::Value {
    serde_json::json!({
        "success": envelope.success,
        "message": envelope.message,
        "payload": envelope.payload,
    })
}
