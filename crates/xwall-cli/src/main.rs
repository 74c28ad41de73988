use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use xwall_client::{BrowserCookieSource, PostgrestStore, XSearchClientFactory};
use xwall_core::models::MentionStatus;
use xwall_core::traits::{MentionStore, SearchProvider};
use xwall_core::{
    AppError, CredentialFile, CredentialResolver, FileCredentialSource, ManualEntrySource,
    MentionPoller, PollerConfig, RetryPolicy, Session, TracingPollerReporter,
};
use xwall_db::{Database, DatabaseConfig, MentionRepository};

#[derive(Parser)]
#[command(
    name = "xwall",
    version,
    about = "Polls X for mentions and queues them for moderation"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Options for the default `run` command
    #[command(flatten)]
    run: RunArgs,

    /// Also write logs to this file
    #[arg(long, env = "XWALL_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll for mentions until interrupted (default)
    Run(RunArgs),

    /// Resolve credentials, save them, and exit
    Auth(CredentialArgs),

    /// Show mention counts and the latest rows
    Status {
        /// Number of recent mentions to list
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// PostgREST table (ignored with DATABASE_URL)
        #[arg(long, env = "XWALL_TABLE", default_value = "xwall")]
        table: String,
    },
}

#[derive(Args, Clone)]
struct RunArgs {
    /// Search term to poll
    #[arg(long, env = "SEARCH_TERM", default_value = "@replit")]
    term: String,

    /// Account whose own posts are ignored
    #[arg(long, env = "MY_USERNAME", default_value = "replit")]
    self_handle: String,

    /// Seconds between cycles
    #[arg(long, env = "CHECK_INTERVAL", default_value_t = 60)]
    interval: u64,

    /// Maximum posts fetched per cycle
    #[arg(long, env = "BATCH_SIZE", default_value_t = 15)]
    batch_size: usize,

    /// PostgREST table (ignored with DATABASE_URL)
    #[arg(long, env = "XWALL_TABLE", default_value = "xwall")]
    table: String,

    #[command(flatten)]
    credentials: CredentialArgs,
}

#[derive(Args, Clone)]
struct CredentialArgs {
    /// Where resolved cookies are saved and reloaded from
    #[arg(long, env = "COOKIES_FILE", default_value = "cookies.json")]
    cookies_file: PathBuf,

    /// Never prompt for cookies on the terminal
    #[arg(long, env = "XWALL_NO_PROMPT", default_value_t = false)]
    no_prompt: bool,
}

/// The configured datastore.
enum Datastore {
    Postgres(MentionRepository),
    Postgrest(PostgrestStore),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    // Installed before any startup work so an early CTRL+C still exits cleanly.
    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let result = match cli.command.unwrap_or(Commands::Run(cli.run)) {
        Commands::Run(args) => cmd_run(args, cancel_token.clone()).await,
        Commands::Auth(args) => cmd_auth(&args, &cancel_token).await,
        Commands::Status { limit, table } => cmd_status(limit, &table, &cancel_token).await,
    };

    if let Err(e) = &result
        && let Some(app_error) = e.downcast_ref::<AppError>()
        && app_error.is_fatal()
    {
        tracing::error!(error = %app_error, "Cannot start");
    }

    if result.is_ok() && cancel_token.is_cancelled() {
        // A terminal prompt may still hold a blocking stdin read that would
        // keep the runtime from shutting down.
        std::process::exit(0);
    }
    result
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("xwall=info".parse()?);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// Saved file, then browser cookies, then (unless disabled) the terminal.
fn credential_resolver(args: &CredentialArgs) -> CredentialResolver {
    let file = CredentialFile::new(&args.cookies_file);
    let resolver = CredentialResolver::new(file.clone())
        .with_source(FileCredentialSource::new(file))
        .with_source(BrowserCookieSource::detect());

    if args.no_prompt {
        resolver
    } else {
        resolver.with_source(ManualEntrySource::stdin())
    }
}

/// PostgreSQL when `DATABASE_URL` is set, otherwise PostgREST.
async fn open_datastore(table: &str) -> Result<Datastore, AppError> {
    if let Some(config) = DatabaseConfig::from_env_optional()? {
        let db = Database::connect(&config).await?;
        db.migrate().await?;
        tracing::info!("Using PostgreSQL datastore");
        return Ok(Datastore::Postgres(db.mention_repo()));
    }

    let url = non_empty_env("SUPABASE_URL");
    let key = non_empty_env("SUPABASE_KEY");
    match (url, key) {
        (Some(url), Some(key)) => {
            let store = PostgrestStore::with_table(&url, &key, table)?;
            tracing::info!(%url, %table, "Using PostgREST datastore");
            Ok(Datastore::Postgrest(store))
        }
        _ => Err(AppError::ConfigError(
            "set DATABASE_URL, or SUPABASE_URL and SUPABASE_KEY".into(),
        )),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Runs startup `work` unless the user interrupts first; `None` means interrupted.
async fn until_interrupted<T>(
    cancel_token: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<Option<T>> {
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => {
            tracing::info!("Interrupted during startup");
            Ok(None)
        }
        result = work => result.map(Some),
    }
}

async fn cmd_run(args: RunArgs, cancel_token: CancellationToken) -> Result<()> {
    if args.interval == 0 || args.batch_size == 0 {
        return Err(AppError::ConfigError(
            "CHECK_INTERVAL and BATCH_SIZE must be positive".into(),
        )
        .into());
    }

    let startup = async {
        let datastore = open_datastore(&args.table).await?;
        let resolved = credential_resolver(&args.credentials)
            .resolve(&XSearchClientFactory::new())
            .await?;
        Ok::<_, anyhow::Error>((datastore, resolved))
    };
    let Some((datastore, resolved)) = until_interrupted(&cancel_token, startup).await? else {
        return Ok(());
    };
    tracing::info!(source = %resolved.origin, "Authenticated");

    let session = Session::new(resolved.provider, RetryPolicy::default());
    let config = PollerConfig::default()
        .with_term(args.term)
        .with_self_handle(args.self_handle)
        .with_interval(Duration::from_secs(args.interval))
        .with_batch_size(args.batch_size);

    let cycles = match datastore {
        Datastore::Postgres(repo) => poll(session, repo, config, cancel_token).await,
        Datastore::Postgrest(store) => poll(session, store, config, cancel_token).await,
    };
    tracing::info!(cycles, "Stopped by user");
    Ok(())
}

async fn poll<P: SearchProvider, S: MentionStore>(
    session: Session<P>,
    store: S,
    config: PollerConfig,
    cancel_token: CancellationToken,
) -> u64 {
    MentionPoller::new(session, store, config)
        .run(cancel_token, &TracingPollerReporter)
        .await
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown signal received");
            cancel_token.cancel();
        }
        Err(e) => tracing::warn!(error = %e, "Failed to install CTRL+C handler"),
    }
}

async fn cmd_auth(args: &CredentialArgs, cancel_token: &CancellationToken) -> Result<()> {
    let resolve = async {
        let resolved = credential_resolver(args)
            .resolve(&XSearchClientFactory::new())
            .await?;
        Ok::<_, anyhow::Error>(resolved)
    };
    let Some(resolved) = until_interrupted(cancel_token, resolve).await? else {
        return Ok(());
    };

    println!(
        "Credentials from {} ({} cookies) ready in {}",
        resolved.origin,
        resolved.credentials.len(),
        args.cookies_file.display()
    );
    Ok(())
}

async fn cmd_status(limit: usize, table: &str, cancel_token: &CancellationToken) -> Result<()> {
    let open = async { Ok::<_, anyhow::Error>(open_datastore(table).await?) };
    let Some(datastore) = until_interrupted(cancel_token, open).await? else {
        return Ok(());
    };
    match datastore {
        Datastore::Postgres(repo) => print_status(&repo, limit).await,
        Datastore::Postgrest(store) => print_status(&store, limit).await,
    }
}

async fn print_status<S: MentionStore>(store: &S, limit: usize) -> Result<()> {
    store.health_check().await?;

    for status in [
        MentionStatus::Pending,
        MentionStatus::Approved,
        MentionStatus::Rejected,
    ] {
        let count = store.count_by_status(status).await?;
        println!("{:<9} {}", status.as_str(), count);
    }

    let recent = store.list_recent(None, limit).await?;
    if recent.is_empty() {
        println!("\nNo mentions stored yet");
        return Ok(());
    }

    println!("\nLatest {} mention(s):\n", recent.len());
    for mention in &recent {
        let preview: String = mention.content.chars().take(60).collect();
        println!(
            "  [{}] {} @{}: {}",
            mention.status,
            mention.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            mention.author_handle,
            preview.replace('\n', " "),
        );
        println!("      {}", mention.source_id);
    }

    Ok(())
}
