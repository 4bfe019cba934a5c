//! shelf-ingest - Book record reconciliation
//!
//! Reconciles partial book records (usually read off cover images) against
//! OCR, a vision model, book catalogs and web search, then saves the fused
//! records to the JSON library.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shelf_common::config::{load_config, resolve_library_path, TomlConfig};
use shelf_common::{BookRecord, BookStore};
use shelf_ingest::reconcile::{ingest_directory, Outcome};
use shelf_ingest::config::reconcile_options;
use shelf_ingest::{fusion, sources, AppState, Reconciler};
use std::io::{Read, Write};
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "shelf-ingest")]
#[command(about = "Reconcile book records against multiple evidence sources")]
#[command(version)]
struct Args {
    /// Config file (default: $SHELF_CONFIG, then ~/.config/shelf/shelf.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Library JSON file (default: $SHELF_LIBRARY, then library_path in config)
    #[arg(short, long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reconcile one JSON record and print the result
    Reconcile {
        /// Record JSON file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also save the reconciled record to the library
        #[arg(long)]
        save: bool,
    },

    /// Reconcile every cover image in a directory into the library
    Ingest {
        /// Directory of .jpg/.jpeg/.png covers
        dir: PathBuf,
    },

    /// Print the coordinates for a place name
    Locate {
        name: String,
    },

    /// Run the HTTP API
    Serve {
        /// Port to listen on (default: [server] port)
        #[arg(short, long, env = "SHELF_PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config);

    info!(
        "shelf-ingest {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let library = resolve_library_path(args.library.as_deref(), &config);

    match args.command {
        Command::Locate { name } => {
            let (latitude, longitude) = fusion::resolve_location(&name);
            println!("{:.4}, {:.4}", latitude, longitude);
            Ok(())
        }
        Command::Reconcile {
            input,
            output,
            save,
        } => {
            let reconciler = build_reconciler(&config)?;
            run_reconcile(&reconciler, BookStore::new(library), input, output, save).await
        }
        Command::Ingest { dir } => {
            let reconciler = build_reconciler(&config)?;
            let store = BookStore::new(library);
            let cancel = cancel_on_ctrl_c();

            let summary = ingest_directory(&reconciler, &store, &dir, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Command::Serve { port } => {
            let reconciler = build_reconciler(&config)?;
            let port = port.unwrap_or(config.server.port);
            serve(AppState::new(reconciler, BookStore::new(library)), port).await
        }
    }
}

/// RUST_LOG wins; otherwise the configured level applies to the shelf crates
fn init_tracing(config: &TomlConfig) {
    let level = &config.logging.level;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("shelf_ingest={level},shelf_common={level},tower_http={level}").into()
        }))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_reconciler(config: &TomlConfig) -> Result<Reconciler> {
    let sources = sources::build_sources(config)?;
    let reconciler = Reconciler::new(sources, reconcile_options(config))?;

    info!(
        sources = reconciler.sources().len(),
        mode = ?reconciler.options().query_mode,
        date_policy = ?reconciler.options().date_policy,
        "Reconciler ready"
    );
    Ok(reconciler)
}

async fn run_reconcile(
    reconciler: &Reconciler,
    store: BookStore,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    save: bool,
) -> Result<()> {
    let json = match &input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read record from stdin")?;
            buf
        }
    };

    let record: BookRecord = serde_json::from_str(&json).context("Invalid record JSON")?;

    let cancel = cancel_on_ctrl_c();
    let mut result = reconciler.reconcile_with_cancel(record, &cancel).await;

    if save {
        if result.outcome == Outcome::Completed {
            result.record.processed_at = Some(chrono::Utc::now());
            store.upsert([result.record.clone()])?;
            info!(library = %store.path().display(), "Record saved");
        } else {
            warn!("Reconciliation cancelled, record not saved");
        }
    }

    let rendered = serde_json::to_string_pretty(&result)?;
    match output {
        Some(path) => std::fs::write(&path, rendered)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", rendered)?;
        }
    }

    Ok(())
}

async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = shelf_ingest::build_router(state);

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Token cancelled on the first Ctrl+C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, cancelling");
            token.cancel();
        }
    });
    cancel
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
