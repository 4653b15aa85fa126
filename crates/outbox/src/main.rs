//! Outbox: deferred-publish service for LinkedIn.
//!
//! Single `serve` subcommand: opens the database, rebuilds timers for
//! persisted scheduled posts, and serves the HTTP API until shutdown.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use outbox_linkedin::{Gateway, LinkedInClient};
use outbox_media::MediaStager;
use outbox_publisher::Publisher;
use outbox_scheduler::Scheduler;
use outbox_store::PostStore;
use outbox_web::AppState;

#[derive(Parser)]
#[command(name = "outbox")]
#[command(about = "Deferred-publish service for LinkedIn", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// HTTP listen address
        #[arg(long, env = "OUTBOX_LISTEN", default_value = "0.0.0.0:3000")]
        listen: String,

        /// SQLite database path
        #[arg(long, env = "OUTBOX_DB", default_value = "outbox.db")]
        db: String,

        /// Directory for staged upload files
        #[arg(long, env = "OUTBOX_MEDIA_DIR", default_value = "uploads")]
        media_dir: String,

        /// Where the browser is sent after the OAuth callback
        #[arg(long, env = "OUTBOX_POST_AUTH_REDIRECT", default_value = "/")]
        post_auth_redirect: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "outbox=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            db,
            media_dir,
            post_auth_redirect,
        } => serve(&listen, &db, &media_dir, post_auth_redirect).await,
    }
}

async fn serve(
    listen: &str,
    db: &str,
    media_dir: &str,
    post_auth_redirect: String,
) -> Result<()> {
    let store =
        Arc::new(PostStore::open(db).map_err(|e| miette::miette!("failed to open {db}: {e}"))?);
    let scheduler = Arc::new(Scheduler::new());
    let media = Arc::new(MediaStager::new(media_dir));
    let linkedin = Arc::new(
        LinkedInClient::new().map_err(|e| miette::miette!("failed to build client: {e}"))?,
    );
    let gateway: Arc<dyn Gateway> = linkedin.clone();

    let publisher = Arc::new(Publisher::new(
        Arc::clone(&store),
        Arc::clone(&scheduler),
        media,
        gateway,
    ));

    // Rebuild timers for jobs that were pending when we last stopped.
    let report = publisher
        .recover()
        .await
        .map_err(|e| miette::miette!("recovery failed: {e}"))?;
    info!(
        rearmed = report.rearmed,
        fired = report.fired,
        expired = report.expired,
        "recovered persisted schedule"
    );

    let state = Arc::new(AppState {
        publisher,
        store,
        linkedin,
        post_auth_redirect,
    });
    let router = outbox_web::create_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| miette::miette!("failed to bind {listen}: {e}"))?;
    info!(listen = %listen, "outbox started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(|e| miette::miette!("server error: {e}"))?;

    scheduler.shutdown_and_cancel_all().await;
    Ok(())
}
