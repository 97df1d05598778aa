mod config;
mod intake;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use skein_core::app::SchedulerBuilder;
use skein_core::impls::{PgTaskStore, SimulatedExecutor};

use crate::config::AppConfig;
use crate::intake::IntakeState;

#[derive(Parser, Debug)]
#[command(name = "skein", about = "Durable task scheduler backed by PostgreSQL")]
struct Args {
    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP intake API
    Api {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run worker loops and the zombie reaper
    Scheduler {
        /// Leave reclaiming to another process
        #[arg(long)]
        no_reaper: bool,
    },
    /// Apply pending schema migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env().context("failed to load configuration")?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    tracing::info!(env = %config.environment, "starting skein");
    let store = connect(&config.database_url).await?;

    match args.command {
        Command::Migrate => {
            tracing::info!("migrations applied");
            Ok(())
        }
        Command::Api { port } => {
            let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.port)));
            let state = IntakeState {
                store: Arc::new(store),
            };
            intake::serve(addr, state, shutdown_signal()).await
        }
        Command::Scheduler { no_reaper } => {
            let mut builder = SchedulerBuilder::new()
                .store(Arc::new(store))
                .executor(Arc::new(SimulatedExecutor::new(config.exec_delay)))
                .config(config.scheduler);
            if no_reaper {
                builder = builder.without_reaper();
            }
            let scheduler = builder.build().context("invalid scheduler setup")?.spawn();

            shutdown_signal().await;
            tracing::info!("shutdown requested; finishing in-flight batches");
            scheduler.shutdown_and_join().await;
            Ok(())
        }
    }
}

/// Connect and migrate. Every subcommand needs an up-to-date schema.
async fn connect(database_url: &str) -> Result<PgTaskStore> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("failed to connect to database")?;

    let store = PgTaskStore::new(pool);
    store.migrate().await.context("failed to run migrations")?;
    Ok(store)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}
