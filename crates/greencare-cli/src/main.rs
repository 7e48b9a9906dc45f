use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use greencare_infrastructure::{
    GatewayClient, GreencarePaths, JsonTurnStore, TomlProfileStore, config_service,
};
use greencare_pipeline::{AdvisoryRequest, PipelineOrchestrator};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "greencare")]
#[command(about = "GreenCare - compliance-gated health and financial advisory pipeline", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to the user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one advisory query through the pipeline
    Ask {
        /// User whose profile grounds the answer
        #[arg(long)]
        user: u64,
        /// Conversation session to append to
        #[arg(long)]
        session: String,
        /// The query text
        query: String,
    },
    /// Print the recent turns of a session
    History {
        #[arg(long)]
        session: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config_service::load_from(path)?,
        None => config_service::load_default()?,
    };
    let data_dir = GreencarePaths::data_dir()?;

    match cli.command {
        Commands::Ask {
            user,
            session,
            query,
        } => {
            let gateway = Arc::new(GatewayClient::new(config.gateway.clone()));
            let orchestrator = PipelineOrchestrator::new(
                Arc::new(TomlProfileStore::new(&data_dir)?),
                Arc::new(JsonTurnStore::new(&data_dir)?),
                gateway.clone(),
                gateway.clone(),
                gateway,
                config.pipeline,
                config.disclaimers,
            );

            let cancel = CancellationToken::new();
            let ctrl_c_cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c_cancel.cancel();
                }
            });

            let response = orchestrator
                .handle_with_cancel(
                    AdvisoryRequest {
                        user_id: user,
                        session_id: session,
                        query,
                    },
                    cancel,
                )
                .await
                .context("pipeline failed")?;

            println!("{}", response.turn.content);
            if response.style_degraded {
                eprintln!("note: style service was unavailable; text was not normalised");
            }
            for domain in &response.missing_domains {
                eprintln!("note: {domain} guidance was unavailable for this answer");
            }
            if let Some(warning) = &response.persistence_warning {
                eprintln!("warning: {warning}");
            }
        }
        Commands::History { session, limit } => {
            let store = JsonTurnStore::new(&data_dir)?;
            use greencare_core::repository::TurnStore;
            let turns = store.get_recent_turns(&session, limit).await?;
            for turn in turns {
                println!(
                    "[{}] {}: {}",
                    turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    turn.role,
                    turn.content
                );
            }
        }
    }

    Ok(())
}
