mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowtree_core::config::AppConfig;
use flowtree_core::event::EventBus;
use flowtree_core::traits::{PersistenceGateway, PredictionGateway};
use flowtree_gateway::{AppState, GatewayServer};
use flowtree_llm::{create_retrying_client, LlmPredictor, RemotePredictor};
use flowtree_store::JsonFileStore;

#[derive(Parser)]
#[command(name = "flowtree", version, about = "Grow a decision tree one question at a time")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "flowtree.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive terminal front-end
    Repl,
    /// Start the HTTP server (graph + prediction routes)
    Serve,
    /// Print the stored tree
    Show,
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Prediction collaborator for this process: the configured server when
/// `store.remote_url` is set, otherwise the model directly.
pub(crate) fn build_predictor(config: &AppConfig) -> anyhow::Result<Arc<dyn PredictionGateway>> {
    match &config.store.remote_url {
        Some(url) => {
            info!(url = %url, "Using remote prediction gateway");
            Ok(Arc::new(RemotePredictor::new(url.clone())))
        }
        None => {
            let client = create_retrying_client(config)?;
            Ok(Arc::new(LlmPredictor::new(Arc::new(client), config.model.clone())))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flowtree=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Handle completions before config loading
    if let Some(Commands::Completions { shell }) = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "flowtree", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Some(Commands::Completions { .. }) => unreachable!("handled before config load"),
        Some(Commands::Config) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Some(Commands::Show) => {
            let persistence = flowtree_store::from_config(&config);
            let snapshot = persistence.load().await?;
            if snapshot.is_empty() {
                println!("(empty tree)");
            } else {
                print!("{}", repl::render_tree(&snapshot));
            }
        }
        Some(Commands::Serve) => {
            // The server owns the file; a remote_url here would point at itself.
            let persistence: Arc<dyn PersistenceGateway> =
                Arc::new(JsonFileStore::new(config.store_path()));
            let client = create_retrying_client(&config)?;
            let predictor: Arc<dyn PredictionGateway> =
                Arc::new(LlmPredictor::new(Arc::new(client), config.model.clone()));

            info!(
                bind = %config.gateway.bind,
                store = %config.store_path().display(),
                model = %config.model.model_id,
                "Starting flowtree server"
            );
            let server = GatewayServer::new(
                config.gateway.clone(),
                AppState {
                    persistence,
                    predictor,
                    event_bus: Arc::new(EventBus::default()),
                    predict_timeout: config.workflow.gateway_timeout(),
                },
            );
            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();

            // Graceful shutdown on Ctrl-C
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down server...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Some(Commands::Repl) | None => {
            repl::run_repl(&config).await?;
        }
    }

    Ok(())
}
