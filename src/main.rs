use anyhow::Result;
use clap::{Parser, Subcommand};
use minjo_server::chat::ChatService;
use minjo_server::config::Config;
use minjo_server::context::HolidayClient;
use minjo_server::llm::GeminiClient;
use minjo_server::server::{self, AppState};
use minjo_server::session::{resolve_session_dir, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minjo")]
#[command(author, version, about = "Minjo - Jokipremium customer assistant backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat API
    Serve {
        /// Port to listen on (overrides config and PORT env)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Directory for session files (overrides config and env)
        #[arg(long)]
        session_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "minjo_server=debug,tower_http=debug"
    } else {
        "minjo_server=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            session_dir,
        } => {
            let config = Config::load()?;
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let dir = resolve_session_dir(session_dir.or(config.session.dir));
            tracing::info!("session files under {}", dir.display());
            let store = Arc::new(SessionStore::new(dir));

            let model = GeminiClient::new(config.gemini.api_key, &config.gemini.model);
            if !model.has_api_key() {
                tracing::warn!("GEMINI_API_KEY is not set; chat requests will fail");
            }
            let model_name = model.model().to_string();

            let state = Arc::new(AppState {
                chat: ChatService::new(
                    Arc::clone(&store),
                    Arc::new(model),
                    Arc::new(HolidayClient::default()),
                ),
                store,
                model_name,
            });

            server::run(state, &host, port).await?;
        }
    }

    Ok(())
}
