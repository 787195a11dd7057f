use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use assistant_gateway::api::{self, GatewayState};
use assistant_gateway::chat::ChatCoordinator;
use assistant_gateway::config::USER_ID_HEADER;
use assistant_gateway::openai::{OpenAiClient, DEFAULT_BASE_URL};
use assistant_gateway::storage::FileStore;
use assistant_gateway::uploads::UploadOrchestrator;

#[derive(Parser, Debug)]
#[command(name = "assistant-gateway")]
#[command(about = "File uploads and chat relay for the OpenAI Assistants API")]
struct Args {
    /// Server port
    #[arg(short, long, default_value = "3000", env = "PORT")]
    port: u16,

    /// Directory for persisted uploads
    #[arg(short, long, default_value = "./storage")]
    storage_dir: String,

    /// Base URL of the remote assistant service
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Header carrying the caller's user identity
    #[arg(long, default_value = USER_ID_HEADER)]
    user_header: String,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let api_key = match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => {
            eprintln!("OPENAI_API_KEY is not set");
            std::process::exit(1);
        }
    };

    let client = match OpenAiClient::new(&api_key, &args.base_url) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Failed to build OpenAI client: {}", e);
            std::process::exit(1);
        }
    };

    let store = FileStore::new(&args.storage_dir);
    let state = GatewayState {
        uploader: Arc::new(UploadOrchestrator::new(client.clone(), store)),
        chat: Arc::new(ChatCoordinator::new(client)),
        user_header: args.user_header,
    };

    let app = Router::new()
        .merge(api::routes(state))
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Assistant gateway listening on {}", addr);
    info!("Uploads stored under {}", args.storage_dir);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
