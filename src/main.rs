mod llm;
mod prompt;
mod relay;
mod search;
mod secret;
mod server;

pub const USER_AGENT: &str = concat!("beacon/", env!("CARGO_PKG_VERSION"));

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tracing::info;

use llm::ChatClient;
use search::SearchClient;
use server::AppState;

/// TCP connection establishment timeout for both provider clients.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Maximum redirect hops before aborting.
const MAX_REDIRECTS: usize = 5;

/// Backend for search-grounded AI chat.
///
/// Configuration via environment variables:
/// - `SERPAPI_API_KEY`: search provider credential (required)
/// - `OPENAI_API_KEY`: model provider credential (required)
/// - `OPENAI_MODEL`: model identifier (default: gpt-4o-mini)
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("beacon=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // No global timeout on this client: it would also bound streamed response
    // bodies and cut long answers off mid-stream. The blocking calls add
    // their own per-request timeouts.
    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;

    // Both credentials are validated here so misconfiguration fails at
    // startup instead of surfacing as an opaque provider error later.
    let search = SearchClient::from_env(http.clone())
        .inspect_err(|e| tracing::error!("search client unavailable: {e}"))?;
    let chat = ChatClient::from_env(http)
        .inspect_err(|e| tracing::error!("chat client unavailable: {e}"))?;

    let app = server::router(AppState { search, chat });
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(address = %args.bind, "beacon listening");
    axum::serve(listener, app).await?;
    Ok(())
}
