use meshroom::domain::media::MediaConstraints;
use meshroom::infrastructure::relay::WebSocketRelay;
use meshroom::infrastructure::webrtc::{SyntheticMediaSource, WebRtcConnector};
use meshroom::interface::metrics::describe_metrics;
use meshroom::interface::renderer::LogRenderer;
use meshroom::{Config, Session, SessionDeps};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    describe_metrics();

    info!("Starting Meshroom");

    // Load configuration
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(path.as_deref())?;
    info!("Configuration loaded: domain={}, identity={}", config.domain, config.identity);

    let deps = SessionDeps {
        media: Arc::new(SyntheticMediaSource::new()),
        connector: Arc::new(WebRtcConnector::new(&config)?),
        renderer: Arc::new(LogRenderer),
        relay: Arc::new(WebSocketRelay),
    };

    let mut session = Session::join(&config, deps, &MediaConstraints::default()).await?;
    info!("Joined room {} as {}", config.domain, session.local_id());

    let outcome = tokio::select! {
        result = session.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, leaving room");
            Ok(())
        }
    };

    session.leave().await;

    if let Err(e) = outcome {
        error!("Session ended: {}", e);
        return Err(e.into());
    }

    info!("Meshroom stopped");
    Ok(())
}
