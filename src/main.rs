use std::sync::Arc;

use guildplay::{
    common::{AnyResult, logger},
    configs::Config,
    feeder::PlaylistFeeder,
    library::TrackCache,
    orchestrator::Orchestrator,
    server::AppState,
    session::SessionRegistry,
    tools::{Toolset, YtDlp},
    transport::{ClientLink, websocket_server},
    voice::{ClientVoiceConnector, RemoteEngineFactory},
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    let config = Config::load()?;
    logger::init(config.logging.as_ref());

    let tools = match YtDlp::discover(&config.tools, &config.library) {
        Ok(tools) => Arc::new(tools),
        Err(e) => {
            error!("yt-dlp is required: {e}");
            std::process::exit(1);
        }
    };

    let cache = Arc::new(TrackCache::load(&config.library));
    let link = Arc::new(ClientLink::new());
    let engines = Arc::new(RemoteEngineFactory::new(link.clone()));
    let sessions = Arc::new(SessionRegistry::new(
        Arc::new(ClientVoiceConnector::new(link.clone())),
        engines.clone(),
    ));
    let feeder = Arc::new(PlaylistFeeder::new());
    let orchestrator = Arc::new(Orchestrator::new(
        cache,
        sessions.clone(),
        feeder.clone(),
        Toolset::shared(tools),
        config.feeder.interval(),
    ));

    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState {
        config,
        link,
        engines,
        orchestrator,
    });

    let app = websocket_server::router(state).layer(tower_http::trace::TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("guildplay listening on ws://{}{}", address, websocket_server::COMMANDS_PATH);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    feeder.stop_all();
    sessions.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Ctrl-C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let term = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = term => {},
    }

    warn!("Shutdown signal received.");
}
