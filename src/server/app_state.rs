use std::sync::Arc;

use crate::{
    configs::Config,
    orchestrator::Orchestrator,
    transport::ClientLink,
    voice::RemoteEngineFactory,
};

/// Top-level application state shared with the socket handlers.
pub struct AppState {
    pub config: Config,
    pub link: Arc<ClientLink>,
    pub engines: Arc<RemoteEngineFactory>,
    pub orchestrator: Arc<Orchestrator>,
}
