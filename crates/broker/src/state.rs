use std::sync::Arc;

use crate::broker::Broker;
use crate::config::BrokerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BrokerConfig>,
    pub broker: Arc<Broker>,
}
