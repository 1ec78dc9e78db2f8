use std::sync::Arc;

use crate::config::Config;
use crate::engine::LeadEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<LeadEngine>,
}

impl AppState {
    pub fn new(config: Config, engine: LeadEngine) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}
