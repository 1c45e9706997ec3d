//! Global application state.

use super::config::Config;
use std::sync::Arc;

/// Global application state.
#[derive(Clone, Debug)]
pub struct AppState {
    config: Arc<Config>,
}

impl AppState {
    /// Constructs a new [`AppState`].
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Returns the application configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}
