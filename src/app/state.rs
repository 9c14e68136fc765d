//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::relay::RoomManager;
use crate::store::{FileScoreStore, NullScoreStore, ScoreStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomManager>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Score sink: file-backed when configured, otherwise discarded
        let score_store: Arc<dyn ScoreStore> = match &config.score_file {
            Some(path) => Arc::new(FileScoreStore::new(path.clone())),
            None => Arc::new(NullScoreStore),
        };

        let rooms = Arc::new(RoomManager::new(&config, score_store));

        Self { config, rooms }
    }
}
