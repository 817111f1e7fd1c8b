use std::sync::Arc;

use crate::config::settings::AppConfig;
use crate::infrastructure::storage::BlobStore;
use crate::infrastructure::transcoder::Transcoder;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn BlobStore>,
    pub transcoder: Arc<dyn Transcoder>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            config,
            store,
            transcoder,
        }
    }
}
