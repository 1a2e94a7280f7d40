use std::sync::Arc;

use crate::{
    config::Config,
    error::Error,
    images::{ImageStore, LocalImageStore},
    pool::{connect, DbPool},
};

/// Everything a request handler needs.
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config, images: Arc<dyn ImageStore>) -> Arc<Self> {
        Arc::new(Self {
            pool,
            config,
            images,
        })
    }

    /// Builds the state from the environment: database pool plus a local media directory.
    pub async fn from_env() -> Result<Arc<Self>, Error> {
        let config = Config::load()?;
        let pool = connect(&config).await?;
        let images = Arc::new(LocalImageStore::new(&config.media_root, &config.media_url));

        Ok(Self::new(pool, config, images))
    }

    pub fn session_secret(&self) -> Arc<str> {
        Arc::from(self.config.session_secret.as_str())
    }
}
