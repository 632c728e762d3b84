//! Application state for the onboarding API

use std::sync::Arc;

use anyhow::Result;
use onboard_pdf::FieldOffsets;

use crate::config::Config;
use crate::store::{MemoryStore, OnboardStore, PgStore};

pub struct AppState {
    pub store: Arc<dyn OnboardStore>,
    pub jwt_secret: String,
    /// Renderer offsets, loaded once at startup
    pub offsets: Arc<FieldOffsets>,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn OnboardStore> = match &config.database_url {
            Some(url) => {
                Arc::new(PgStore::connect(url, config.database_max_connections).await?)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::with_store(
            store,
            config.jwt_secret.clone(),
            config.load_offsets()?,
        ))
    }

    pub fn with_store(
        store: Arc<dyn OnboardStore>,
        jwt_secret: String,
        offsets: FieldOffsets,
    ) -> Self {
        Self {
            store,
            jwt_secret,
            offsets: Arc::new(offsets),
        }
    }
}
