//! Environment configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use onboard_pdf::FieldOffsets;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub field_offsets_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match var("PORT") {
            Some(port) => port.parse().with_context(|| format!("Invalid PORT: {}", port))?,
            None => DEFAULT_PORT,
        };
        let database_max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(max) => max
                .parse()
                .with_context(|| format!("Invalid DATABASE_MAX_CONNECTIONS: {}", max))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let jwt_secret = var("JWT_SECRET").context("JWT_SECRET must be set")?;

        Ok(Self {
            port,
            database_url: var("DATABASE_URL"),
            database_max_connections,
            jwt_secret,
            field_offsets_path: var("FIELD_OFFSETS_PATH").map(PathBuf::from),
        })
    }

    /// Built-in field offsets with the overrides file applied on top
    pub fn load_offsets(&self) -> Result<FieldOffsets> {
        let Some(path) = &self.field_offsets_path else {
            return Ok(FieldOffsets::builtin());
        };
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read field offsets from {}", path.display()))?;
        let offsets = FieldOffsets::from_json_overrides(&json)?;
        tracing::info!(path = %path.display(), entries = offsets.len(), "Loaded field offsets");
        Ok(offsets)
    }
}
