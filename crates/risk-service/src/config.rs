use anyhow::{bail, Context, Result};
use metrics_store::{StorageConfig, DEFAULT_HISTORY_LIMIT};
use std::env;
use std::path::{Path, PathBuf};
use text_generation::GenerationConfig;

pub const DEFAULT_MODEL_PATH: &str = "models/distress_model.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub model_path: PathBuf,
    /// Expected hex SHA-256 of the model artifact
    pub model_sha256: Option<String>,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
    pub history_limit: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = non_empty("STORAGE_BACKEND").unwrap_or_else(|| "sql".to_string());
        let database_url = non_empty("DATABASE_URL").unwrap_or_else(default_database_url);
        let storage = StorageConfig::from_parts(&backend, &database_url)
            .with_context(|| format!("STORAGE_BACKEND must be 'sql' or 'memory', got '{}'", backend))?;

        let history_limit = match non_empty("HISTORY_LIMIT") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("HISTORY_LIMIT must be a positive integer, got '{}'", raw))?,
            None => DEFAULT_HISTORY_LIMIT,
        };
        if history_limit == 0 {
            bail!("HISTORY_LIMIT must be greater than zero");
        }

        Ok(Self {
            model_path: non_empty("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            model_sha256: non_empty("MODEL_SHA256"),
            storage,
            generation: GenerationConfig::from_lookup(&lookup),
            history_limit,
        })
    }
}

/// SQLite file under the platform data directory, created on first use
pub fn default_database_url() -> String {
    let path = dirs::data_local_dir()
        .map(|dir| dir.join("msme-risk").join("risk.db"))
        .unwrap_or_else(|| PathBuf::from("risk.db"));
    format!("sqlite://{}?mode=rwc", path.display())
}

/// Create the parent directory of a file-backed SQLite URL.
pub fn prepare_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    if file.is_empty() || file.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(file).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    Ok(())
}
