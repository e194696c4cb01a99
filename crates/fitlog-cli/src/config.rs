//! CLI configuration from environment variables and data directories.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use fitlog_core::engine::SyncEngine;
use fitlog_core::integrity::IntegrityChecker;
use fitlog_core::store::{HttpRemote, HttpRemoteConfig, LibSqlCache, LocalCache, RemoteStore};
use fitlog_core::util::normalize_text_option;

use crate::error::CliError;

/// Environment-provided settings for the CLI.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub owner_id: Option<String>,
    pub db_path: Option<PathBuf>,
}

impl CliConfig {
    /// Read settings from the environment (after dotenv loading).
    pub fn from_env() -> Self {
        Self {
            api_url: env_var("FITLOG_API_URL"),
            api_key: env_var("FITLOG_API_KEY"),
            access_token: env_var("FITLOG_ACCESS_TOKEN"),
            owner_id: env_var("FITLOG_OWNER_ID"),
            db_path: env_var("FITLOG_DB_PATH").map(PathBuf::from),
        }
    }

    /// The owner whose data is synchronized.
    pub fn owner_id(&self) -> Result<String, CliError> {
        self.owner_id
            .clone()
            .ok_or_else(|| CliError::MissingConfig("FITLOG_OWNER_ID is not set".to_string()))
    }

    /// Local database path, defaulting to the platform data directory.
    pub fn resolved_db_path(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path
            .or_else(|| self.db_path.clone())
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("fitlog")
                    .join("fitlog.db")
            })
    }
}

fn env_var(name: &str) -> Option<String> {
    normalize_text_option(env::var(name).ok())
}

/// Shared handles the subcommands operate on.
pub struct AppContext {
    pub engine: SyncEngine,
    pub checker: IntegrityChecker,
    pub owner_id: String,
}

impl AppContext {
    /// Open the local cache and remote client and wire up the core.
    pub async fn open(config: &CliConfig, db_path: Option<PathBuf>) -> Result<Self, CliError> {
        let owner_id = config.owner_id()?;

        let remote = HttpRemote::new(HttpRemoteConfig {
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
        })
        .map_err(|error| match error {
            fitlog_core::Error::InvalidInput(_) => {
                CliError::MissingConfig("FITLOG_API_URL must be a valid http(s) URL".to_string())
            }
            other => CliError::Core(other),
        })?;
        let remote: Arc<dyn RemoteStore> = Arc::new(remote);

        let cache_path = config.resolved_db_path(db_path);
        tracing::debug!("Opening local cache at {}", cache_path.display());
        let cache: Arc<dyn LocalCache> = Arc::new(LibSqlCache::open(&cache_path).await?);

        // Engine and checker share the change log and metadata stores,
        // so watermark writes go through one lock.
        let engine = SyncEngine::new(Arc::clone(&remote), Arc::clone(&cache));
        let checker = IntegrityChecker::with_stores(
            remote,
            cache,
            engine.change_log().clone(),
            engine.metadata().clone(),
        );

        Ok(Self {
            engine,
            checker,
            owner_id,
        })
    }
}
