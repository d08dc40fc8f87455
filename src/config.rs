use config::{Config as ConfigBuilder, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_STORE_URI: &str = "mongodb://localhost:27017/quantaxis";
pub const DEFAULT_DATABASE: &str = "quantaxis";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix the query routes are nested under, e.g. `/backtest`. Empty serves at the root.
    #[serde(default)]
    pub base_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    pub uri: String,
    /// Overrides the database named in the URI path.
    #[serde(default)]
    pub database: Option<String>,
    pub query_timeout_ms: u64,
    pub app_name: String,
}

impl StoreConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Database to query: explicit setting, else the URI path, else `quantaxis`.
    pub fn database_name(&self) -> String {
        if let Some(name) = self.database.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        database_from_uri(&self.uri).unwrap_or_else(|| DEFAULT_DATABASE.to_string())
    }
}

impl ServerConfig {
    /// `base_path` normalized to `/segment` form, or `None` when serving at the root.
    pub fn mount_path(&self) -> Option<String> {
        let trimmed = self.base_path.trim().trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{}", trimmed))
        }
    }
}

/// `[MONGODB]` section of the platform settings file.
#[derive(Debug, Default, Deserialize)]
struct PlatformSettings {
    #[serde(default, alias = "MONGODB")]
    mongodb: Option<MongoSection>,
}

#[derive(Debug, Deserialize)]
struct MongoSection {
    #[serde(default, alias = "URI")]
    uri: Option<String>,
}

/// `~/.quantaxis/setting/config.ini`
pub fn platform_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".quantaxis").join("setting").join("config.ini"))
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(platform_settings_path().as_deref(), |key| std::env::var(key).ok())
    }

    pub fn load_with<F>(settings_file: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ConfigBuilder::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("server.base_path", "")?
            .set_default("store.uri", DEFAULT_STORE_URI)?
            .set_default("store.query_timeout_ms", 5000)?
            .set_default("store.app_name", "backtest-query-api")?
            .add_source(File::with_name("config/default").required(false));

        if let Some(run_env) = env("RUN_ENV") {
            builder = builder.add_source(File::with_name(&format!("config/{}", run_env)).required(false));
        }

        // The platform settings file is where the rest of the stack keeps its store URI
        if let Some(uri) = settings_file.and_then(read_platform_uri) {
            builder = builder.set_override("store.uri", uri)?;
        }

        // Environment wins over every file
        let overrides = [
            ("MONGOURI", "store.uri"),
            ("MONGO_DATABASE", "store.database"),
            ("QUERY_TIMEOUT_MS", "store.query_timeout_ms"),
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("BASE_PATH", "server.base_path"),
        ];
        for (var, key) in overrides {
            if let Some(value) = env(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let config: Self = builder.build()?.try_deserialize()?;

        // A zero deadline would fail every query before it is sent
        if config.store.query_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "store.query_timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }
}

fn read_platform_uri(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }

    let settings = ConfigBuilder::builder()
        .add_source(File::from(path).format(FileFormat::Ini))
        .build()
        .and_then(|c| c.try_deserialize::<PlatformSettings>());

    match settings {
        Ok(settings) => settings
            .mongodb
            .and_then(|section| section.uri)
            .filter(|uri| !uri.trim().is_empty()),
        Err(e) => {
            tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
            None
        }
    }
}

/// Database segment of a `mongodb://host[:port]/<db>?opts` URI.
fn database_from_uri(uri: &str) -> Option<String> {
    let rest = uri.split_once("://").map(|(_, rest)| rest)?;
    let (_, path) = rest.split_once('/')?;
    let name = path.split('?').next().unwrap_or_default();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
