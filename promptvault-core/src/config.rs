use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PromptVaultConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "prompt-manager".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for a throwaway store
    pub path: String,
    pub migrations_dir: String,
    pub busy_timeout_ms: u64,
    pub acquire_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: ".claude/apps/prompt_manager/database/prompts.db".to_string(),
            migrations_dir: "migrations".to_string(),
            busy_timeout_ms: 5000,
            acquire_timeout_seconds: 30,
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory(migrations_dir: impl Into<String>) -> Self {
        Self {
            path: ":memory:".to_string(),
            migrations_dir: migrations_dir.into(),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == ":memory:" || self.path.starts_with("file::memory:")
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub api_prefix: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_prefix: "/api/v1".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IngestConfig {
    pub queue_dir: String,
    pub poll_interval_seconds: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_dir: ".claude/apps/prompt_manager/queue/incoming".to_string(),
            poll_interval_seconds: 5,
        }
    }
}

impl PromptVaultConfig {
    /// Load from an optional TOML file, then `PROMPTVAULT__*` variables.
    /// A bare `PORT` variable still wins for the HTTP port.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("PROMPTVAULT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("http.port", port)?;
        }

        builder.build()?.try_deserialize()
    }
}
