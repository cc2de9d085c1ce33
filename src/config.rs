use crate::error::AppError;
use crate::services::database::DatabaseType;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub default_db: String,
    pub databases: HashMap<String, BackendConfig>,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
    pub safety: SafetyConfig,
}

/// Connection parameters for one named backend.
///
/// `type` defaults to the entry's name, so `"sqlite": { "path": ... }` is enough.
/// Client/server backends take either a full `url` or the individual parts.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(rename = "type")]
    pub db_type: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(default)]
    pub seed_sample_data: bool,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_query_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// `chat` or `generate`
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub check_on_startup: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    pub confirm_dangerous: bool,
}

/// The backend selected by `default_db`, resolved against `databases`
#[derive(Debug, Clone)]
pub struct ActiveBackend<'a> {
    pub name: &'a str,
    pub db_type: DatabaseType,
    pub config: &'a BackendConfig,
}

impl Config {
    /// Load configuration from a JSON file, then apply environment overrides.
    /// The result is validated; an unusable backend selection is an error here.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let file = config::File::new(&path.to_string_lossy(), config::FileFormat::Json);
        let mut builder = Self::builder_with_defaults()?.add_source(file);

        if let Ok(default_db) = env::var("DEFAULT_DB") {
            builder = builder.set_override("default_db", default_db)?;
        }

        if let Ok(base_url) = env::var("LLM_BASE_URL") {
            builder = builder.set_override("llm.base_url", base_url)?;
        }

        if let Ok(model) = env::var("LLM_MODEL") {
            builder = builder.set_override("llm.model", model)?;
        }

        if let Ok(api_key) = env::var("LLM_API_KEY") {
            builder = builder.set_override("llm.api_key", api_key)?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        if let Ok(log_dir) = env::var("QUERY_LOG_DIR") {
            builder = builder.set_override("logging.dir", log_dir)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON string without environment overrides
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        let config: Config = Self::builder_with_defaults()?
            .add_source(config::File::from_str(json, config::FileFormat::Json))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn builder_with_defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, AppError> {
        Ok(config::Config::builder()
            .set_default("llm.base_url", "http://localhost:11434")?
            .set_default("llm.model", "qwen2.5-coder:7b")?
            .set_default("llm.endpoint", "chat")?
            .set_default("llm.timeout_secs", 30)?
            .set_default("llm.check_on_startup", true)?
            .set_default("logging.level", "info")?
            .set_default("logging.dir", "logs")?
            .set_default("safety.confirm_dangerous", true)?)
    }

    /// Replace the active backend selection (the `--db` startup flag)
    pub fn select_backend(&mut self, name: &str) -> Result<(), AppError> {
        self.default_db = name.to_string();
        self.validate()
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let active = self.active_backend()?;
        active.config.connection_target(active.db_type)?;

        match self.llm.endpoint.as_str() {
            "chat" | "generate" => {}
            other => {
                return Err(AppError::Config(format!(
                    "llm.endpoint must be 'chat' or 'generate', got '{}'",
                    other
                )))
            }
        }

        if self.llm.base_url.trim().is_empty() {
            return Err(AppError::Config("llm.base_url must not be empty".to_string()));
        }

        Ok(())
    }

    /// Resolve `default_db` to its entry and backend type
    pub fn active_backend(&self) -> Result<ActiveBackend<'_>, AppError> {
        let (name, backend) = self
            .databases
            .get_key_value(&self.default_db)
            .or_else(|| {
                self.databases
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(&self.default_db))
            })
            .ok_or_else(|| {
                AppError::Config(format!(
                    "default_db '{}' has no entry under 'databases'",
                    self.default_db
                ))
            })?;

        let type_name = backend.db_type.as_deref().unwrap_or(name);
        let db_type = type_name
            .parse::<DatabaseType>()
            .map_err(|_| {
                AppError::Config(format!(
                    "backend '{}': Unsupported database type: {} (expected sqlite, postgresql or mysql)",
                    name, type_name
                ))
            })?;

        Ok(ActiveBackend {
            name,
            db_type,
            config: backend,
        })
    }
}

impl BackendConfig {
    /// The file path (sqlite) or connection URL (client/server) for this backend
    pub fn connection_target(&self, db_type: DatabaseType) -> Result<String, AppError> {
        match db_type {
            DatabaseType::Sqlite => self
                .path
                .clone()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| AppError::Config("sqlite backend requires a 'path'".to_string())),
            DatabaseType::PostgreSQL | DatabaseType::MySQL => {
                if let Some(url) = &self.url {
                    return Ok(url.clone());
                }
                self.build_url(db_type)
            }
        }
    }

    fn build_url(&self, db_type: DatabaseType) -> Result<String, AppError> {
        let (scheme, default_port) = match db_type {
            DatabaseType::PostgreSQL => ("postgres", 5432),
            DatabaseType::MySQL => ("mysql", 3306),
            DatabaseType::Sqlite => {
                return Err(AppError::Internal("sqlite has no connection URL".to_string()))
            }
        };

        let host = self.host.as_deref().ok_or_else(|| {
            AppError::Config(format!(
                "{} backend requires either 'url' or 'host'",
                db_type.as_str()
            ))
        })?;

        let mut url = Url::parse(&format!("{}://{}", scheme, host))
            .map_err(|e| AppError::Config(format!("Invalid host '{}': {}", host, e)))?;

        url.set_port(Some(self.port.unwrap_or(default_port)))
            .map_err(|_| AppError::Config(format!("Cannot set port on '{}'", host)))?;

        if let Some(user) = &self.user {
            url.set_username(user)
                .map_err(|_| AppError::Config(format!("Cannot set user on '{}'", host)))?;
        }

        if let Some(password) = &self.password {
            url.set_password(Some(password))
                .map_err(|_| AppError::Config(format!("Cannot set password on '{}'", host)))?;
        }

        if let Some(database) = &self.database {
            url.set_path(&format!("/{}", database));
        }

        Ok(url.to_string())
    }
}
