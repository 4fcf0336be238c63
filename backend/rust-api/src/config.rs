use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub store: StoreConfig,
    pub jwt_secret: String,
    /// `user:password` expected on `GET /metrics`
    pub metrics_auth: String,
    pub recurrence: RecurrenceSettings,
    pub leaderboard: LeaderboardSettings,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = config::ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(config::ConfigError::Message(format!(
                "Unknown store backend '{}' (expected 'mongo' or 'memory')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongo_uri: String,
    pub mongo_database: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecurrenceSettings {
    /// Weekly occurrences the sweep keeps ahead of the latest due session of a series
    pub horizon_weeks: u32,
    /// Upper bound for `weeks_ahead` on explicit materialization
    pub max_weeks_ahead: u32,
    pub worker_interval_secs: u64,
}

impl Default for RecurrenceSettings {
    fn default() -> Self {
        Self {
            horizon_weeks: 1,
            max_weeks_ahead: 52,
            worker_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LeaderboardSettings {
    pub default_limit: u32,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self { default_limit: 50 }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Load environment variables from root .env file (two levels up)
        // Try root .env first, then fallback to local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        // Determine environment (defaults to dev)
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let string_setting = |key: &str, env_key: &str| {
            settings
                .get_string(key)
                .ok()
                .or_else(|| env::var(env_key).ok())
        };
        let number_setting = |key: &str, env_key: &str| -> Result<Option<i64>, config::ConfigError> {
            if let Ok(value) = settings.get_int(key) {
                return Ok(Some(value));
            }
            match env::var(env_key) {
                Ok(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                    config::ConfigError::Message(format!("{} must be an integer", env_key))
                }),
                Err(_) => Ok(None),
            }
        };

        let bind_addr =
            string_setting("server.bind_addr", "BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8081".into());

        let backend = match string_setting("store.backend", "STORE_BACKEND") {
            Some(raw) => raw.parse::<StoreBackend>()?,
            None => StoreBackend::Mongo,
        };

        let mongo_uri = string_setting("database.mongo_uri", "MONGO_URI")
            .unwrap_or_else(|| "mongodb://localhost:27017".to_string());

        let mongo_database = string_setting("database.mongo_database", "MONGO_DATABASE")
            .unwrap_or_else(|| "learnhub".to_string());

        let jwt_secret = match string_setting("auth.jwt_secret", "JWT_SECRET") {
            Some(secret) => secret,
            None if app_env == "prod" => {
                return Err(config::ConfigError::Message(
                    "JWT_SECRET must be set in production".to_string(),
                ));
            }
            None => {
                tracing::warn!("Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            }
        };

        let metrics_auth = string_setting("metrics.auth", "METRICS_AUTH").unwrap_or_else(|| {
            tracing::warn!("METRICS_AUTH not set, using default metrics credentials");
            "admin:changeme".to_string()
        });

        let defaults = RecurrenceSettings::default();
        let recurrence = RecurrenceSettings {
            horizon_weeks: number_setting("recurrence.horizon_weeks", "RECURRENCE_HORIZON_WEEKS")?
                .map(|v| v.max(0) as u32)
                .unwrap_or(defaults.horizon_weeks),
            max_weeks_ahead: number_setting(
                "recurrence.max_weeks_ahead",
                "RECURRENCE_MAX_WEEKS_AHEAD",
            )?
            .map(|v| v.max(0) as u32)
            .unwrap_or(defaults.max_weeks_ahead),
            worker_interval_secs: number_setting(
                "recurrence.worker_interval_secs",
                "RECURRENCE_WORKER_INTERVAL_SECS",
            )?
            .map(|v| v.max(0) as u64)
            .unwrap_or(defaults.worker_interval_secs),
        };
        recurrence.validate()?;

        let leaderboard = LeaderboardSettings {
            default_limit: number_setting("leaderboard.default_limit", "LEADERBOARD_DEFAULT_LIMIT")?
                .map(|v| v.clamp(1, 100) as u32)
                .unwrap_or(LeaderboardSettings::default().default_limit),
        };

        Ok(Config {
            bind_addr,
            store: StoreConfig {
                backend,
                mongo_uri,
                mongo_database,
            },
            jwt_secret,
            metrics_auth,
            recurrence,
            leaderboard,
        })
    }
}

impl RecurrenceSettings {
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.max_weeks_ahead == 0 {
            return Err(config::ConfigError::Message(
                "recurrence.max_weeks_ahead must be at least 1".to_string(),
            ));
        }
        if self.horizon_weeks == 0 || self.horizon_weeks > self.max_weeks_ahead {
            return Err(config::ConfigError::Message(format!(
                "recurrence.horizon_weeks must be between 1 and {}",
                self.max_weeks_ahead
            )));
        }
        if self.worker_interval_secs == 0 {
            return Err(config::ConfigError::Message(
                "recurrence.worker_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_store_backend() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!(" MongoDB ".parse::<StoreBackend>().unwrap(), StoreBackend::Mongo);
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn recurrence_horizon_must_fit_max() {
        let settings = RecurrenceSettings {
            horizon_weeks: 8,
            max_weeks_ahead: 4,
            worker_interval_secs: 60,
        };
        assert!(settings.validate().is_err());
        assert!(RecurrenceSettings::default().validate().is_ok());
    }
}
