use std::env;
use std::fmt;
use std::path::PathBuf;

/// Page sizes offered by candidate listings.
pub const PAGE_SIZES: [usize; 4] = [10, 20, 50, 100];

/// Distinguishes runtime behavior for different stages of the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub storage: StorageConfig,
    pub listing: ListingConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let data_path = env::var("APP_DATA_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("lodge-ledger.json"));
        if data_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataPath);
        }

        let raw_page_size = env::var("APP_PAGE_SIZE").unwrap_or_else(|_| "10".to_string());
        let page_size = raw_page_size
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|size| PAGE_SIZES.contains(size))
            .ok_or(ConfigError::InvalidPageSize(raw_page_size))?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            storage: StorageConfig { data_path },
            listing: ListingConfig { page_size },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Location of the JSON snapshot backing the store.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_path: PathBuf,
}

/// Defaults for candidate listings.
#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub page_size: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZES[0],
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    EmptyDataPath,
    InvalidPageSize(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyDataPath => write!(f, "APP_DATA_PATH must not be empty"),
            ConfigError::InvalidPageSize(value) => write!(
                f,
                "APP_PAGE_SIZE must be one of 10, 20, 50 or 100 (found '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_DATA_PATH");
        env::remove_var("APP_PAGE_SIZE");
        env::remove_var("APP_LOG_LEVEL");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.storage.data_path, PathBuf::from("lodge-ledger.json"));
        assert_eq!(config.listing.page_size, 10);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn rejects_page_sizes_outside_the_offered_set() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_PAGE_SIZE", "25");
        match AppConfig::load() {
            Err(ConfigError::InvalidPageSize(value)) => assert_eq!(value, "25"),
            other => panic!("expected invalid page size, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn reads_environment_and_page_size_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        env::set_var("APP_PAGE_SIZE", "50");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.listing.page_size, 50);
        reset_env();
    }
}
