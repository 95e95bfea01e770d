// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub engine: EngineConfig,
    pub webhooks: WebhookConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
    #[serde(default)]
    pub seed_reference_data: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_hours: u64,
}

/// Settings for the external workflow-automation engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub base_url: String,
    pub api_key: String,
    /// Public base URL of this service, used to build callback URLs
    pub callback_base_url: String,
    pub trigger_timeout_seconds: u64,
    pub booking_timeout_seconds: u64,
    pub status_timeout_seconds: u64,
    /// When the engine is unreachable, synthesize a local analysis result
    /// instead of failing the consultation (development only)
    #[serde(default)]
    pub allow_fallback: bool,
    /// Simulated processing delay for the local fallback, in seconds
    #[serde(default = "default_mock_delay")]
    pub mock_delay_seconds: u64,
}

fn default_mock_delay() -> u64 {
    2
}

/// Rate limiting applied to inbound engine callbacks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.redis.url.is_empty() {
            return Err("Redis URL cannot be empty".to_string());
        }

        if self.auth.jwt_secret.is_empty() {
            return Err("JWT secret cannot be empty".to_string());
        }

        if self.engine.base_url.is_empty() {
            return Err("Engine base_url cannot be empty".to_string());
        }
        if self.engine.callback_base_url.is_empty() {
            return Err("Engine callback_base_url cannot be empty".to_string());
        }
        if self.engine.trigger_timeout_seconds == 0 {
            return Err("Engine trigger_timeout_seconds must be greater than 0".to_string());
        }

        if self.webhooks.rate_limit_window_seconds == 0 {
            return Err("Webhook rate_limit_window_seconds must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/triage_dev".to_string(),
                max_connections: 10,
                min_connections: 2,
                connect_timeout_seconds: 30,
                run_migrations: true,
                seed_reference_data: false,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                pool_size: 10,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                jwt_expiration_hours: 24,
            },
            engine: EngineConfig {
                base_url: "http://localhost:5678".to_string(),
                api_key: "development-key".to_string(),
                callback_base_url: "http://localhost:8080".to_string(),
                trigger_timeout_seconds: 30,
                booking_timeout_seconds: 60,
                status_timeout_seconds: 10,
                allow_fallback: true,
                mock_delay_seconds: 2,
            },
            webhooks: WebhookConfig {
                rate_limit_max_requests: 60,
                rate_limit_window_seconds: 60,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                tracing_endpoint: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_empty_database_url() {
        let mut settings = Settings::default();
        settings.database.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_zero_port() {
        let mut settings = Settings::default();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_empty_jwt_secret() {
        let mut settings = Settings::default();
        settings.auth.jwt_secret = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_empty_callback_base_url() {
        let mut settings = Settings::default();
        settings.engine.callback_base_url = String::new();
        assert!(settings.validate().is_err());
    }
}
