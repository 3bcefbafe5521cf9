use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub trade: TradeConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeConfig {
    /// Master switch; admission rejects every request when false
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds before a pending request expires
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Seconds a sender must wait between any two requests
    #[serde(default = "default_global_cooldown")]
    pub global_cooldown_secs: u64,
    /// Seconds a sender must wait between requests to the same target
    #[serde(default = "default_per_target_cooldown")]
    pub per_target_cooldown_secs: u64,
    /// Item slots per offer side
    #[serde(default = "default_offer_slots")]
    pub offer_slots: usize,
    /// Interval of the expiry sweep task
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    60
}

fn default_global_cooldown() -> u64 {
    60
}

fn default_per_target_cooldown() -> u64 {
    120
}

fn default_offer_slots() -> usize {
    12
}

fn default_sweep_interval() -> u64 {
    10
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout_secs: 60,
            global_cooldown_secs: 60,
            per_target_cooldown_secs: 120,
            offer_slots: 12,
            sweep_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// JSON-lines file holding the durable trade history
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    /// Most-recent entries kept in memory for lookups
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_history_path() -> PathBuf {
    PathBuf::from("data/history.jsonl")
}

fn default_cache_size() -> usize {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            cache_size: default_cache_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    /// Directory for the date-partitioned transaction journal
    #[serde(default = "default_journal_dir")]
    pub dir: PathBuf,
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("data/journal")
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: default_journal_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TRADEPOST_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TRADEPOST_TRADE__ENABLED, etc.)
            .add_source(
                Environment::with_prefix("TRADEPOST")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Create a default configuration rooted in a data directory
    pub fn default_config<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref();

        Self {
            trade: TradeConfig::default(),
            history: HistoryConfig {
                path: data_dir.join("history.jsonl"),
                cache_size: 100,
            },
            journal: JournalConfig {
                dir: data_dir.join("journal"),
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.trade.request_timeout_secs == 0 {
            errors.push("request_timeout_secs must be positive".to_string());
        }

        if self.trade.offer_slots == 0 || self.trade.offer_slots > 54 {
            errors.push("offer_slots must be between 1 and 54".to_string());
        }

        if self.trade.sweep_interval_secs == 0 {
            errors.push("sweep_interval_secs must be positive".to_string());
        }

        if self.trade.sweep_interval_secs > self.trade.request_timeout_secs {
            errors.push(
                "sweep_interval_secs should not exceed request_timeout_secs".to_string(),
            );
        }

        if self.history.cache_size == 0 {
            errors.push("history cache_size must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default_config("data");
        assert!(config.validate().is_ok());
        assert!(config.trade.enabled);
        assert_eq!(config.trade.request_timeout_secs, 60);
        assert_eq!(config.trade.global_cooldown_secs, 60);
        assert_eq!(config.trade.per_target_cooldown_secs, 120);
        assert_eq!(config.trade.offer_slots, 12);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = AppConfig::default_config("data");
        config.trade.request_timeout_secs = 0;
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("request_timeout_secs")));
    }

    #[test]
    fn test_validate_rejects_oversized_offer() {
        let mut config = AppConfig::default_config("data");
        config.trade.offer_slots = 100;
        assert!(config.validate().is_err());
    }
}
