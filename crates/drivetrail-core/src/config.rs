//! Configuration module for Drivetrail.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation, and defaults. The bearer credential
//! arrives here and nowhere else; the daemon never refreshes it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level configuration for Drivetrail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub store: StoreConfig,
    pub subscriptions: SubscriptionsConfig,
    pub sync: SyncConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

/// Provider credential and application identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Opaque bearer credential passed verbatim to the gateway.
    pub bearer: String,
    /// Application (client) id, GUID-shaped.
    pub client_id: String,
    /// Directory (tenant) id, GUID-shaped.
    pub tenant_id: String,
}

/// State store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Webhook subscription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionsConfig {
    /// Absolute URL the provider will POST notifications to. Must route to
    /// the daemon's `/notify` endpoint.
    pub notify_url: String,
    /// Minimum length of generated shared secrets.
    pub secret_floor: usize,
    /// Target subscription lifetime at creation/renewal, in hours. The
    /// provider caps this; roughly 70 hours for drive resources.
    pub lifetime_hours: u64,
    /// Renew when remaining life drops below this many hours.
    pub renew_threshold_hours: u64,
    /// Minutes between renewal/sweep passes in the daemon.
    pub maintenance_interval_minutes: u64,
}

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Initial state of the credential gate. Normally false: bootstrap
    /// enables the gate after validating the credential.
    pub delta_enabled: bool,
    /// Capacity of the bounded notification queue.
    pub queue_capacity: usize,
    /// Record UPDATE events for metadata-only changes (modified-at moved,
    /// name and parent unchanged). Off, such observations are skipped.
    pub emit_metadata_updates: bool,
}

/// HTTP surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to bind, e.g. `127.0.0.1:8090`.
    pub bind: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON-formatted log lines instead of human-readable ones.
    pub json: bool,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivetrail/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivetrail")
            .join("config.yaml")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("drivetrail");
        Self {
            path: data_dir.join("drivetrail.db"),
        }
    }
}

impl Default for SubscriptionsConfig {
    fn default() -> Self {
        Self {
            notify_url: String::new(),
            secret_floor: 32,
            lifetime_hours: 70,
            renew_threshold_hours: 24,
            maintenance_interval_minutes: 60,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            delta_enabled: false,
            queue_capacity: 256,
            emit_metadata_updates: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8090".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"subscriptions.notify_url"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Generated shared secrets must never be shorter than this, regardless of
/// what the configuration asks for.
pub const MIN_SECRET_FLOOR: usize = 32;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- provider ---
        if self.provider.bearer.trim().is_empty() {
            errors.push(ValidationError {
                field: "provider.bearer".into(),
                message: "bearer credential must not be empty".into(),
            });
        }
        if Uuid::parse_str(&self.provider.client_id).is_err() {
            errors.push(ValidationError {
                field: "provider.client_id".into(),
                message: "must be a GUID".into(),
            });
        }
        if Uuid::parse_str(&self.provider.tenant_id).is_err() {
            errors.push(ValidationError {
                field: "provider.tenant_id".into(),
                message: "must be a GUID".into(),
            });
        }

        // --- subscriptions ---
        match url::Url::parse(&self.subscriptions.notify_url) {
            Ok(parsed) => {
                if !matches!(parsed.scheme(), "http" | "https") {
                    errors.push(ValidationError {
                        field: "subscriptions.notify_url".into(),
                        message: "must be an http(s) URL".into(),
                    });
                } else if !parsed.path().ends_with("/notify") {
                    errors.push(ValidationError {
                        field: "subscriptions.notify_url".into(),
                        message: "must point at the /notify endpoint".into(),
                    });
                }
            }
            Err(_) => errors.push(ValidationError {
                field: "subscriptions.notify_url".into(),
                message: "must be an absolute URL".into(),
            }),
        }
        if self.subscriptions.secret_floor < MIN_SECRET_FLOOR {
            errors.push(ValidationError {
                field: "subscriptions.secret_floor".into(),
                message: format!("must be at least {MIN_SECRET_FLOOR}"),
            });
        }
        if self.subscriptions.lifetime_hours <= self.subscriptions.renew_threshold_hours {
            errors.push(ValidationError {
                field: "subscriptions.lifetime_hours".into(),
                message: "must exceed renew_threshold_hours".into(),
            });
        }
        if self.subscriptions.maintenance_interval_minutes == 0 {
            errors.push(ValidationError {
                field: "subscriptions.maintenance_interval_minutes".into(),
                message: "must be greater than zero".into(),
            });
        }

        // --- sync ---
        if self.sync.queue_capacity == 0 {
            errors.push(ValidationError {
                field: "sync.queue_capacity".into(),
                message: "must be greater than zero".into(),
            });
        }

        // --- http ---
        if self.http.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError {
                field: "http.bind".into(),
                message: "must be a socket address like 127.0.0.1:8090".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!("must be one of {}", VALID_LOG_LEVELS.join(", ")),
            });
        }

        errors
    }
}
