//! Configuration for the forumbell CLI.
//!
//! One flat TOML file plus `FORUMBELL_*` environment overrides, translated
//! into `forumbell_core::RegistryConfig` and `TransportConfig`. The core
//! never reads files itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use forumbell_core::{PairingOptions, RegistryConfig, TransportConfig};

/// Smallest RSA modulus we are willing to generate.
pub const MIN_KEY_BITS: usize = 1024;

const ENV_PREFIX: &str = "FORUMBELL_";
const FALLBACK_DEVICE_NAME: &str = "Unknown Device";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Name shown to sites when pairing. Defaults to the host name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    /// Where sites and the device key pair are stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Per-request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds between refreshes in watch mode; 0 refreshes once.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    #[serde(default = "default_key_bits")]
    pub key_bits: usize,

    #[serde(default = "default_push_url")]
    pub push_url: String,

    #[serde(default = "default_auth_redirect")]
    pub auth_redirect: String,

    #[serde(default = "default_application_label")]
    pub application_label: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_name: None,
            data_dir: None,
            timeout: default_timeout(),
            refresh_interval: default_refresh_interval(),
            key_bits: default_key_bits(),
            push_url: default_push_url(),
            auth_redirect: default_auth_redirect(),
            application_label: default_application_label(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_refresh_interval() -> u64 {
    300
}
fn default_key_bits() -> usize {
    RegistryConfig::default().key_bits
}
fn default_push_url() -> String {
    PairingOptions::default().push_url
}
fn default_auth_redirect() -> String {
    PairingOptions::default().auth_redirect
}
fn default_application_label() -> String {
    PairingOptions::default().application_label
}

impl Config {
    /// Reject values the registry cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.key_bits < MIN_KEY_BITS {
            return Err(ConfigError::Validation {
                field: "key_bits".into(),
                reason: format!("must be at least {MIN_KEY_BITS}, got {}", self.key_bits),
            });
        }
        if !self.auth_redirect.contains("://") {
            return Err(ConfigError::Validation {
                field: "auth_redirect".into(),
                reason: format!("expected a URI with a scheme, got '{}'", self.auth_redirect),
            });
        }
        Ok(())
    }

    /// The device name sent in pairing requests.
    pub fn resolve_device_name(&self) -> String {
        self.device_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
            .unwrap_or_else(|| FALLBACK_DEVICE_NAME.into())
    }

    /// Configured data directory, or the platform default.
    pub fn resolve_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Interval for watch mode; `None` when polling is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval > 0).then(|| Duration::from_secs(self.refresh_interval))
    }

    pub fn to_registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            key_bits: self.key_bits,
            pairing: PairingOptions {
                push_url: self.push_url.clone(),
                auth_redirect: self.auth_redirect.clone(),
                application_label: self.application_label.clone(),
            },
            ..RegistryConfig::default()
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(Duration::from_secs(self.timeout))
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "forumbell", "forumbell")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Platform data directory for sites and keys.
pub fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn home_fallback(sub: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(sub);
    p.push("forumbell");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
}

/// Load config from `path` + environment, then validate it.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_registry_defaults() {
        let cfg = Config::default();
        let registry = cfg.to_registry_config();
        assert_eq!(registry, RegistryConfig::default());
        assert_eq!(cfg.transport_config().timeout, Duration::from_secs(30));
        assert_eq!(cfg.refresh_interval(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn file_then_env_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                    device_name = "Desk"
                    timeout = 10
                    application_label = "Forum"
                "#,
            )?;
            jail.set_env("FORUMBELL_TIMEOUT", "5");
            jail.set_env("FORUMBELL_DATA_DIR", "/tmp/forumbell-data");

            let cfg = load_config_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(cfg.device_name.as_deref(), Some("Desk"));
            assert_eq!(cfg.timeout, 5);
            assert_eq!(cfg.application_label, "Forum");
            assert_eq!(cfg.resolve_data_dir(), PathBuf::from("/tmp/forumbell-data"));
            assert_eq!(cfg.key_bits, 2048);
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let cfg = load_config_from(&jail.directory().join("absent.toml")).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "key_bits = 512")?;
            let err = load_config_from(&jail.directory().join("config.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "key_bits"));
            Ok(())
        });

        let cfg = Config {
            timeout: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_interval_disables_polling() {
        let cfg = Config {
            refresh_interval: 0,
            ..Config::default()
        };
        assert_eq!(cfg.refresh_interval(), None);
    }

    #[test]
    fn device_name_prefers_config() {
        let cfg = Config {
            device_name: Some("Kitchen iPad".into()),
            ..Config::default()
        };
        assert_eq!(cfg.resolve_device_name(), "Kitchen iPad");
    }

    #[test]
    fn device_name_falls_back_to_host_then_placeholder() {
        Jail::expect_with(|jail| {
            jail.set_env("HOSTNAME", "build-box");
            assert_eq!(Config::default().resolve_device_name(), "build-box");

            jail.set_env("HOSTNAME", "");
            assert_eq!(Config::default().resolve_device_name(), "Unknown Device");
            Ok(())
        });
    }

    #[test]
    fn pairing_fields_flow_into_registry_config() {
        let cfg = Config {
            push_url: "https://push.example/notify".into(),
            auth_redirect: "forumbell://auth".into(),
            key_bits: 4096,
            ..Config::default()
        };
        let registry = cfg.to_registry_config();
        assert_eq!(registry.key_bits, 4096);
        assert_eq!(registry.pairing.push_url, "https://push.example/notify");
        assert_eq!(registry.pairing.auth_redirect, "forumbell://auth");
        assert_eq!(registry.sites_key, "sites");
    }

    #[test]
    fn saved_config_loads_back() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested/config.toml");
            let cfg = Config {
                device_name: Some("Desk".into()),
                refresh_interval: 60,
                ..Config::default()
            };
            save_config_to(&cfg, &path).unwrap();
            assert_eq!(load_config_from(&path).unwrap(), cfg);
            Ok(())
        });
    }
}
