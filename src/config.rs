//! Process configuration (spec §A.3): layered loading (defaults → YAML file
//! → `GUARDIAN_`-prefixed environment variables → CLI flags) via the
//! `config` crate, with the hottest sub-values (log level, rate limits)
//! behind an `ArcSwap` so a SIGHUP or config-file edit takes effect without
//! a restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    #[serde(with = "humantime_serde")]
    pub dead_man_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub sla_recompute_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub prune_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub startup_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dead_man_interval: Duration::from_secs(60),
            sla_recompute_interval: Duration::from_secs(5 * 60),
            prune_interval: Duration::from_secs(60 * 60),
            startup_grace: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: String,
    pub dsn: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            dsn: "sqlite://./guardian.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryRetentionConfig {
    pub default_days: u32,
    pub max_days: u32,
}

impl Default for HistoryRetentionConfig {
    fn default() -> Self {
        Self {
            default_days: 30,
            max_days: 90,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    pub max_alerts_per_hour: u32,
    pub alert_burst_limit: u32,
    pub max_remediations_per_hour: u32,
    pub remediation_burst_limit: u32,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            max_alerts_per_hour: 200,
            alert_burst_limit: 20,
            max_remediations_per_hour: 50,
            remediation_burst_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api: BindConfig,
    pub metrics: BindConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api: BindConfig {
                bind: "0.0.0.0".to_string(),
                port: 8080,
            },
            metrics: BindConfig {
                bind: "0.0.0.0".to_string(),
                port: 9090,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    pub liveness_path: String,
    pub readiness_path: String,
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            liveness_path: "/healthz".to_string(),
            readiness_path: "/readyz".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderElectionConfig {
    pub enabled: bool,
    pub lease_name: String,
    pub lease_namespace: String,
    #[serde(with = "humantime_serde")]
    pub lease_duration: Duration,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            lease_name: "cronjob-guardian".to_string(),
            lease_namespace: "default".to_string(),
            lease_duration: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookTlsConfig {
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
}

/// Global log/event capture defaults (spec §4.6, §6); a monitor's own
/// `dataRetention` flags take priority when set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LogCaptureConfig {
    pub store_logs: bool,
    pub store_events: bool,
    pub max_log_size_kb: u32,
}

impl Default for LogCaptureConfig {
    fn default() -> Self {
        Self {
            store_logs: false,
            store_events: false,
            max_log_size_kb: 16,
        }
    }
}

/// Top-level process settings (spec §A.3). Every field has a default, so a
/// completely absent config file and no environment overrides still
/// produces a usable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardianSettings {
    pub log: LogConfig,
    pub scheduler: SchedulerConfig,
    pub storage: StorageConfig,
    pub history_retention: HistoryRetentionConfig,
    pub rate_limits: RateLimitsConfig,
    pub server: ServerConfig,
    pub probes: ProbesConfig,
    pub leader_election: LeaderElectionConfig,
    pub webhook_tls: WebhookTlsConfig,
    pub log_capture: LogCaptureConfig,
    #[serde(skip)]
    pub dry_run: bool,
}

impl Default for GuardianSettings {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            history_retention: HistoryRetentionConfig::default(),
            rate_limits: RateLimitsConfig::default(),
            server: ServerConfig::default(),
            probes: ProbesConfig::default(),
            leader_election: LeaderElectionConfig::default(),
            webhook_tls: WebhookTlsConfig::default(),
            log_capture: LogCaptureConfig::default(),
            dry_run: false,
        }
    }
}

/// CLI overrides applied after the file/env layers (spec §A.1, §A.3).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub leader_elect: Option<bool>,
    pub metrics_port: Option<u16>,
    pub log_level: Option<String>,
    pub dry_run: bool,
}

impl GuardianSettings {
    /// Layers defaults, an optional YAML file, `GUARDIAN_`-prefixed
    /// environment variables (with `.`/`-` mapped to `_`), and finally CLI
    /// flags. Unknown keys in any layer are ignored rather than rejected.
    pub fn load(cli: &CliOverrides) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("log.level", defaults.log.level.clone())
            .map_err(config_err)?
            .add_source(config::Environment::with_prefix("GUARDIAN").separator("_"));

        if let Some(path) = &cli.config_path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path.as_path()));
            } else {
                return Err(ConfigError::Load {
                    path: path.display().to_string(),
                    source: Arc::new(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "config file not found",
                    )),
                }
                .into());
            }
        } else {
            builder = builder.add_source(
                config::File::with_name("guardian").required(false),
            );
        }

        let layered = builder.build().map_err(config_err)?;

        let mut settings: Self = layered
            .try_deserialize()
            .unwrap_or_else(|_| defaults.clone());

        if let Some(level) = &cli.log_level {
            settings.log.level = level.clone();
        }
        if let Some(port) = cli.metrics_port {
            settings.server.metrics.port = port;
        }
        if let Some(enabled) = cli.leader_elect {
            settings.leader_election.enabled = enabled;
        }
        settings.dry_run = cli.dry_run;

        Ok(settings)
    }
}

fn config_err(e: config::ConfigError) -> crate::error::Error {
    ConfigError::Invalid(e.to_string()).into()
}

/// Wraps the hot sub-values (log level, rate limits) in an `ArcSwap` and
/// watches the config file for changes, reloading atomically on write
/// (spec §A.3). Reconcilers and the dispatcher read through this handle
/// rather than a plain `GuardianSettings` so a config edit is observed on
/// the next read without a restart.
pub struct SettingsHandle {
    inner: Arc<ArcSwap<GuardianSettings>>,
    cli: CliOverrides,
}

impl SettingsHandle {
    pub fn new(initial: GuardianSettings, cli: CliOverrides) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(initial)),
            cli,
        }
    }

    pub fn current(&self) -> Arc<GuardianSettings> {
        self.inner.load_full()
    }

    pub fn reload(&self) -> Result<()> {
        let fresh = GuardianSettings::load(&self.cli)?;
        self.inner.store(Arc::new(fresh));
        Ok(())
    }

    /// Spawns a filesystem watcher over `path` that calls [`Self::reload`]
    /// on every write event. Errors establishing the watch are logged, not
    /// fatal: the process still runs with the settings loaded at startup.
    pub fn watch_file(self: &Arc<Self>, path: &Path) {
        use notify::{RecursiveMode, Watcher};

        let handle = Arc::clone(self);
        let path = path.to_path_buf();

        std::thread::spawn(move || {
            let (tx, rx) = std::sync::mpsc::channel();
            let mut watcher = match notify::recommended_watcher(tx) {
                Ok(w) => w,
                Err(error) => {
                    tracing::warn!(%error, "failed to start config file watcher");
                    return;
                }
            };

            if let Err(error) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                tracing::warn!(%error, path = %path.display(), "failed to watch config file");
                return;
            }

            for event in rx {
                if event.is_err() {
                    continue;
                }
                match handle.reload() {
                    Ok(()) => tracing::info!(path = %path.display(), "reloaded configuration"),
                    Err(error) => tracing::warn!(%error, "config reload failed, keeping previous settings"),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_fully_populated_with_no_sources() {
        let cli = CliOverrides::default();
        let settings = GuardianSettings::load(&cli).unwrap();
        assert_eq!(settings.log.level, "info");
        assert_eq!(settings.scheduler.dead_man_interval, Duration::from_secs(60));
        assert_eq!(settings.history_retention.default_days, 30);
    }

    #[test]
    fn cli_overrides_win_over_defaults() {
        let cli = CliOverrides {
            log_level: Some("debug".to_string()),
            metrics_port: Some(9999),
            dry_run: true,
            ..Default::default()
        };
        let settings = GuardianSettings::load(&cli).unwrap();
        assert_eq!(settings.log.level, "debug");
        assert_eq!(settings.server.metrics.port, 9999);
        assert!(settings.dry_run);
    }

    #[test]
    fn missing_explicit_config_path_is_an_error() {
        let cli = CliOverrides {
            config_path: Some(PathBuf::from("/nonexistent/guardian.yaml")),
            ..Default::default()
        };
        assert!(GuardianSettings::load(&cli).is_err());
    }
}
