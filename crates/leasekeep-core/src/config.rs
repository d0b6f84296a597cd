//! Engine configuration.
//!
//! Passed explicitly into every component at construction; nothing here is
//! process-global.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

pub const DEFAULT_DURATION_HOURS: u32 = 24;
pub const DEFAULT_MAX_DURATION_HOURS: u32 = 720;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_ROTATION_DELAY_MINUTES: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LeaseConfig {
    pub version: u32,

    /// SQLite database file.
    pub database_path: PathBuf,

    /// Identity recorded on audit entries for administrative actions
    /// (resource registration).
    pub admin_requester: String,

    pub lease: LeaseSection,
    pub sweeper: SweeperSection,
    pub rotation: RotationSection,
    pub storage: StorageSection,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            database_path: PathBuf::from("leasekeep.db"),
            admin_requester: "admin".to_string(),
            lease: LeaseSection::default(),
            sweeper: SweeperSection::default(),
            rotation: RotationSection::default(),
            storage: StorageSection::default(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LeaseSection {
    /// Duration used when a caller does not pick one.
    pub default_duration_hours: u32,
    /// Upper bound accepted by `allocate`.
    pub max_duration_hours: u32,
}

impl Default for LeaseSection {
    fn default() -> Self {
        Self {
            default_duration_hours: DEFAULT_DURATION_HOURS,
            max_duration_hours: DEFAULT_MAX_DURATION_HOURS,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SweeperSection {
    /// Seconds between reclamation passes. Bounds how long a lapsed lease
    /// can stay `active`.
    pub interval_secs: u64,
}

impl SweeperSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SweeperSection {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RotationSection {
    /// Minutes after reclamation before the credential rotation is due.
    pub delay_minutes: u32,
}

impl Default for RotationSection {
    fn default() -> Self {
        Self {
            delay_minutes: DEFAULT_ROTATION_DELAY_MINUTES,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// How long a connection waits on another connection's write lock.
    pub busy_timeout_ms: u64,
}

impl StorageSection {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl LeaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: SUPPORTED_CONFIG_VERSION,
            });
        }
        if self.lease.max_duration_hours == 0 {
            return Err(ConfigError::Invalid(
                "lease.max_duration_hours must be at least 1".into(),
            ));
        }
        if self.lease.default_duration_hours == 0
            || self.lease.default_duration_hours > self.lease.max_duration_hours
        {
            return Err(ConfigError::Invalid(format!(
                "lease.default_duration_hours must be within 1..={}",
                self.lease.max_duration_hours
            )));
        }
        if self.sweeper.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweeper.interval_secs must be at least 1".into(),
            ));
        }
        if self.admin_requester.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "admin_requester must not be empty".into(),
            ));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<LeaseConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<LeaseConfig, ConfigError> {
    let cfg: LeaseConfig = serde_yaml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

pub const SAMPLE_CONFIG: &str = r#"# leasekeep configuration
version: 1
database_path: leasekeep.db
admin_requester: admin

lease:
  default_duration_hours: 24
  max_duration_hours: 720

sweeper:
  # Maximum delay between a lease lapsing and its reclamation.
  interval_secs: 60

rotation:
  delay_minutes: 5

storage:
  busy_timeout_ms: 5000
"#;

pub fn write_sample_config(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, SAMPLE_CONFIG).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_matches_defaults() {
        let cfg = parse_config(SAMPLE_CONFIG).unwrap();
        assert_eq!(cfg, LeaseConfig::default());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let cfg = parse_config("version: 1\nsweeper:\n  interval_secs: 5\n").unwrap();
        assert_eq!(cfg.sweeper.interval(), Duration::from_secs(5));
        assert_eq!(cfg.lease.default_duration_hours, DEFAULT_DURATION_HOURS);
        assert_eq!(cfg.rotation.delay_minutes, DEFAULT_ROTATION_DELAY_MINUTES);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = parse_config("version: 2\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedVersion {
                found: 2,
                supported: 1
            }
        ));
    }

    #[test]
    fn test_rejects_default_above_max() {
        let err = parse_config(
            "version: 1\nlease:\n  default_duration_hours: 48\n  max_duration_hours: 24\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("default_duration_hours")));
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = parse_config("version: 1\nsweeper:\n  interval_secs: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let err = parse_config("version: 1\nsweep_every: 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}
