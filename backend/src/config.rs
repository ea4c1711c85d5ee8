//! Daemon configuration, read from a YAML file.
//!
//! ```yaml
//! log_level: debug
//! scheduler:
//!   sweep_interval_secs: 3600
//!   reminder_cooldown_days: 3
//! contacts:
//!   - reference: bob
//!     name: Bob
//!     email: bob@example.com
//!     user_id: user-bob
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::reminder_scheduler::{
    DEFAULT_REMINDER_COOLDOWN_DAYS, MAX_REMINDER_COOLDOWN_DAYS,
};
use crate::domain::Contact;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub sweep_interval_secs: u64,
    pub reminder_cooldown_days: i64,
    pub notification_timeout_secs: u64,
    /// Sweep once right away instead of waiting a full interval
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 24 * 60 * 60,
            reminder_cooldown_days: DEFAULT_REMINDER_COOLDOWN_DAYS,
            notification_timeout_secs: 10,
            run_on_startup: true,
        }
    }
}

impl SchedulerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notification_timeout_secs)
    }

    pub fn reminder_cooldown(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.reminder_cooldown_days.min(MAX_REMINDER_COOLDOWN_DAYS))
            .unwrap_or_else(|| chrono::Duration::days(DEFAULT_REMINDER_COOLDOWN_DAYS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub log_level: String,
    pub scheduler: SchedulerConfig,
    pub contacts: Vec<Contact>,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            scheduler: SchedulerConfig::default(),
            contacts: Vec::new(),
        }
    }
}

impl SettleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!("scheduler.sweep_interval_secs must be greater than 0"));
        }
        if !(1..=MAX_REMINDER_COOLDOWN_DAYS).contains(&self.scheduler.reminder_cooldown_days) {
            return Err(anyhow::anyhow!(
                "scheduler.reminder_cooldown_days must be between 1 and {}",
                MAX_REMINDER_COOLDOWN_DAYS
            ));
        }
        if self.scheduler.notification_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "scheduler.notification_timeout_secs must be greater than 0"
            ));
        }
        if let Some(contact) = self.contacts.iter().find(|c| c.reference.trim().is_empty()) {
            return Err(anyhow::anyhow!("Contact {} has an empty reference", contact.name));
        }
        Ok(())
    }
}

pub fn load_config(config_path: &Path) -> Result<SettleConfig> {
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

    let config: SettleConfig = serde_yaml::from_str(&config_content)
        .with_context(|| format!("Failed to parse config YAML: {:?}", config_path))?;
    config.validate()?;

    info!(
        "Loaded config from {:?} ({} contacts)",
        config_path,
        config.contacts.len()
    );
    Ok(config)
}

pub fn load_config_or_default(config_path: &Path) -> SettleConfig {
    match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config from {:?}: {:#}", config_path, e);
            info!("Using default config (daily sweep, no contacts)");
            SettleConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("settle.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "scheduler:\n  sweep_interval_secs: 60\ncontacts:\n  - reference: bob\n    name: Bob\n    email: bob@example.com\n    user_id: user-bob\n  - reference: dana\n    name: Dana\n    email: dana@example.com\n",
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.scheduler.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.scheduler.reminder_cooldown_days, 3);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.contacts.len(), 2);
        assert_eq!(config.contacts[0].user_id.as_deref(), Some("user-bob"));
        assert!(config.contacts[1].user_id.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scheduler:\n  reminder_cooldown_days: 0\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("reminder_cooldown_days"));

        let path = write(&dir, "scheduler:\n  reminder_cooldown_days: 100000000\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("reminder_cooldown_days"));

        let path = write(&dir, "scheduler:\n  sweep_interval_secs: 0\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_reminder_cooldown_is_clamped() {
        let scheduler = SchedulerConfig {
            reminder_cooldown_days: i64::MAX,
            ..SchedulerConfig::default()
        };
        assert_eq!(
            scheduler.reminder_cooldown(),
            chrono::Duration::days(MAX_REMINDER_COOLDOWN_DAYS)
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = TempDir::new().unwrap();
        let config = load_config_or_default(&dir.path().join("missing.yaml"));
        assert_eq!(config, SettleConfig::default());
    }
}
