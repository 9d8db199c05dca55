//! Versioned plugin configuration.
//!
//! The config is a single JSON object stored through the host's
//! [`ConfigStore`]. It is loaded once during `on_init`, migrated if it was
//! written by an older plugin version, validated, and written back so new
//! keys show up in the file.

use crate::error::{ConfigError, ConfigResult};
use crate::policy::{DrowningPolicy, DrowningSchedule};
use game_host::ConfigStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Version of this plugin, stamped into every saved config.
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configs written before this version are discarded in favour of defaults.
pub const RESET_BELOW: PluginVersion = PluginVersion::new(1, 0, 0);

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn current() -> Self {
        PLUGIN_VERSION.parse().unwrap_or(RESET_BELOW)
    }

    /// Orders a stored version string against `self`. Strings that don't
    /// parse sort before every real version.
    pub fn compare_stored(&self, stored: &str) -> Ordering {
        match stored.parse::<PluginVersion>() {
            Ok(version) => version.cmp(self),
            Err(_) => Ordering::Less,
        }
    }
}

impl FromStr for PluginVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = |label: &str| -> Result<u32, String> {
            parts
                .next()
                .ok_or_else(|| format!("missing {} in {:?}", label, s))?
                .parse::<u32>()
                .map_err(|e| format!("bad {} in {:?}: {}", label, s, e))
        };

        let version = PluginVersion::new(next("major")?, next("minor")?, next("patch")?);
        if parts.next().is_some() {
            return Err(format!("too many components in {:?}", s));
        }
        Ok(version)
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Config-file spelling of [`DrowningPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyMode {
    #[default]
    #[serde(rename = "Delay Then Damage")]
    DelayThenDamage,
    #[serde(rename = "Kill Immediately")]
    KillImmediately,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Missing versions deserialize as empty and count as outdated
    #[serde(rename = "Version", default)]
    pub version: String,

    #[serde(rename = "Drowning Policy", default)]
    pub policy: PolicyMode,

    #[serde(rename = "Delay Before Damage Seconds", default = "default_delay")]
    pub delay_before_damage: f32,

    #[serde(rename = "Damage Amount Per Tick", default = "default_damage")]
    pub damage_amount_per_tick: f32,

    #[serde(rename = "Damage Interval Seconds", default = "default_interval")]
    pub damage_interval_seconds: f32,
}

fn default_delay() -> f32 {
    30.0
}

fn default_damage() -> f32 {
    1.0
}

fn default_interval() -> f32 {
    1.0
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            version: PLUGIN_VERSION.to_string(),
            policy: PolicyMode::default(),
            delay_before_damage: default_delay(),
            damage_amount_per_tick: default_damage(),
            damage_interval_seconds: default_interval(),
        }
    }
}

/// What [`Configuration::migrate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// Already at (or ahead of) the running version
    UpToDate,
    /// Values kept, version stamp updated
    Restamped,
    /// Too old to trust: replaced by defaults
    ResetToDefaults,
}

impl Configuration {
    /// Brings a config written by an older plugin version up to date.
    pub fn migrate(self) -> (Self, Migration) {
        let current = PluginVersion::current();
        if current.compare_stored(&self.version) != Ordering::Less {
            return (self, Migration::UpToDate);
        }

        warn!("Config changes detected! Updating...");
        let previous = self.version.clone();

        let (mut migrated, outcome) = if RESET_BELOW.compare_stored(&self.version) == Ordering::Less {
            (Configuration::default(), Migration::ResetToDefaults)
        } else {
            (self, Migration::Restamped)
        };

        migrated.version = current.to_string();
        warn!(
            "Config update complete! Updated from version {:?} to {}",
            previous, migrated.version
        );
        (migrated, outcome)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.delay_before_damage < 0.0 {
            return Err(ConfigError::Invalid {
                field: "Delay Before Damage Seconds",
                reason: format!("must be a non-negative number, got {}", self.delay_before_damage),
            });
        }
        if !self.damage_amount_per_tick.is_finite() || self.damage_amount_per_tick <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "Damage Amount Per Tick",
                reason: format!("must be positive, got {}", self.damage_amount_per_tick),
            });
        }
        if self.damage_interval_seconds <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "Damage Interval Seconds",
                reason: format!("must be positive, got {}", self.damage_interval_seconds),
            });
        }
        seconds("Delay Before Damage Seconds", self.delay_before_damage)?;
        seconds("Damage Interval Seconds", self.damage_interval_seconds)?;
        Ok(())
    }

    pub fn policy(&self) -> ConfigResult<DrowningPolicy> {
        Ok(match self.policy {
            PolicyMode::KillImmediately => DrowningPolicy::KillImmediately,
            PolicyMode::DelayThenDamage => DrowningPolicy::DelayThenDamage(DrowningSchedule {
                delay: seconds("Delay Before Damage Seconds", self.delay_before_damage)?,
                damage_per_tick: self.damage_amount_per_tick,
                interval: seconds("Damage Interval Seconds", self.damage_interval_seconds)?,
            }),
        })
    }
}

/// Converts a config value in seconds, rejecting NaN, infinities and values
/// too large for a [`Duration`].
fn seconds(field: &'static str, value: f32) -> ConfigResult<Duration> {
    Duration::try_from_secs_f32(value).map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("{} is not a usable number of seconds: {}", value, e),
    })
}

/// Reads, migrates, validates and re-saves the config stored under `name`.
pub async fn load_configuration(store: &dyn ConfigStore, name: &str) -> ConfigResult<Configuration> {
    let config = match store.read_object(name).await? {
        Some(value) => {
            let stored: Configuration =
                serde_json::from_value(value).map_err(ConfigError::Malformed)?;
            stored.migrate().0
        }
        None => {
            info!("No config found for {}, creating defaults", name);
            Configuration::default()
        }
    };

    config.validate()?;
    save_configuration(store, name, &config).await?;
    Ok(config)
}

pub async fn save_configuration(
    store: &dyn ConfigStore,
    name: &str,
    config: &Configuration,
) -> ConfigResult<()> {
    let value = serde_json::to_value(config).map_err(ConfigError::Serialization)?;
    store.write_object(name, &value).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use game_host::JsonConfigStore;
    use serde_json::json;

    #[test]
    fn defaults_match_shipped_values() {
        let config = Configuration::default();
        assert_eq!(config.version, "1.1.0");
        assert_eq!(config.delay_before_damage, 30.0);
        assert_eq!(config.damage_amount_per_tick, 1.0);
        assert_eq!(config.damage_interval_seconds, 1.0);
        assert_eq!(config.policy, PolicyMode::DelayThenDamage);
    }

    #[test]
    fn versions_compare_numerically() {
        let current = PluginVersion::new(1, 10, 0);
        assert_eq!(current.compare_stored("1.9.0"), Ordering::Less);
        assert_eq!(current.compare_stored("1.10.0"), Ordering::Equal);
        assert_eq!(current.compare_stored("2.0.0"), Ordering::Greater);
        assert_eq!(current.compare_stored(""), Ordering::Less);
        assert_eq!(current.compare_stored("banana"), Ordering::Less);
        assert!("1.2".parse::<PluginVersion>().is_err());
        assert!("1.2.3.4".parse::<PluginVersion>().is_err());
    }

    #[test]
    fn pre_release_config_is_reset_to_defaults() {
        let old = Configuration {
            version: "0.9.0".to_string(),
            policy: PolicyMode::KillImmediately,
            delay_before_damage: 5.0,
            damage_amount_per_tick: 50.0,
            damage_interval_seconds: 3.0,
        };

        let (migrated, outcome) = old.migrate();
        assert_eq!(outcome, Migration::ResetToDefaults);
        assert_eq!(migrated, Configuration::default());
        assert_eq!(migrated.version, PLUGIN_VERSION);
    }

    #[test]
    fn older_release_keeps_values_and_is_restamped() {
        let old = Configuration {
            version: "1.0.0".to_string(),
            delay_before_damage: 10.0,
            ..Configuration::default()
        };

        let (migrated, outcome) = old.migrate();
        assert_eq!(outcome, Migration::Restamped);
        assert_eq!(migrated.delay_before_damage, 10.0);
        assert_eq!(migrated.version, PLUGIN_VERSION);
    }

    #[test]
    fn newer_config_is_left_alone() {
        let newer = Configuration {
            version: "9.0.0".to_string(),
            ..Configuration::default()
        };
        let (migrated, outcome) = newer.clone().migrate();
        assert_eq!(outcome, Migration::UpToDate);
        assert_eq!(migrated, newer);
    }

    #[test]
    fn validation_rejects_nonsense() {
        let mut config = Configuration::default();
        config.damage_interval_seconds = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "Damage Interval Seconds", .. })
        ));

        let mut config = Configuration::default();
        config.delay_before_damage = -1.0;
        assert!(config.validate().is_err());

        let mut config = Configuration::default();
        config.damage_amount_per_tick = f32::NAN;
        assert!(config.validate().is_err());

        let mut config = Configuration::default();
        config.delay_before_damage = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn durations_too_large_for_a_timer_are_rejected() {
        let config = Configuration {
            delay_before_damage: 1.0e30,
            ..Configuration::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "Delay Before Damage Seconds", .. })
        ));
        assert!(config.policy().is_err());

        let config = Configuration {
            damage_interval_seconds: f32::INFINITY,
            ..Configuration::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "Damage Interval Seconds", .. })
        ));
    }

    #[test]
    fn policy_reflects_mode() {
        let config = Configuration::default();
        match config.policy().unwrap() {
            DrowningPolicy::DelayThenDamage(schedule) => {
                assert_eq!(schedule.delay, Duration::from_secs(30));
                assert_eq!(schedule.interval, Duration::from_secs(1));
                assert_eq!(schedule.damage_per_tick, 1.0);
            }
            other => panic!("unexpected policy {:?}", other),
        }

        let config = Configuration {
            policy: PolicyMode::KillImmediately,
            ..Configuration::default()
        };
        assert_eq!(config.policy().unwrap(), DrowningPolicy::KillImmediately);
    }

    #[test]
    fn json_keys_use_display_names() {
        let value = serde_json::to_value(Configuration::default()).unwrap();
        assert_eq!(value["Version"], "1.1.0");
        assert_eq!(value["Drowning Policy"], "Delay Then Damage");
        assert_eq!(value["Delay Before Damage Seconds"], 30.0);
        assert_eq!(value["Damage Amount Per Tick"], 1.0);
        assert_eq!(value["Damage Interval Seconds"], 1.0);
    }

    #[tokio::test]
    async fn missing_config_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path());

        let config = load_configuration(&store, "no_water_sleep").await.unwrap();
        assert_eq!(config, Configuration::default());

        let saved = store.read_object("no_water_sleep").await.unwrap().unwrap();
        assert_eq!(saved["Version"], PLUGIN_VERSION);
    }

    #[tokio::test]
    async fn old_config_on_disk_is_reset_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path());
        store
            .write_object(
                "no_water_sleep",
                &json!({
                    "Version": "0.9.0",
                    "Delay Before Damage Seconds": 2.0,
                    "Damage Amount Per Tick": 99.0,
                    "Damage Interval Seconds": 0.5
                }),
            )
            .await
            .unwrap();

        let config = load_configuration(&store, "no_water_sleep").await.unwrap();
        assert_eq!(config, Configuration::default());

        let saved = store.read_object("no_water_sleep").await.unwrap().unwrap();
        assert_eq!(saved["Version"], PLUGIN_VERSION);
        assert_eq!(saved["Damage Amount Per Tick"], 1.0);
    }

    #[tokio::test]
    async fn current_config_keeps_custom_values_and_fills_new_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path());
        store
            .write_object(
                "no_water_sleep",
                &json!({
                    "Version": PLUGIN_VERSION,
                    "Delay Before Damage Seconds": 12.0,
                    "Damage Amount Per Tick": 4.0,
                    "Damage Interval Seconds": 2.0
                }),
            )
            .await
            .unwrap();

        let config = load_configuration(&store, "no_water_sleep").await.unwrap();
        assert_eq!(config.delay_before_damage, 12.0);
        assert_eq!(config.policy, PolicyMode::DelayThenDamage);

        let saved = store.read_object("no_water_sleep").await.unwrap().unwrap();
        assert_eq!(saved["Drowning Policy"], "Delay Then Damage");
    }

    #[tokio::test]
    async fn invalid_values_fail_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonConfigStore::new(dir.path());
        store
            .write_object(
                "no_water_sleep",
                &json!({
                    "Version": PLUGIN_VERSION,
                    "Damage Interval Seconds": -3.0
                }),
            )
            .await
            .unwrap();

        let result = load_configuration(&store, "no_water_sleep").await;
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }
}
