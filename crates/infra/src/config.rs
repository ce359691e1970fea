//! Configuration loading and representation.
//!
//! Defaults describe a single-process clinic on the in-memory store. Every
//! value can be overridden from the environment; malformed values are errors
//! rather than silently ignored.

use std::time::Duration;

use anyhow::{Context, bail};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use clinic_core::time::BusinessHours;
use clinic_inventory::EXPIRING_SOON_DAYS;
use clinic_observability::{LogFormat, ObservabilityConfig};
use clinic_scheduling::SchedulingPolicy;

use crate::store::PostgresSettings;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicConfig {
    pub store: StoreConfig,
    pub scheduling: SchedulingConfig,
    pub inventory: InventoryConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    Postgres {
        url: String,
        max_connections: u32,
        acquire_timeout_secs: u64,
    },
}

impl StoreConfig {
    pub fn postgres_settings(&self) -> Option<PostgresSettings> {
        match self {
            StoreConfig::Memory => None,
            StoreConfig::Postgres {
                url,
                max_connections,
                acquire_timeout_secs,
            } => Some(PostgresSettings {
                url: url.clone(),
                max_connections: *max_connections,
                acquire_timeout: Duration::from_secs(*acquire_timeout_secs),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub default_duration_minutes: u32,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub opening_time: NaiveTime,
    pub closing_time: NaiveTime,
    /// Reject weekend dates and start times outside opening hours.
    pub enforce_business_hours: bool,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        let policy = SchedulingPolicy::default();
        let hours = BusinessHours::default();
        Self {
            default_duration_minutes: policy.default_duration_minutes,
            min_duration_minutes: policy.min_duration_minutes,
            max_duration_minutes: policy.max_duration_minutes,
            opening_time: hours.open,
            closing_time: hours.close,
            enforce_business_hours: false,
        }
    }
}

impl SchedulingConfig {
    pub fn policy(&self) -> SchedulingPolicy {
        SchedulingPolicy {
            default_duration_minutes: self.default_duration_minutes,
            min_duration_minutes: self.min_duration_minutes,
            max_duration_minutes: self.max_duration_minutes,
            business_hours: self.enforce_business_hours.then_some(BusinessHours {
                open: self.opening_time,
                close: self.closing_time,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Items expiring within this many days report "Expiring Soon".
    pub expiring_soon_days: i64,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            expiring_soon_days: EXPIRING_SOON_DAYS,
        }
    }
}

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

impl ClinicConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment, test map).
    ///
    /// Recognized keys: `CLINIC_STORE` (`memory`|`postgres`), `DATABASE_URL`,
    /// `CLINIC_DB_MAX_CONNECTIONS`, `CLINIC_DB_ACQUIRE_TIMEOUT_SECS`,
    /// `CLINIC_DEFAULT_DURATION`, `CLINIC_ENFORCE_BUSINESS_HOURS`,
    /// `CLINIC_EXPIRY_WINDOW_DAYS`, `CLINIC_LOG_FORMAT`, `CLINIC_LOG_LEVEL`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = ClinicConfig::default();

        let store_kind = get("CLINIC_STORE").unwrap_or_else(|| "memory".to_string());
        config.store = match store_kind.to_ascii_lowercase().as_str() {
            "memory" => StoreConfig::Memory,
            "postgres" => StoreConfig::Postgres {
                url: get("DATABASE_URL")
                    .context("DATABASE_URL must be set when CLINIC_STORE=postgres")?,
                max_connections: parse_or(&get, "CLINIC_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
                acquire_timeout_secs: parse_or(
                    &get,
                    "CLINIC_DB_ACQUIRE_TIMEOUT_SECS",
                    DEFAULT_ACQUIRE_TIMEOUT_SECS,
                )?,
            },
            other => bail!("CLINIC_STORE must be 'memory' or 'postgres', got '{other}'"),
        };

        config.scheduling.default_duration_minutes = parse_or(
            &get,
            "CLINIC_DEFAULT_DURATION",
            config.scheduling.default_duration_minutes,
        )?;
        config.scheduling.enforce_business_hours = parse_or(
            &get,
            "CLINIC_ENFORCE_BUSINESS_HOURS",
            config.scheduling.enforce_business_hours,
        )?;
        config.inventory.expiring_soon_days = parse_or(
            &get,
            "CLINIC_EXPIRY_WINDOW_DAYS",
            config.inventory.expiring_soon_days,
        )?;

        if let Some(format) = get("CLINIC_LOG_FORMAT") {
            config.observability.format = format
                .parse::<LogFormat>()
                .context("invalid CLINIC_LOG_FORMAT")?;
        }
        if let Some(level) = get("CLINIC_LOG_LEVEL") {
            config.observability.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.scheduling;
        if s.min_duration_minutes == 0 || s.min_duration_minutes > s.max_duration_minutes {
            bail!(
                "invalid duration bounds: min {} max {}",
                s.min_duration_minutes,
                s.max_duration_minutes
            );
        }
        if s.default_duration_minutes < s.min_duration_minutes
            || s.default_duration_minutes > s.max_duration_minutes
        {
            bail!(
                "default duration {} is outside [{}, {}]",
                s.default_duration_minutes,
                s.min_duration_minutes,
                s.max_duration_minutes
            );
        }
        if s.opening_time >= s.closing_time {
            bail!("opening time must be before closing time");
        }
        if self.inventory.expiring_soon_days < 0 {
            bail!("expiring-soon window cannot be negative");
        }
        if let StoreConfig::Postgres { max_connections, .. } = &self.store {
            if *max_connections == 0 {
                bail!("CLINIC_DB_MAX_CONNECTIONS must be at least 1");
            }
        }
        Ok(())
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = ClinicConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClinicConfig::default());
        assert_eq!(config.scheduling.policy(), SchedulingPolicy::default());
        assert_eq!(config.inventory.expiring_soon_days, 30);
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = ClinicConfig::from_lookup(lookup(&[("CLINIC_STORE", "postgres")])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let config = ClinicConfig::from_lookup(lookup(&[
            ("CLINIC_STORE", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("CLINIC_DB_MAX_CONNECTIONS", "4"),
        ]))
        .unwrap();
        let settings = config.store.postgres_settings().unwrap();
        assert_eq!(settings.max_connections, 4);
        assert_eq!(settings.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ClinicConfig::from_lookup(lookup(&[
            ("CLINIC_DEFAULT_DURATION", "45"),
            ("CLINIC_ENFORCE_BUSINESS_HOURS", "true"),
            ("CLINIC_EXPIRY_WINDOW_DAYS", "14"),
            ("CLINIC_LOG_FORMAT", "pretty"),
            ("CLINIC_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        let policy = config.scheduling.policy();
        assert_eq!(policy.default_duration_minutes, 45);
        assert_eq!(policy.business_hours, Some(BusinessHours::default()));
        assert_eq!(config.inventory.expiring_soon_days, 14);
        assert_eq!(config.observability.format, LogFormat::Pretty);
        assert_eq!(config.observability.level, "debug");
    }

    #[test]
    fn malformed_values_are_errors() {
        for (key, value) in [
            ("CLINIC_STORE", "sqlite"),
            ("CLINIC_DEFAULT_DURATION", "half an hour"),
            ("CLINIC_DEFAULT_DURATION", "600"),
            ("CLINIC_ENFORCE_BUSINESS_HOURS", "yes"),
            ("CLINIC_EXPIRY_WINDOW_DAYS", "-1"),
            ("CLINIC_LOG_FORMAT", "xml"),
        ] {
            assert!(
                ClinicConfig::from_lookup(lookup(&[(key, value)])).is_err(),
                "{key}={value} should be rejected"
            );
        }
    }
}
