//! Service configuration, read from the environment.

use std::str::FromStr;

/// Tunables of the supply service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyConfig {
    /// Reorder level given to new items that do not specify one.
    pub default_reorder_level: i64,
    /// Lead time given to new items that do not specify one.
    pub default_lead_time_days: u32,
    /// Publish committed events on the bus.
    pub publish_events: bool,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            default_reorder_level: 10,
            default_lead_time_days: 7,
            publish_events: true,
        }
    }
}

impl SupplyConfig {
    /// Read `SUPPLY_DEFAULT_REORDER_LEVEL`, `SUPPLY_DEFAULT_LEAD_TIME_DAYS` and
    /// `SUPPLY_PUBLISH_EVENTS`, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (env, file, test map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let default_reorder_level = parse_or(
            &lookup,
            "SUPPLY_DEFAULT_REORDER_LEVEL",
            defaults.default_reorder_level,
        );
        let default_reorder_level = if default_reorder_level < 0 {
            tracing::warn!(
                value = default_reorder_level,
                "SUPPLY_DEFAULT_REORDER_LEVEL is negative; using default"
            );
            defaults.default_reorder_level
        } else {
            default_reorder_level
        };

        Self {
            default_reorder_level,
            default_lead_time_days: parse_or(
                &lookup,
                "SUPPLY_DEFAULT_LEAD_TIME_DAYS",
                defaults.default_lead_time_days,
            ),
            publish_events: parse_or(&lookup, "SUPPLY_PUBLISH_EVENTS", defaults.publish_events),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + core::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, raw = %raw, default = ?default, "invalid config value; using default");
            default
        }),
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
    fn missing_values_use_defaults() {
        let config = SupplyConfig::from_lookup(lookup(&[]));
        assert_eq!(config, SupplyConfig::default());
        assert_eq!(config.default_reorder_level, 10);
        assert_eq!(config.default_lead_time_days, 7);
    }

    #[test]
    fn values_are_parsed() {
        let config = SupplyConfig::from_lookup(lookup(&[
            ("SUPPLY_DEFAULT_REORDER_LEVEL", "25"),
            ("SUPPLY_DEFAULT_LEAD_TIME_DAYS", " 3 "),
            ("SUPPLY_PUBLISH_EVENTS", "false"),
        ]));
        assert_eq!(config.default_reorder_level, 25);
        assert_eq!(config.default_lead_time_days, 3);
        assert!(!config.publish_events);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = SupplyConfig::from_lookup(lookup(&[
            ("SUPPLY_DEFAULT_REORDER_LEVEL", "-4"),
            ("SUPPLY_DEFAULT_LEAD_TIME_DAYS", "soon"),
            ("SUPPLY_PUBLISH_EVENTS", "yes please"),
        ]));
        assert_eq!(config, SupplyConfig::default());
    }
}
