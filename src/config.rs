use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::scheduler::conflict::{ConflictPolicy, DEFAULT_SLOT_MINUTES};

/// Application-level constants
pub const APP_NAME: &str = "VetCare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_RATE_PER_MINUTE: u32 = 120;
const DB_FILE_NAME: &str = "vetcare.db";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "vetcare_lib=info,vetcare=info,tower_http=warn"
}

/// Get the application data directory
/// Platform data dir (e.g. ~/.local/share/VetCare), falling back to the
/// working directory when none can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_db_path() -> PathBuf {
    app_data_dir().join(DB_FILE_NAME)
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

fn invalid(var: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Runtime settings for the HTTP service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub conflict_policy: ConflictPolicy,
    pub rate_per_minute: u32,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind = match get("VETCARE_BIND") {
            Some(v) => v
                .parse::<SocketAddr>()
                .map_err(|e| invalid("VETCARE_BIND", &v, e.to_string()))?,
            None => DEFAULT_BIND
                .parse()
                .map_err(|_| invalid("VETCARE_BIND", DEFAULT_BIND, "bad default"))?,
        };

        let db_path = get("VETCARE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let slot_minutes = match get("VETCARE_SLOT_MINUTES") {
            Some(v) => match v.parse::<i64>() {
                Ok(m) if m > 0 && m <= 24 * 60 => m,
                _ => return Err(invalid("VETCARE_SLOT_MINUTES", &v, "expected 1..=1440")),
            },
            None => DEFAULT_SLOT_MINUTES,
        };

        let conflict_policy = match get("VETCARE_CONFLICT_POLICY") {
            Some(v) => match v
                .parse::<ConflictPolicy>()
                .map_err(|e| invalid("VETCARE_CONFLICT_POLICY", &v, e))?
            {
                ConflictPolicy::Overlap { .. } => ConflictPolicy::overlap_minutes(slot_minutes),
                ConflictPolicy::ExactMatch => ConflictPolicy::ExactMatch,
            },
            None => ConflictPolicy::overlap_minutes(slot_minutes),
        };

        let rate_per_minute = match get("VETCARE_RATE_PER_MINUTE") {
            Some(v) => match v.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid("VETCARE_RATE_PER_MINUTE", &v, "expected a positive integer")),
            },
            None => DEFAULT_RATE_PER_MINUTE,
        };

        Ok(Self {
            bind,
            db_path,
            conflict_policy,
            rate_per_minute,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.bind.to_string(), DEFAULT_BIND);
        assert_eq!(cfg.conflict_policy, ConflictPolicy::default());
        assert_eq!(cfg.rate_per_minute, DEFAULT_RATE_PER_MINUTE);
        assert!(cfg.db_path.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn slot_length_feeds_overlap_policy() {
        let cfg = from_pairs(&[("VETCARE_SLOT_MINUTES", "45")]).unwrap();
        assert_eq!(cfg.conflict_policy, ConflictPolicy::overlap_minutes(45));
    }

    #[test]
    fn exact_policy_selectable() {
        let cfg = from_pairs(&[
            ("VETCARE_CONFLICT_POLICY", "exact"),
            ("VETCARE_DB_PATH", "/tmp/x.db"),
            ("VETCARE_BIND", "0.0.0.0:9000"),
        ])
        .unwrap();
        assert_eq!(cfg.conflict_policy, ConflictPolicy::ExactMatch);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.bind.port(), 9000);
    }

    #[test]
    fn bad_values_are_rejected() {
        for pairs in [
            [("VETCARE_SLOT_MINUTES", "0")],
            [("VETCARE_SLOT_MINUTES", "abc")],
            [("VETCARE_CONFLICT_POLICY", "fuzzy")],
            [("VETCARE_BIND", "localhost")],
            [("VETCARE_RATE_PER_MINUTE", "-1")],
        ] {
            assert!(from_pairs(&pairs).is_err(), "{pairs:?}");
        }
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = from_pairs(&[("VETCARE_SLOT_MINUTES", "  ")]).unwrap();
        assert_eq!(cfg.conflict_policy, ConflictPolicy::default());
    }

    #[test]
    fn app_data_dir_is_named_after_app() {
        assert!(app_data_dir().ends_with(APP_NAME) || app_data_dir() == PathBuf::from("."));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
