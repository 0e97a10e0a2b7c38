use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::refresh::RefreshPolicy;

/// Hub configuration derived from environment variables.
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub bind: String,
    pub port: u16,
    /// Bearer token for API auth.  Empty ⇒ auth disabled.
    pub token: String,

    // ── Trade store ────────────────────────────────────────────────
    pub db_path: PathBuf,
    pub db_pool_size: u32,

    // ── Kline recomputation policy ─────────────────────────────────
    pub refresh_mode: String,
    pub refresh_delay_ms: u64,
    pub refresh_interval_ms: u64,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: &str) -> PathBuf {
    PathBuf::from(env_str(name, default))
}

impl HubConfig {
    pub fn from_env() -> Self {
        Self {
            bind: env_str("CRICBET_BIND", "127.0.0.1"),
            port: env_u16("CRICBET_PORT", 61021),
            token: env_str("CRICBET_TOKEN", ""),
            db_path: env_path("CRICBET_DB", "cricbet.db"),
            db_pool_size: env_u32("CRICBET_DB_POOL_SIZE", 4),
            refresh_mode: env_str("CRICBET_REFRESH_MODE", "immediate"),
            refresh_delay_ms: env_u64("CRICBET_REFRESH_DELAY_MS", 500),
            refresh_interval_ms: env_u64("CRICBET_REFRESH_INTERVAL_MS", 5000),
        }
    }

    /// Resolve the configured recomputation policy.
    ///
    /// Unknown modes fall back to `Immediate`.
    pub fn refresh_policy(&self) -> RefreshPolicy {
        match self.refresh_mode.trim().to_lowercase().as_str() {
            "debounced" => RefreshPolicy::Debounced {
                delay: Duration::from_millis(self.refresh_delay_ms),
            },
            "scheduled" => RefreshPolicy::Scheduled {
                interval: Duration::from_millis(self.refresh_interval_ms),
            },
            _ => RefreshPolicy::Immediate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_mode(mode: &str) -> HubConfig {
        HubConfig {
            bind: "127.0.0.1".to_string(),
            port: 0,
            token: String::new(),
            db_path: PathBuf::from("test.db"),
            db_pool_size: 2,
            refresh_mode: mode.to_string(),
            refresh_delay_ms: 250,
            refresh_interval_ms: 9000,
        }
    }

    #[test]
    fn refresh_policy_resolution() {
        assert_eq!(
            config_with_mode("immediate").refresh_policy(),
            RefreshPolicy::Immediate
        );
        assert_eq!(
            config_with_mode("Debounced").refresh_policy(),
            RefreshPolicy::Debounced {
                delay: Duration::from_millis(250)
            }
        );
        assert_eq!(
            config_with_mode("scheduled").refresh_policy(),
            RefreshPolicy::Scheduled {
                interval: Duration::from_millis(9000)
            }
        );
        // Unknown modes degrade to synchronous recompute.
        assert_eq!(
            config_with_mode("eventually").refresh_policy(),
            RefreshPolicy::Immediate
        );
    }
}
