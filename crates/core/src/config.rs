use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    match profiled_env_opt(profile, key) {
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key = %key, value = %v, default, "ignoring non-numeric config value");
            default
        }),
        None => default,
    }
}

/// Split a comma separated list, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    /// JSON file holding the document list and saved schedule.
    pub documents_file: PathBuf,
    pub refresh: RefreshConfig,
    pub scheduler: SchedulerSettings,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `REFRESHER_PROFILE`. When set (e.g. `NIGHTLY`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("REFRESHER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            documents_file: PathBuf::from(profiled_env_or(p, "DOCUMENTS_FILE", "config.json")),
            refresh: RefreshConfig::from_env_profiled(p),
            scheduler: SchedulerSettings::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  documents:   file={}", self.documents_file.display());
        tracing::info!(
            "  refresh:     wait={}s, timeout={}s",
            self.refresh.wait_secs,
            self.refresh.timeout_secs
        );
        tracing::info!(
            "  scheduler:   times=[{}], poll={}s, grace={}m",
            self.scheduler.times.join(", "),
            self.scheduler.poll_secs,
            self.scheduler.grace_minutes
        );
    }
}

// ── Refresh engine ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Fixed wait after triggering a refresh, in seconds.
    pub wait_secs: u64,
    /// Hard ceiling for a single document, in seconds.
    pub timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            wait_secs: 120,
            timeout_secs: 600,
        }
    }
}

impl RefreshConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        Self {
            wait_secs: profiled_env_u64(p, "REFRESH_WAIT_SECS", defaults.wait_secs),
            timeout_secs: profiled_env_u64(p, "REFRESH_TIMEOUT_SECS", defaults.timeout_secs),
        }
    }

    pub fn wait_duration(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Raw `HH:MM` candidates; validated by the scheduler itself.
    pub times: Vec<String>,
    pub poll_secs: u64,
    pub grace_minutes: u64,
    pub error_backoff_secs: u64,
    pub stop_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            times: vec!["06:00".to_string()],
            poll_secs: 30,
            grace_minutes: 10,
            error_backoff_secs: 60,
            stop_timeout_secs: 5,
        }
    }
}

impl SchedulerSettings {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        let times = profiled_env_opt(p, "SCHEDULE_TIMES")
            .map(|raw| split_list(&raw))
            .filter(|t| !t.is_empty())
            .unwrap_or(defaults.times);
        Self {
            times,
            poll_secs: profiled_env_u64(p, "SCHEDULER_POLL_SECS", defaults.poll_secs),
            grace_minutes: profiled_env_u64(p, "SCHEDULER_GRACE_MINUTES", defaults.grace_minutes),
            error_backoff_secs: profiled_env_u64(
                p,
                "SCHEDULER_ERROR_BACKOFF_SECS",
                defaults.error_backoff_secs,
            ),
            stop_timeout_secs: profiled_env_u64(
                p,
                "SCHEDULER_STOP_TIMEOUT_SECS",
                defaults.stop_timeout_secs,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own profile prefix so parallel tests never share keys.

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(split_list("09:00, ,14:30,"), vec!["09:00", "14:30"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn profile_keys_override_plain_keys() {
        env::set_var("CFGTESTA_REFRESH_WAIT_SECS", "45");
        env::set_var("CFGTESTA_SCHEDULE_TIMES", "07:15,18:00");

        let config = Config::for_profile("cfgtesta");
        assert_eq!(config.profile, "CFGTESTA");
        assert_eq!(config.refresh.wait_secs, 45);
        assert_eq!(config.scheduler.times, vec!["07:15", "18:00"]);

        env::remove_var("CFGTESTA_REFRESH_WAIT_SECS");
        env::remove_var("CFGTESTA_SCHEDULE_TIMES");
    }

    #[test]
    fn non_numeric_values_fall_back_to_defaults() {
        env::set_var("CFGTESTB_REFRESH_TIMEOUT_SECS", "ten minutes");

        let config = Config::for_profile("CFGTESTB");
        assert_eq!(config.refresh.timeout_secs, 600);

        env::remove_var("CFGTESTB_REFRESH_TIMEOUT_SECS");
    }

    #[test]
    fn default_durations() {
        let refresh = RefreshConfig::default();
        assert_eq!(refresh.wait_duration(), Duration::from_secs(120));
        assert_eq!(refresh.timeout(), Duration::from_secs(600));

        let sched = SchedulerSettings::default();
        assert_eq!(sched.times, vec!["06:00"]);
        assert_eq!(sched.poll_secs, 30);
    }

    #[test]
    fn profile_label_defaults() {
        let mut config = Config::for_profile("CFGTESTC");
        assert_eq!(config.profile_label(), "CFGTESTC");
        config.profile.clear();
        assert_eq!(config.profile_label(), "default");
    }
}
