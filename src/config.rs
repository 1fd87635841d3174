//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Heartbeat interval default: 30 minutes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Scheduler poll-loop configuration.
///
/// The defaults encode the production cadence: a 60-second poll, a due
/// window equal to the poll cadence, and a 30-second dedup guard. The window
/// heuristic and the dedup guard are independent knobs whose interaction can
/// skip or double-fire a task under timing drift; keep them at the defaults
/// unless a redesign of the dedup policy is intended.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Cadence of the poll loop.
    pub poll_interval: Duration,
    /// A task is due when its next tick falls within this window of now.
    pub due_window: Duration,
    /// Suppress a firing when the task last ran less than this long ago.
    pub dedup_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            due_window: Duration::from_secs(60),
            dedup_window: Duration::from_secs(30),
        }
    }
}

impl SchedulerConfig {
    /// Read overrides from `AGENT_PULSE_POLL_SECS`, `AGENT_PULSE_DUE_WINDOW_SECS`,
    /// and `AGENT_PULSE_DEDUP_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            // A zero poll cadence would make the ticker spin; fall back.
            poll_interval: env_secs("AGENT_PULSE_POLL_SECS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.poll_interval),
            due_window: env_secs("AGENT_PULSE_DUE_WINDOW_SECS").unwrap_or(defaults.due_window),
            dedup_window: env_secs("AGENT_PULSE_DEDUP_SECS").unwrap_or(defaults.dedup_window),
        }
    }
}

/// Heartbeat service configuration. Hot-reloadable via
/// `HeartbeatService::set_config` / `set_interval`.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    /// Beat period. Zero is coerced to the 30-minute default.
    pub interval: Duration,
    /// Directory searched first for the checklist file.
    pub workspace: PathBuf,
    /// Publish a task-start event when checklist items are found.
    pub notify_on_wake: bool,
    /// Scan the checklist file on each beat.
    pub check_checklist: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
            workspace: PathBuf::from("."),
            notify_on_wake: true,
            check_checklist: true,
        }
    }
}

impl HeartbeatConfig {
    /// The configured interval with non-positive values coerced to the default.
    pub fn effective_interval(&self) -> Duration {
        if self.interval.is_zero() {
            DEFAULT_HEARTBEAT_INTERVAL
        } else {
            self.interval
        }
    }

    /// Read overrides from `AGENT_PULSE_HEARTBEAT`, `AGENT_PULSE_HEARTBEAT_SECS`,
    /// `AGENT_PULSE_WORKSPACE`, `AGENT_PULSE_NOTIFY_ON_WAKE`, and
    /// `AGENT_PULSE_CHECK_CHECKLIST`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_bool("AGENT_PULSE_HEARTBEAT").unwrap_or(defaults.enabled),
            interval: env_secs("AGENT_PULSE_HEARTBEAT_SECS").unwrap_or(defaults.interval),
            workspace: std::env::var("AGENT_PULSE_WORKSPACE")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace),
            notify_on_wake: env_bool("AGENT_PULSE_NOTIFY_ON_WAKE")
                .unwrap_or(defaults.notify_on_wake),
            check_checklist: env_bool("AGENT_PULSE_CHECK_CHECKLIST")
                .unwrap_or(defaults.check_checklist),
        }
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    let secs: i64 = std::env::var(key).ok()?.trim().parse().ok()?;
    // Negative values fall through to the caller's default path by coercing
    // to zero, the same way a zero interval does.
    Some(Duration::from_secs(secs.max(0) as u64))
}

fn env_bool(key: &str) -> Option<bool> {
    match std::env::var(key).ok()?.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_defaults_match_production_cadence() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.due_window, Duration::from_secs(60));
        assert_eq!(cfg.dedup_window, Duration::from_secs(30));
    }

    #[test]
    fn zero_heartbeat_interval_coerces_to_default() {
        let cfg = HeartbeatConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(cfg.effective_interval(), DEFAULT_HEARTBEAT_INTERVAL);
    }

    #[test]
    fn positive_heartbeat_interval_kept() {
        let cfg = HeartbeatConfig {
            interval: Duration::from_secs(90),
            ..Default::default()
        };
        assert_eq!(cfg.effective_interval(), Duration::from_secs(90));
    }
}
