//! The persisted task record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-defined scheduled task.
///
/// `name` is globally unique and is the store key. A disabled task keeps its
/// record and runner but is never evaluated as due.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub description: String,
    /// 5- or 6-field cron schedule.
    pub cron_expr: String,
    /// Fixed-interval seconds — reserved alternate trigger mode, not
    /// consulted by the poll loop.
    #[serde(default)]
    pub interval: u64,
    /// Payload delivered on each firing.
    pub message: String,
    /// Delivery target.
    pub channel: String,
    pub chat_id: String,
    pub enabled: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create an enabled task with the given schedule and delivery target.
    pub fn new(name: &str, cron_expr: &str, message: &str, channel: &str, chat_id: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            description: String::new(),
            cron_expr: cron_expr.to_string(),
            interval: 0,
            message: message.to_string(),
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
            enabled: true,
            next_run_at: None,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Bump the update timestamp after a mutation.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
