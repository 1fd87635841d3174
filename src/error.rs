//! Error types for Agent Pulse.

/// Top-level error type for the scheduling subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Heartbeat error: {0}")]
    Heartbeat(#[from] HeartbeatError),
}

/// Schedule validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression: {expr}")]
    InvalidCronExpression { expr: String },
}

/// Task-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task not found: {name}")]
    NotFound { name: String },

    #[error("Task already exists: {name}")]
    AlreadyExists { name: String },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Message-bus errors.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Publish failed: {reason}")]
    PublishFailed { reason: String },

    #[error("Bus closed")]
    Closed,
}

/// Heartbeat lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum HeartbeatError {
    #[error("Beat loop join failed: {reason}")]
    JoinFailed { reason: String },
}

/// Result type alias for the subsystem.
pub type Result<T> = std::result::Result<T, Error>;
