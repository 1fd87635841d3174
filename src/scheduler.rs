//! Cron task scheduler.
//!
//! Owns the in-memory runner map and a single background poll loop. The loop
//! ticks on a fixed cadence (60s in production), evaluates every enabled
//! runner against the due-window heuristic, and suppresses duplicate firings
//! with a dedup guard on the runner's last-run timestamp. Task execution is
//! a store update plus a bus publish, run inline on the polling task.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{BusMessage, MessageBus};
use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::cron_engine;
use crate::error::{Error, ScheduleError, StoreError};
use crate::store::TaskStore;
use crate::task::Task;

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// In-memory execution state for one registered task.
#[derive(Debug, Clone)]
struct TaskRunner {
    task: Task,
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
}

impl TaskRunner {
    fn new(task: Task, now: DateTime<Utc>) -> Self {
        let next_run = cron_engine::next_occurrence(&task.cron_expr, now);
        Self {
            task,
            last_run: None,
            next_run,
        }
    }
}

/// Handle to the running poll loop.
struct PollLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// The task scheduler. One background poll loop per running instance; the
/// runner map is owned exclusively by this instance.
pub struct Scheduler {
    config: SchedulerConfig,
    store: Arc<dyn TaskStore>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn Clock>,
    runners: Arc<RwLock<HashMap<String, TaskRunner>>>,
    state: Arc<RwLock<SchedulerState>>,
    poll_loop: Mutex<Option<PollLoop>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn TaskStore>,
        bus: Arc<dyn MessageBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            bus,
            clock,
            runners: Arc::new(RwLock::new(HashMap::new())),
            state: Arc::new(RwLock::new(SchedulerState::Stopped)),
            poll_loop: Mutex::new(None),
        }
    }

    /// Start the poll loop. Idempotent: a second call while running is a
    /// no-op. Store load failures degrade to an empty task set.
    pub async fn start(&self) {
        let mut poll_loop = self.poll_loop.lock().await;
        if poll_loop.is_some() {
            debug!("Scheduler already running, ignoring start");
            return;
        }
        *self.state.write().await = SchedulerState::Starting;

        let tasks = match self.store.list_enabled().await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "Failed to load tasks at startup, starting empty");
                Vec::new()
            }
        };
        let now = self.clock.now();
        {
            let mut runners = self.runners.write().await;
            runners.clear();
            for task in tasks {
                runners.insert(task.name.clone(), TaskRunner::new(task, now));
            }
            info!(tasks = runners.len(), "Scheduler loaded tasks");
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let config = self.config.clone();
        let store = Arc::clone(&self.store);
        let bus = Arc::clone(&self.bus);
        let clock = Arc::clone(&self.clock);
        let runners = Arc::clone(&self.runners);

        let handle = tokio::spawn(async move {
            // First tick fires immediately.
            let mut tick = tokio::time::interval(config.poll_interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        run_tick(&config, clock.as_ref(), &runners, store.as_ref(), bus.as_ref())
                            .await;
                    }
                    _ = shutdown_rx.changed() => {
                        debug!("Poll loop shutting down");
                        return;
                    }
                }
            }
        });

        *poll_loop = Some(PollLoop {
            shutdown: shutdown_tx,
            handle,
        });
        *self.state.write().await = SchedulerState::Running;
        info!(poll_secs = self.config.poll_interval.as_secs(), "Scheduler started");
    }

    /// Stop the poll loop and clear the runner map. Blocks until the loop
    /// task has exited, so no tick runs after this returns. Persisted
    /// records are untouched.
    pub async fn stop(&self) {
        let mut poll_loop = self.poll_loop.lock().await;
        let Some(PollLoop { shutdown, handle }) = poll_loop.take() else {
            debug!("Scheduler not running, ignoring stop");
            return;
        };
        *self.state.write().await = SchedulerState::Stopping;

        let _ = shutdown.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "Poll loop join failed");
        }

        self.runners.write().await.clear();
        *self.state.write().await = SchedulerState::Stopped;
        info!("Scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.state.read().await == SchedulerState::Running
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    /// Register and persist a new task.
    ///
    /// The cron expression is validated first; rejection leaves no side
    /// effects. Store errors propagate verbatim and roll the runner back out
    /// of the map.
    pub async fn add_task(&self, task: Task) -> Result<(), Error> {
        if !cron_engine::validate(&task.cron_expr) {
            return Err(ScheduleError::InvalidCronExpression {
                expr: task.cron_expr.clone(),
            }
            .into());
        }

        let now = self.clock.now();
        {
            let mut runners = self.runners.write().await;
            if runners.contains_key(&task.name) {
                return Err(StoreError::AlreadyExists {
                    name: task.name.clone(),
                }
                .into());
            }
            runners.insert(task.name.clone(), TaskRunner::new(task.clone(), now));
        }

        if let Err(e) = self.store.create(&task).await {
            self.runners.write().await.remove(&task.name);
            return Err(e.into());
        }
        info!(task = %task.name, cron = %task.cron_expr, "Task registered");
        Ok(())
    }

    /// Unregister the runner and delete the persisted record. Removing a
    /// name that was never added is a silent no-op.
    pub async fn remove_task(&self, name: &str) -> Result<(), Error> {
        let removed = self.runners.write().await.remove(name).is_some();
        self.store.delete(name).await?;
        if removed {
            info!(task = %name, "Task removed");
        } else {
            debug!(task = %name, "Remove for unknown task ignored");
        }
        Ok(())
    }

    /// Flip the persisted enabled flag on. Takes effect at the next poll.
    /// A task with no live runner (disabled across a restart) gets its
    /// runner rebuilt from the store record.
    pub async fn enable_task(&self, name: &str) -> Result<(), Error> {
        self.set_task_enabled(name, true).await
    }

    /// Flip the persisted enabled flag off. The runner stays registered so
    /// re-enabling is cheap; it is skipped at every poll.
    pub async fn disable_task(&self, name: &str) -> Result<(), Error> {
        self.set_task_enabled(name, false).await
    }

    async fn set_task_enabled(&self, name: &str, enabled: bool) -> Result<(), Error> {
        let now = self.clock.now();
        let task = {
            let mut runners = self.runners.write().await;
            match runners.get_mut(name) {
                Some(runner) => {
                    runner.task.enabled = enabled;
                    runner.task.touch(now);
                    Some(runner.task.clone())
                }
                None => None,
            }
        };

        let task = match task {
            Some(task) => task,
            None => {
                let mut task =
                    self.store
                        .get(name)
                        .await?
                        .ok_or_else(|| StoreError::NotFound {
                            name: name.to_string(),
                        })?;
                task.enabled = enabled;
                task.touch(now);
                self.runners
                    .write()
                    .await
                    .insert(task.name.clone(), TaskRunner::new(task.clone(), now));
                task
            }
        };

        self.store.update(&task).await?;
        info!(task = %name, enabled, "Task toggled");
        Ok(())
    }

    /// All registered tasks, sorted by name.
    pub async fn list_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .runners
            .read()
            .await
            .values()
            .map(|r| r.task.clone())
            .collect();
        tasks.sort_by(|a, b| a.name.cmp(&b.name));
        tasks
    }

    pub async fn get_task(&self, name: &str) -> Option<Task> {
        self.runners.read().await.get(name).map(|r| r.task.clone())
    }

    pub async fn get_task_next_run(&self, name: &str) -> Option<DateTime<Utc>> {
        self.runners.read().await.get(name).and_then(|r| r.next_run)
    }

    /// Evaluate one poll tick now. This is the loop body; exposed so tests
    /// and operators can drive a tick deterministically.
    pub async fn poll_once(&self) {
        run_tick(
            &self.config,
            self.clock.as_ref(),
            &self.runners,
            self.store.as_ref(),
            self.bus.as_ref(),
        )
        .await;
    }
}

/// One poll tick: snapshot due runners under the read lock, then fire each
/// one without holding the lock across store/bus calls.
async fn run_tick(
    config: &SchedulerConfig,
    clock: &dyn Clock,
    runners: &RwLock<HashMap<String, TaskRunner>>,
    store: &dyn TaskStore,
    bus: &dyn MessageBus,
) {
    let now = clock.now();
    let dedup = chrono::Duration::from_std(config.dedup_window)
        .unwrap_or_else(|_| chrono::Duration::zero());

    let due: Vec<String> = {
        let map = runners.read().await;
        map.values()
            .filter_map(|runner| {
                if !runner.task.enabled {
                    return None;
                }
                if !cron_engine::validate(&runner.task.cron_expr) {
                    warn!(
                        task = %runner.task.name,
                        cron = %runner.task.cron_expr,
                        "Skipping task with invalid cron expression"
                    );
                    return None;
                }
                if !cron_engine::is_due_within(&runner.task.cron_expr, now, config.due_window) {
                    return None;
                }
                // Dedup guard: the window heuristic can mark the same
                // occurrence due on two adjacent polls.
                if let Some(last) = runner.last_run {
                    if now - last < dedup {
                        debug!(task = %runner.task.name, "Suppressed duplicate firing");
                        return None;
                    }
                }
                Some(runner.task.name.clone())
            })
            .collect()
    };

    for name in due {
        let fired = {
            let mut map = runners.write().await;
            map.get_mut(&name).map(|runner| {
                runner.last_run = Some(now);
                runner.next_run = cron_engine::next_occurrence(&runner.task.cron_expr, now);
                runner.task.last_run_at = Some(now);
                runner.task.next_run_at = runner.next_run;
                runner.task.touch(now);
                runner.task.clone()
            })
        };
        // Removed between snapshot and fire — nothing to do.
        let Some(task) = fired else { continue };

        if let Err(e) = store.update(&task).await {
            warn!(task = %task.name, error = %e, "Failed to persist run timestamps");
        }

        let message = BusMessage::new(&task.channel, &task.chat_id, &task.message, now)
            .with_metadata(serde_json::json!({
                "task_name": task.name,
                "cron_expr": task.cron_expr,
                "next_run": task.next_run_at.map(|t| t.to_rfc3339()),
            }));
        match bus.publish(message).await {
            Ok(()) => info!(task = %task.name, "Task fired"),
            Err(e) => warn!(task = %task.name, error = %e, "Failed to publish task message"),
        }
    }
}
