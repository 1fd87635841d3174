//! Periodic heartbeat service.
//!
//! A wake probe that runs on its own clock, decoupled from user cron tasks.
//! Each beat publishes a heartbeat system event and, when enabled, scans an
//! operator checklist file for ad-hoc periodic reminders. Multiple services
//! (one per workspace or persona) run side by side under `HeartbeatManager`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::bus::{BusMessage, MessageBus};
use crate::clock::Clock;
use crate::config::HeartbeatConfig;
use crate::error::HeartbeatError;

/// Operator checklist filename, searched in the workspace then the current
/// directory.
pub const CHECKLIST_FILE: &str = "CHECKLIST.md";

/// One reminder parsed out of the checklist file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistItem {
    pub description: String,
    pub due: String,
}

/// Parse checklist content: blank lines and `#` comments are skipped, lines
/// starting with `"- "` or `"* "` become periodic task descriptors.
pub fn parse_checklist(content: &str) -> Vec<ChecklistItem> {
    content
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let description = line
                .strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))?;
            Some(ChecklistItem {
                description: description.trim().to_string(),
                due: "periodic".to_string(),
            })
        })
        .collect()
}

/// Handle to the running beat loop.
struct BeatLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// The heartbeat prober. One background beat loop per running instance.
pub struct HeartbeatService {
    config: Arc<RwLock<HeartbeatConfig>>,
    bus: Arc<dyn MessageBus>,
    clock: Arc<dyn Clock>,
    beat_loop: Mutex<Option<BeatLoop>>,
}

impl HeartbeatService {
    pub fn new(config: HeartbeatConfig, bus: Arc<dyn MessageBus>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            bus,
            clock,
            beat_loop: Mutex::new(None),
        }
    }

    /// Start the beat loop. Idempotent, and a no-op when the service is
    /// configured disabled. The first beat fires immediately.
    pub async fn start(&self) {
        let mut beat_loop = self.beat_loop.lock().await;
        if beat_loop.is_some() {
            debug!("Heartbeat already running, ignoring start");
            return;
        }
        if !self.config.read().await.enabled {
            debug!("Heartbeat disabled, not starting");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let config = Arc::clone(&self.config);
        let bus = Arc::clone(&self.bus);
        let clock = Arc::clone(&self.clock);

        let handle = tokio::spawn(async move {
            loop {
                run_beat(&config, bus.as_ref(), clock.as_ref()).await;
                // Re-read each cycle so interval hot-reloads take effect
                // once the current period elapses.
                let interval = config.read().await.effective_interval();
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => {
                        debug!("Heartbeat loop shutting down");
                        return;
                    }
                }
            }
        });

        let interval = self.config.read().await.effective_interval();
        *beat_loop = Some(BeatLoop {
            shutdown: shutdown_tx,
            handle,
        });
        info!(interval_secs = interval.as_secs(), "Heartbeat started");
    }

    /// Stop the beat loop. Blocks until the loop task has exited, so no beat
    /// fires after this returns. Stopping a stopped service is a no-op.
    pub async fn stop(&self) -> Result<(), HeartbeatError> {
        let mut beat_loop = self.beat_loop.lock().await;
        let Some(BeatLoop { shutdown, handle }) = beat_loop.take() else {
            return Ok(());
        };
        let _ = shutdown.send(true);
        handle.await.map_err(|e| HeartbeatError::JoinFailed {
            reason: e.to_string(),
        })?;
        info!("Heartbeat stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.beat_loop.lock().await.is_some()
    }

    /// Replace the beat interval without a stop/start cycle. An in-flight
    /// period is not interrupted; the new cadence applies after it elapses.
    pub async fn set_interval(&self, interval: Duration) {
        let mut config = self.config.write().await;
        config.interval = interval;
        info!(
            interval_secs = config.effective_interval().as_secs(),
            "Heartbeat interval updated"
        );
    }

    /// Replace the whole config without a stop/start cycle.
    pub async fn set_config(&self, config: HeartbeatConfig) {
        *self.config.write().await = config;
        debug!("Heartbeat config replaced");
    }

    pub async fn get_config(&self) -> HeartbeatConfig {
        self.config.read().await.clone()
    }

    /// Run one beat now, regardless of the running state or enabled gate.
    pub async fn beat_once(&self) {
        run_beat(&self.config, self.bus.as_ref(), self.clock.as_ref()).await;
    }
}

/// One beat: publish the heartbeat event, then surface checklist reminders.
async fn run_beat(config: &RwLock<HeartbeatConfig>, bus: &dyn MessageBus, clock: &dyn Clock) {
    let cfg = config.read().await.clone();
    let now = clock.now();

    let heartbeat = BusMessage::system_event(now).with_metadata(serde_json::json!({
        "event": "heartbeat",
        "timestamp": now.to_rfc3339(),
        "interval_secs": cfg.effective_interval().as_secs(),
    }));
    if let Err(e) = bus.publish(heartbeat).await {
        warn!(error = %e, "Failed to publish heartbeat event");
    }

    if !cfg.check_checklist {
        return;
    }
    let Some((path, items)) = scan_checklist(&cfg).await else {
        return;
    };
    if items.is_empty() {
        debug!(path = %path.display(), "Checklist has no periodic items");
        return;
    }
    info!(path = %path.display(), items = items.len(), "Checklist items found");
    if !cfg.notify_on_wake {
        return;
    }

    let event = BusMessage::system_event(now).with_metadata(serde_json::json!({
        "event": "task_start",
        "source": format!("checklist:{}", path.display()),
        "timestamp": now.to_rfc3339(),
        "tasks": items,
    }));
    if let Err(e) = bus.publish(event).await {
        warn!(error = %e, "Failed to publish task-start event");
    }
}

/// Find and parse the checklist file: workspace first, then the current
/// directory. A missing file is not an error.
async fn scan_checklist(cfg: &HeartbeatConfig) -> Option<(PathBuf, Vec<ChecklistItem>)> {
    let candidates = [cfg.workspace.join(CHECKLIST_FILE), PathBuf::from(CHECKLIST_FILE)];
    for path in candidates {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => return Some((path, parse_checklist(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read checklist file");
                return None;
            }
        }
    }
    debug!("No checklist file found");
    None
}

/// Named registry over multiple heartbeat services.
#[derive(Default)]
pub struct HeartbeatManager {
    services: RwLock<HashMap<String, Arc<HeartbeatService>>>,
}

impl HeartbeatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under a name, replacing any previous holder.
    pub async fn register(&self, name: &str, service: Arc<HeartbeatService>) {
        let previous = self
            .services
            .write()
            .await
            .insert(name.to_string(), service);
        if previous.is_some() {
            warn!(heartbeat = %name, "Replaced existing heartbeat registration");
        }
    }

    /// Start every registered service. Disabled services no-op individually.
    pub async fn start_all(&self) {
        for (name, service) in self.snapshot().await {
            service.start().await;
            debug!(heartbeat = %name, "Start attempted");
        }
    }

    /// Stop every registered service. A failure stopping one instance is
    /// logged and does not prevent attempting the rest.
    pub async fn stop_all(&self) {
        for (name, service) in self.snapshot().await {
            if let Err(e) = service.stop().await {
                error!(heartbeat = %name, error = %e, "Failed to stop heartbeat");
            }
        }
    }

    pub async fn get(&self, name: &str) -> Option<Arc<HeartbeatService>> {
        self.services.read().await.get(name).cloned()
    }

    /// Registered names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    async fn snapshot(&self) -> Vec<(String, Arc<HeartbeatService>)> {
        self.services
            .read()
            .await
            .iter()
            .map(|(name, service)| (name.clone(), Arc::clone(service)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::clock::SystemClock;
    use crate::config::DEFAULT_HEARTBEAT_INTERVAL;
    use crate::error::BusError;

    #[derive(Default)]
    struct RecordingBus {
        messages: std::sync::Mutex<Vec<BusMessage>>,
    }

    impl RecordingBus {
        fn count(&self) -> usize {
            self.messages.lock().unwrap().len()
        }

        fn all(&self) -> Vec<BusMessage> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageBus for RecordingBus {
        async fn publish(&self, message: BusMessage) -> Result<(), BusError> {
            self.messages.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn service_with(config: HeartbeatConfig) -> (HeartbeatService, Arc<RecordingBus>) {
        let bus = Arc::new(RecordingBus::default());
        let service = HeartbeatService::new(
            config,
            bus.clone() as Arc<dyn MessageBus>,
            Arc::new(SystemClock),
        );
        (service, bus)
    }

    #[test]
    fn checklist_parsing_extracts_dash_and_star_items() {
        let items = parse_checklist("- task A\n# comment\n\n* task B");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "task A");
        assert_eq!(items[1].description, "task B");
        assert!(items.iter().all(|i| i.due == "periodic"));
    }

    #[test]
    fn checklist_parsing_ignores_prose_and_bare_markers() {
        let items = parse_checklist("notes without marker\n-not-an-item\n*also-not\n  - indented item");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "indented item");
    }

    #[test]
    fn checklist_parsing_empty_input() {
        assert!(parse_checklist("").is_empty());
        assert!(parse_checklist("# only comments\n\n").is_empty());
    }

    #[tokio::test]
    async fn zero_interval_service_reports_default() {
        let (service, _bus) = service_with(HeartbeatConfig {
            interval: Duration::ZERO,
            ..Default::default()
        });
        let config = service.get_config().await;
        assert_eq!(config.effective_interval(), DEFAULT_HEARTBEAT_INTERVAL);
    }

    #[tokio::test]
    async fn beat_publishes_heartbeat_event() {
        let (service, bus) = service_with(HeartbeatConfig {
            check_checklist: false,
            ..Default::default()
        });
        service.beat_once().await;

        let messages = bus.all();
        assert_eq!(messages.len(), 1);
        let beat = &messages[0];
        assert!(beat.channel.is_empty());
        assert!(beat.chat_id.is_empty());
        assert_eq!(beat.metadata["event"], "heartbeat");
        assert_eq!(
            beat.metadata["interval_secs"],
            DEFAULT_HEARTBEAT_INTERVAL.as_secs()
        );
    }

    #[tokio::test]
    async fn missing_checklist_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (service, bus) = service_with(HeartbeatConfig {
            workspace: dir.path().join("empty"),
            ..Default::default()
        });
        service.beat_once().await;
        // Only the heartbeat event — no task-start, no failure.
        assert_eq!(bus.count(), 1);
    }

    #[tokio::test]
    async fn checklist_items_produce_task_start_event() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join(CHECKLIST_FILE),
            "# morning sweep\n- water the plants\n* rotate the logs\n",
        )
        .await
        .unwrap();

        let (service, bus) = service_with(HeartbeatConfig {
            workspace: dir.path().to_path_buf(),
            ..Default::default()
        });
        service.beat_once().await;

        let messages = bus.all();
        assert_eq!(messages.len(), 2);
        let event = &messages[1];
        assert_eq!(event.metadata["event"], "task_start");
        assert_eq!(event.metadata["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(event.metadata["tasks"][0]["description"], "water the plants");
        assert_eq!(event.metadata["tasks"][0]["due"], "periodic");
        let source = event.metadata["source"].as_str().unwrap();
        assert!(source.starts_with("checklist:"));
        assert!(source.ends_with(CHECKLIST_FILE));
    }

    #[tokio::test]
    async fn wake_notification_gate_suppresses_task_start() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join(CHECKLIST_FILE), "- quiet task\n")
            .await
            .unwrap();

        let (service, bus) = service_with(HeartbeatConfig {
            workspace: dir.path().to_path_buf(),
            notify_on_wake: false,
            ..Default::default()
        });
        service.beat_once().await;
        assert_eq!(bus.count(), 1);
    }

    #[tokio::test]
    async fn disabled_service_does_not_start() {
        let (service, bus) = service_with(HeartbeatConfig {
            enabled: false,
            ..Default::default()
        });
        service.start().await;
        assert!(!service.is_running().await);
        assert_eq!(bus.count(), 0);
        service.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_joins_the_loop() {
        let (service, bus) = service_with(HeartbeatConfig {
            interval: Duration::from_millis(20),
            check_checklist: false,
            ..Default::default()
        });

        service.start().await;
        service.start().await;
        assert!(service.is_running().await);

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(bus.count() >= 2, "beat loop should have fired repeatedly");

        service.stop().await.unwrap();
        assert!(!service.is_running().await);

        let settled = bus.count();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(bus.count(), settled, "no beat after stop() returns");
    }

    #[tokio::test]
    async fn interval_hot_reload_updates_config() {
        let (service, _bus) = service_with(HeartbeatConfig::default());
        service.set_interval(Duration::from_secs(120)).await;
        assert_eq!(
            service.get_config().await.effective_interval(),
            Duration::from_secs(120)
        );

        service.set_interval(Duration::ZERO).await;
        assert_eq!(
            service.get_config().await.effective_interval(),
            DEFAULT_HEARTBEAT_INTERVAL
        );
    }

    #[tokio::test]
    async fn manager_registers_and_controls_services() {
        let manager = HeartbeatManager::new();
        let (alpha, alpha_bus) = service_with(HeartbeatConfig {
            interval: Duration::from_secs(3600),
            check_checklist: false,
            ..Default::default()
        });
        let (beta, beta_bus) = service_with(HeartbeatConfig {
            enabled: false,
            ..Default::default()
        });

        manager.register("beta", Arc::new(beta)).await;
        manager.register("alpha", Arc::new(alpha)).await;
        assert_eq!(manager.list().await, vec!["alpha", "beta"]);

        manager.start_all().await;
        assert!(manager.get("alpha").await.unwrap().is_running().await);
        assert!(!manager.get("beta").await.unwrap().is_running().await);

        // alpha fired its immediate first beat; disabled beta never did.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(alpha_bus.count(), 1);
        assert_eq!(beta_bus.count(), 0);

        manager.stop_all().await;
        assert!(!manager.get("alpha").await.unwrap().is_running().await);
        assert!(manager.get("missing").await.is_none());
    }
}
