use std::sync::Arc;

use anyhow::Result;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

use agent_pulse::bus::{MemoryBus, MessageBus};
use agent_pulse::clock::SystemClock;
use agent_pulse::commands;
use agent_pulse::config::{HeartbeatConfig, SchedulerConfig};
use agent_pulse::heartbeat::{HeartbeatManager, HeartbeatService};
use agent_pulse::scheduler::Scheduler;
use agent_pulse::store::MemoryTaskStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; AGENT_PULSE_LOG_DIR switches to daily rolling files.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _log_guard = match std::env::var("AGENT_PULSE_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, "agent-pulse.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            None
        }
    };

    let scheduler_config = SchedulerConfig::from_env();
    let heartbeat_config = HeartbeatConfig::from_env();

    eprintln!("⏱  Agent Pulse v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Poll: every {}s (window {}s, dedup {}s)",
        scheduler_config.poll_interval.as_secs(),
        scheduler_config.due_window.as_secs(),
        scheduler_config.dedup_window.as_secs(),
    );
    if heartbeat_config.enabled {
        eprintln!(
            "   Heartbeat: every {}s (workspace: {})",
            heartbeat_config.effective_interval().as_secs(),
            heartbeat_config.workspace.display(),
        );
    } else {
        eprintln!("   Heartbeat: disabled");
    }
    eprintln!("   Type a command and press Enter. 'help' for commands, /quit to exit.\n");

    let store = Arc::new(MemoryTaskStore::new());
    let bus = Arc::new(MemoryBus::default());
    let clock = Arc::new(SystemClock);

    // Print everything the subsystem publishes.
    let mut published = bus.subscribe();
    tokio::spawn(async move {
        while let Some(message) = published.next().await {
            if message.channel.is_empty() {
                let event = message.metadata["event"].as_str().unwrap_or("system");
                eprintln!("[bus] {event}: {}", message.metadata);
            } else {
                eprintln!(
                    "[bus] {}:{} <- {}",
                    message.channel, message.chat_id, message.content
                );
            }
        }
    });

    let scheduler = Arc::new(Scheduler::new(
        scheduler_config,
        store,
        bus.clone() as Arc<dyn MessageBus>,
        clock.clone(),
    ));
    scheduler.start().await;

    let heartbeats = HeartbeatManager::new();
    heartbeats
        .register(
            "default",
            Arc::new(HeartbeatService::new(
                heartbeat_config,
                bus as Arc<dyn MessageBus>,
                clock,
            )),
        )
        .await;
    heartbeats.start_all().await;

    // Operator REPL on stdin.
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }
        if line == "/quit" {
            break;
        }
        let response = match commands::parse(line) {
            Ok(command) => commands::execute(command, &scheduler).await,
            Err(e) => e,
        };
        println!("{response}\n");
        eprint!("> ");
    }

    scheduler.stop().await;
    heartbeats.stop_all().await;
    Ok(())
}
