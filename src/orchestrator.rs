use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Timelike;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::alarm::scheduler::AlarmScheduler;
use crate::alarm::store::{self, AlarmStore, SharedStore};
use crate::api::HttpServer;
use crate::audio::{Buzzer, TWINKLE};
use crate::clock::{SystemClock, WallClock};
use crate::command::channel::{ConsoleButtons, ConsolePublisher, Publisher, spawn_console};
use crate::command::handlers::register_alarm_commands;
use crate::command::router::CommandRouter;
use crate::config::AppConfig;
use crate::input::{DebouncedInput, SimulatedLine};
use crate::ring::RingController;
use crate::state::{SharedUiState, UiState};

pub async fn run(config: AppConfig) -> Result<()> {
    let store = store::shared(AlarmStore::open(&config.alarm_file));
    let ui = UiState::new(display_address(&config));
    let clock: Arc<dyn WallClock> = Arc::new(SystemClock);

    let stop_line = Arc::new(SimulatedLine::new());
    let next_line = Arc::new(SimulatedLine::new());
    let ring = Arc::new(RingController::new(
        Arc::new(Buzzer::new()),
        DebouncedInput::new("stop", stop_line.clone(), config.debounce),
        TWINKLE,
        config.ring,
    ));
    let next_input = DebouncedInput::new("next", next_line.clone(), config.debounce);

    let publisher: Arc<dyn Publisher> = Arc::new(ConsolePublisher::new());
    let mut router = CommandRouter::new();
    register_alarm_commands(&mut router, &config.topics, &store, &publisher);
    let link = spawn_console(ConsoleButtons {
        stop: stop_line,
        next: next_line,
    });

    let _http = match &config.http {
        Some(http) => Some(
            HttpServer::start(http, Arc::clone(&store), Arc::clone(&ui))
                .with_context(|| format!("failed to start HTTP surface on port {}", http.port))?,
        ),
        None => None,
    };

    let scheduler = Arc::new(
        AlarmScheduler::new(Arc::clone(&store), Arc::clone(&ring), Arc::clone(&clock))
            .with_ui_state(Arc::clone(&ui)),
    );

    let mut tasks = JoinSet::new();
    tasks.spawn(scheduler.run());
    tasks.spawn(router.run(link));
    tasks.spawn(ui_cycle(next_input, Arc::clone(&store), Arc::clone(&ui)));
    tasks.spawn(publish_status(StatusPublisher {
        store: Arc::clone(&store),
        ui: Arc::clone(&ui),
        ring: Arc::clone(&ring),
        clock,
        publisher,
        topic: config.topics.status(),
        every: config.status_interval,
    }));
    info!(file = %config.alarm_file.display(), "alarm clock running");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    tasks.shutdown().await;
    Ok(())
}

fn display_address(config: &AppConfig) -> String {
    match &config.http {
        Some(http) => match http.bind_addr.parse::<IpAddr>() {
            Ok(ip) if !ip.is_unspecified() => format!("{ip}:{}", http.port),
            _ => format!("port {}", http.port),
        },
        None => "offline".to_string(),
    }
}

async fn ui_cycle(next: DebouncedInput, store: SharedStore, ui: SharedUiState) {
    loop {
        next.wait_press().await;
        let selected = {
            let guard = store::lock(&store);
            ui.advance_cursor(guard.len())
                .and_then(|index| guard.get_all().get(index).map(|alarm| (index, alarm.summary())))
        };
        match selected {
            Some((index, summary)) => info!(input = next.name(), index, "showing alarm {summary}"),
            None => info!(input = next.name(), "no alarms"),
        }
        next.wait_release().await;
    }
}

#[derive(Debug, Serialize)]
struct StatusReport {
    time: String,
    alarms: usize,
    enabled: usize,
    ringing: bool,
    cursor: Option<usize>,
}

struct StatusPublisher {
    store: SharedStore,
    ui: SharedUiState,
    ring: Arc<RingController>,
    clock: Arc<dyn WallClock>,
    publisher: Arc<dyn Publisher>,
    topic: String,
    every: Duration,
}

impl StatusPublisher {
    fn report(&self) -> StatusReport {
        let now = self.clock.now();
        let (alarms, enabled) = {
            let guard = store::lock(&self.store);
            let enabled = guard.get_all().iter().filter(|alarm| alarm.enabled).count();
            (guard.len(), enabled)
        };
        StatusReport {
            time: format!("{:02}:{:02}:{:02}", now.hour(), now.minute(), now.second()),
            alarms,
            enabled,
            ringing: self.ring.is_ringing(),
            cursor: self.ui.cursor_for(alarms),
        }
    }
}

async fn publish_status(status: StatusPublisher) {
    let mut ticker = interval(status.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let body = match serde_json::to_string(&status.report()) {
            Ok(body) => body,
            Err(err) => {
                warn!("status report not serialisable: {err}");
                continue;
            }
        };
        if let Err(err) = status.publisher.publish(&status.topic, &body).await {
            warn!("status publish failed: {err:#}");
        }
    }
}
