mod alarm;
mod api;
mod audio;
mod clock;
mod command;
mod config;
mod input;
mod orchestrator;
mod ring;
mod state;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::alarm::store::AlarmStore;
use crate::config::{AppConfig, HttpConfig, Topics};
use crate::input::DebounceConfig;
use crate::ring::RingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "alarmclock",
    version,
    about = "Alarm clock controller with a persisted alarm list and a command channel"
)]
struct Cli {
    #[arg(long, default_value = "alarms.json")]
    alarms: PathBuf,

    #[arg(long, default_value = "alarmclock")]
    topic_prefix: String,

    #[arg(long, default_value_t = 60)]
    max_ring_secs: u64,

    #[arg(long, default_value_t = 100)]
    ring_poll_ms: u64,

    #[arg(long, default_value_t = 2_000)]
    ring_cooldown_ms: u64,

    #[arg(long, default_value_t = 20)]
    debounce_samples: u32,

    #[arg(long, default_value_t = 30)]
    button_poll_ms: u64,

    #[arg(long, default_value_t = 30)]
    status_interval_secs: u64,

    #[arg(long, default_value = "0.0.0.0")]
    http_bind: String,

    #[arg(long, default_value_t = 8080)]
    http_port: u16,

    #[arg(long)]
    no_http: bool,

    /// Print the stored alarms and exit.
    #[arg(long)]
    list: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn to_config(&self) -> AppConfig {
        AppConfig {
            alarm_file: self.alarms.clone(),
            topics: Topics::new(&self.topic_prefix),
            ring: RingConfig {
                max_duration: Duration::from_secs(self.max_ring_secs),
                poll_interval: Duration::from_millis(self.ring_poll_ms),
                cooldown: Duration::from_millis(self.ring_cooldown_ms),
            },
            debounce: DebounceConfig {
                window: self.debounce_samples,
                poll_interval: Duration::from_millis(self.button_poll_ms),
                ..DebounceConfig::default()
            },
            status_interval: Duration::from_secs(self.status_interval_secs),
            http: (!self.no_http).then(|| HttpConfig {
                bind_addr: self.http_bind.clone(),
                port: self.http_port,
            }),
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = cli.to_config();
    config.validate()?;

    if cli.list {
        print_alarms(&config);
        return Ok(());
    }

    orchestrator::run(config).await
}

fn init_tracing(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("invalid log level '{default_level}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_alarms(config: &AppConfig) {
    let store = AlarmStore::open(&config.alarm_file);
    println!(
        "{} alarm(s) in {}",
        store.len(),
        store.path().display()
    );
    for (index, alarm) in store.get_all().iter().enumerate() {
        let state = if alarm.enabled { "on" } else { "off" };
        println!("[{index}] id={} {} {state}", alarm.id, alarm.summary());
    }
}
