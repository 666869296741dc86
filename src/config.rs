use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};

use crate::input::DebounceConfig;
use crate::ring::RingConfig;

/// Topic names under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    fn topic(&self, leaf: &str) -> String {
        format!("{}/{leaf}", self.prefix)
    }

    pub fn alarm_add(&self) -> String {
        self.topic("alarm_add")
    }

    pub fn alarm_delete(&self) -> String {
        self.topic("alarm_delete")
    }

    pub fn alarm_list(&self) -> String {
        self.topic("alarm_list")
    }

    pub fn response(&self) -> String {
        self.topic("response")
    }

    pub fn status(&self) -> String {
        self.topic("status")
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub alarm_file: PathBuf,
    pub topics: Topics,
    pub ring: RingConfig,
    pub debounce: DebounceConfig,
    pub status_interval: Duration,
    pub http: Option<HttpConfig>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ring.max_duration.is_zero() {
            bail!("--max-ring-secs must be greater than zero");
        }
        if self.ring.poll_interval.is_zero() {
            bail!("--ring-poll-ms must be greater than zero");
        }
        if self.debounce.window == 0 {
            bail!("--debounce-samples must be greater than zero");
        }
        if self.debounce.poll_interval.is_zero() {
            bail!("--button-poll-ms must be greater than zero");
        }
        if self.status_interval.is_zero() {
            bail!("--status-interval-secs must be greater than zero");
        }
        if self.topics.prefix.is_empty() {
            bail!("--topic-prefix must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            alarm_file: PathBuf::from("alarms.json"),
            topics: Topics::new("alarmclock"),
            ring: RingConfig::default(),
            debounce: DebounceConfig::default(),
            status_interval: Duration::from_secs(30),
            http: None,
        }
    }

    #[test]
    fn topics_share_prefix() {
        let topics = Topics::new("home/clock/");
        assert_eq!(topics.alarm_add(), "home/clock/alarm_add");
        assert_eq!(topics.alarm_delete(), "home/clock/alarm_delete");
        assert_eq!(topics.alarm_list(), "home/clock/alarm_list");
        assert_eq!(topics.response(), "home/clock/response");
        assert_eq!(topics.status(), "home/clock/status");
    }

    #[test]
    fn defaults_validate() {
        config().validate().expect("defaults are valid");
    }

    #[test]
    fn zero_values_are_rejected() {
        let mut cfg = config();
        cfg.ring.max_duration = Duration::ZERO;
        assert!(cfg.validate().is_err());

        let mut cfg = config();
        cfg.debounce.window = 0;
        let err = cfg.validate().expect_err("zero window");
        assert!(err.to_string().contains("--debounce-samples"));

        let mut cfg = config();
        cfg.topics = Topics::new("/");
        assert!(cfg.validate().is_err());
    }
}
