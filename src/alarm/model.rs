use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AlarmId = u64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("hour {0} out of range (expected 0-23)")]
    HourOutOfRange(i64),
    #[error("minute {0} out of range (expected 0-59)")]
    MinuteOutOfRange(i64),
    #[error("unknown weekday '{0}'")]
    UnknownWeekday(String),
    #[error("no alarm ids left")]
    IdsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alarm {
    pub id: AlarmId,
    pub hour: u32,
    pub minute: u32,
    /// Empty means single-shot: rings on whatever day the time next matches.
    pub weekdays: Vec<Weekday>,
    pub enabled: bool,
}

impl Alarm {
    pub fn new(
        id: AlarmId,
        hour: i64,
        minute: i64,
        weekdays: Vec<Weekday>,
        enabled: bool,
    ) -> Result<Self, AlarmError> {
        check_time(hour, minute)?;
        Ok(Self {
            id,
            hour: hour as u32,
            minute: minute as u32,
            weekdays,
            enabled,
        })
    }

    pub fn is_single_shot(&self) -> bool {
        self.weekdays.is_empty()
    }

    /// Whether this alarm should ring at the given wall-clock minute.
    pub fn matches(&self, hour: u32, minute: u32, today: Weekday) -> bool {
        self.enabled
            && self.hour == hour
            && self.minute == minute
            && (self.weekdays.is_empty() || self.weekdays.contains(&today))
    }

    pub fn summary(&self) -> String {
        format!(
            "{:02}:{:02} {}",
            self.hour,
            self.minute,
            format_weekdays(&self.weekdays)
        )
    }

    pub fn to_record(&self) -> AlarmRecord {
        AlarmRecord {
            id: Some(self.id),
            hour: i64::from(self.hour),
            minute: i64::from(self.minute),
            weekdays: self
                .weekdays
                .iter()
                .map(|day| weekday_to_token(*day).to_string())
                .collect(),
            enabled: self.enabled,
        }
    }
}

pub fn check_time(hour: i64, minute: i64) -> Result<(), AlarmError> {
    if !(0..=23).contains(&hour) {
        return Err(AlarmError::HourOutOfRange(hour));
    }
    if !(0..=59).contains(&minute) {
        return Err(AlarmError::MinuteOutOfRange(minute));
    }
    Ok(())
}

/// On-disk and on-wire shape of one alarm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AlarmId>,
    pub hour: i64,
    pub minute: i64,
    #[serde(default)]
    pub weekdays: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

pub fn load_alarm_list(path: &Path) -> Result<Vec<AlarmRecord>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("unable to read alarm file {}", path.display()))?;
    parse_alarm_list_text(&content)
}

pub fn parse_alarm_list_text(content: &str) -> Result<Vec<AlarmRecord>> {
    serde_json::from_str::<Vec<AlarmRecord>>(content).map_err(|err| {
        let line = err.line();
        let column = err.column();
        anyhow::anyhow!("invalid JSON at line {line}, column {column}: {err}")
    })
}

pub fn save_alarm_list(path: &Path, alarms: &[Alarm]) -> Result<()> {
    let records = alarms.iter().map(Alarm::to_record).collect::<Vec<_>>();
    let text = serde_json::to_string_pretty(&records)?;
    fs::write(path, format!("{text}\n"))
        .with_context(|| format!("unable to write alarm file {}", path.display()))?;
    Ok(())
}

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Accepts the three-letter tag used in the file ("Mon") as well as full
/// names, case-insensitively.
pub fn parse_weekday(input: &str) -> Result<Weekday, AlarmError> {
    let trimmed = input.trim();
    WEEKDAYS
        .into_iter()
        .find(|day| {
            let tag = weekday_to_token(*day);
            trimmed.eq_ignore_ascii_case(tag) || trimmed.eq_ignore_ascii_case(full_name(*day))
        })
        .ok_or_else(|| AlarmError::UnknownWeekday(trimmed.to_string()))
}

pub fn weekday_to_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn full_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn format_weekdays(days: &[Weekday]) -> String {
    if days.is_empty() {
        return "Once".to_string();
    }
    days.iter()
        .map(|day| weekday_to_token(*day))
        .collect::<Vec<_>>()
        .join(",")
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_alarm_list() {
        let json = r#"
[
  { "hour": 7, "minute": 30, "weekdays": ["Mon", "Fri"], "enabled": true },
  { "id": 9, "hour": 22, "minute": 5, "weekdays": [], "enabled": false },
  { "hour": 6, "minute": 0 }
]
"#;

        let records = parse_alarm_list_text(json).expect("valid list");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id, None);
        assert_eq!(
            records[0].weekdays,
            vec!["Mon".to_string(), "Fri".to_string()]
        );
        assert_eq!(records[1].id, Some(9));
        assert!(!records[1].enabled);
        assert!(records[2].enabled);
        assert!(records[2].weekdays.is_empty());
    }

    #[test]
    fn weekday_spelling_is_checked_per_entry_not_per_file() {
        let json = r#"[{ "hour": 7, "minute": 30, "weekdays": ["Funday"] }]"#;
        let records = parse_alarm_list_text(json).expect("well-formed list");
        assert_eq!(records[0].weekdays, vec!["Funday".to_string()]);
    }

    #[test]
    fn rejects_wrong_field_types() {
        let json = r#"[{ "hour": "seven", "minute": 30 }]"#;
        let err = parse_alarm_list_text(json).expect_err("hour must be a number");
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn rejects_out_of_range_time() {
        assert_eq!(
            Alarm::new(1, 24, 0, vec![], true),
            Err(AlarmError::HourOutOfRange(24))
        );
        assert_eq!(
            Alarm::new(1, 23, 60, vec![], true),
            Err(AlarmError::MinuteOutOfRange(60))
        );
        assert_eq!(
            Alarm::new(1, -1, 0, vec![], true),
            Err(AlarmError::HourOutOfRange(-1))
        );
        assert!(Alarm::new(1, 23, 59, vec![], true).is_ok());
    }

    #[test]
    fn parse_weekday_accepts_tags_and_full_names() {
        assert_eq!(parse_weekday("Tue"), Ok(Weekday::Tue));
        assert_eq!(parse_weekday("thu"), Ok(Weekday::Thu));
        assert_eq!(parse_weekday("Sunday"), Ok(Weekday::Sun));
        assert_eq!(
            parse_weekday("Funday"),
            Err(AlarmError::UnknownWeekday("Funday".to_string()))
        );
    }

    #[test]
    fn matches_respects_weekdays_and_enabled() {
        let recurring = Alarm::new(1, 8, 30, vec![Weekday::Mon], true).expect("valid");
        assert!(recurring.matches(8, 30, Weekday::Mon));
        assert!(!recurring.matches(8, 30, Weekday::Tue));
        assert!(!recurring.matches(8, 31, Weekday::Mon));

        let once = Alarm::new(2, 8, 30, vec![], true).expect("valid");
        assert!(once.matches(8, 30, Weekday::Sat));

        let disabled = Alarm::new(3, 8, 30, vec![], false).expect("valid");
        assert!(!disabled.matches(8, 30, Weekday::Mon));
    }

    #[test]
    fn summary_formats_days() {
        let alarm =
            Alarm::new(1, 7, 5, vec![Weekday::Tue, Weekday::Thu], true).expect("valid");
        assert_eq!(alarm.summary(), "07:05 Tue,Thu");
        let once = Alarm::new(2, 23, 0, vec![], true).expect("valid");
        assert_eq!(once.summary(), "23:00 Once");
    }
}
