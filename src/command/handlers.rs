use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Weekday;
use tracing::info;

use crate::alarm::model::{AlarmRecord, parse_weekday};
use crate::alarm::store::{self, SharedStore};
use crate::command::channel::Publisher;
use crate::command::payload::Payload;
use crate::command::router::{CommandHandler, CommandRouter};
use crate::config::Topics;

pub struct AddAlarm {
    store: SharedStore,
    publisher: Arc<dyn Publisher>,
    reply_topic: String,
}

#[async_trait]
impl CommandHandler for AddAlarm {
    async fn handle(&self, payload: Payload) -> Result<()> {
        info!(%payload, "add command");
        let reply = match add_from_payload(&self.store, &payload) {
            Ok((index, hour, minute)) => {
                format!("Added alarm at {hour:02}:{minute:02}, index={index}")
            }
            Err(reason) => format!("Add rejected: {reason}"),
        };
        self.publisher.publish(&self.reply_topic, &reply).await
    }
}

fn add_from_payload(
    store: &SharedStore,
    payload: &Payload,
) -> Result<(usize, i64, i64), String> {
    let (Some(hour), Some(minute)) = (payload.int_field("h"), payload.int_field("m")) else {
        return Err("payload must supply integer \"h\" and \"m\"".to_string());
    };
    let days = payload
        .string_list_field("days")
        .ok_or_else(|| "\"days\" must be a list of weekday names".to_string())?;
    let weekdays = days
        .iter()
        .map(|day| parse_weekday(day))
        .collect::<Result<Vec<Weekday>, _>>()
        .map_err(|err| err.to_string())?;

    let index = store::lock(store)
        .add(hour, minute, weekdays)
        .map_err(|err| err.to_string())?;
    Ok((index, hour, minute))
}

pub struct DeleteAlarm {
    store: SharedStore,
    publisher: Arc<dyn Publisher>,
    reply_topic: String,
}

#[async_trait]
impl CommandHandler for DeleteAlarm {
    async fn handle(&self, payload: Payload) -> Result<()> {
        info!(%payload, "delete command");
        let reply = match delete_from_payload(&self.store, &payload) {
            Some(true) => "Delete result: Deleted".to_string(),
            Some(false) => "Delete result: Index Error".to_string(),
            None => "Delete rejected: payload must supply \"index\" or \"id\"".to_string(),
        };
        self.publisher.publish(&self.reply_topic, &reply).await
    }
}

fn delete_from_payload(store: &SharedStore, payload: &Payload) -> Option<bool> {
    if let Some(index) = payload.int_field("index") {
        let removed = usize::try_from(index)
            .ok()
            .and_then(|index| store::lock(store).delete(index));
        return Some(removed.is_some());
    }
    let id = payload.int_field("id")?;
    let removed = u64::try_from(id)
        .ok()
        .and_then(|id| store::lock(store).delete_by_id(id));
    Some(removed.is_some())
}

pub struct ListAlarms {
    store: SharedStore,
    publisher: Arc<dyn Publisher>,
    reply_topic: String,
}

#[async_trait]
impl CommandHandler for ListAlarms {
    async fn handle(&self, _payload: Payload) -> Result<()> {
        let body = alarm_list_json(&self.store)?;
        self.publisher.publish(&self.reply_topic, &body).await
    }
}

pub fn alarm_list_json(store: &SharedStore) -> Result<String> {
    let records: Vec<AlarmRecord> = store::lock(store)
        .get_all()
        .iter()
        .map(|alarm| alarm.to_record())
        .collect();
    Ok(serde_json::to_string(&records)?)
}

pub fn register_alarm_commands(
    router: &mut CommandRouter,
    topics: &Topics,
    store: &SharedStore,
    publisher: &Arc<dyn Publisher>,
) {
    router.register(
        topics.alarm_add(),
        Arc::new(AddAlarm {
            store: Arc::clone(store),
            publisher: Arc::clone(publisher),
            reply_topic: topics.response(),
        }),
    );
    router.register(
        topics.alarm_delete(),
        Arc::new(DeleteAlarm {
            store: Arc::clone(store),
            publisher: Arc::clone(publisher),
            reply_topic: topics.response(),
        }),
    );
    router.register(
        topics.alarm_list(),
        Arc::new(ListAlarms {
            store: Arc::clone(store),
            publisher: Arc::clone(publisher),
            reply_topic: topics.response(),
        }),
    );
}

#[cfg(test)]
mod tests {
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::alarm::store::{AlarmStore, shared};
    use crate::command::channel::tests::RecordingPublisher;
    use crate::command::router::DispatchOutcome;

    struct Fixture {
        _dir: TempDir,
        store: SharedStore,
        publisher: Arc<RecordingPublisher>,
        router: CommandRouter,
        topics: Topics,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().expect("tempdir");
        let store = shared(AlarmStore::open(dir.path().join("alarms.json")));
        let publisher = Arc::new(RecordingPublisher::default());
        let topics = Topics::new("clock");
        let mut router = CommandRouter::new();
        let dyn_publisher: Arc<dyn Publisher> = publisher.clone();
        register_alarm_commands(&mut router, &topics, &store, &dyn_publisher);
        Fixture {
            _dir: dir,
            store,
            publisher,
            router,
            topics,
        }
    }

    #[tokio::test]
    async fn add_creates_one_entry_and_replies_with_index() {
        let fx = fixture();
        let outcome = fx
            .router
            .dispatch(
                b"clock/alarm_add",
                br#"{"h":7,"m":15,"days":["Tue","Thu"]}"#,
            )
            .await;
        assert_eq!(outcome, DispatchOutcome::Handled);

        {
            let guard = store::lock(&fx.store);
            assert_eq!(guard.len(), 1);
            let alarm = &guard.get_all()[0];
            assert_eq!((alarm.hour, alarm.minute), (7, 15));
            assert_eq!(alarm.weekdays, vec![Weekday::Tue, Weekday::Thu]);
            assert!(alarm.enabled);
        }

        let sent = fx.publisher.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, fx.topics.response());
        assert!(sent[0].1.contains("index=0"));
    }

    #[tokio::test]
    async fn add_without_minute_is_rejected_in_reply() {
        let fx = fixture();
        fx.router.dispatch(b"clock/alarm_add", br#"{"h":7}"#).await;
        assert!(store::lock(&fx.store).is_empty());
        assert!(fx.publisher.sent()[0].1.starts_with("Add rejected"));
    }

    #[tokio::test]
    async fn add_out_of_range_or_bad_day_is_rejected() {
        let fx = fixture();
        fx.router
            .dispatch(b"clock/alarm_add", br#"{"h":24,"m":0}"#)
            .await;
        fx.router
            .dispatch(b"clock/alarm_add", br#"{"h":6,"m":0,"days":["Funday"]}"#)
            .await;
        assert!(store::lock(&fx.store).is_empty());

        let sent = fx.publisher.sent();
        assert!(sent[0].1.contains("hour 24 out of range"));
        assert!(sent[1].1.contains("unknown weekday 'Funday'"));
    }

    #[tokio::test]
    async fn add_with_text_payload_is_rejected() {
        let fx = fixture();
        fx.router.dispatch(b"clock/alarm_add", b"seven fifteen").await;
        assert!(store::lock(&fx.store).is_empty());
        assert_eq!(fx.publisher.sent().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_result() {
        let fx = fixture();
        store::lock(&fx.store).add(6, 0, vec![]).expect("valid");

        fx.router
            .dispatch(b"clock/alarm_delete", br#"{"index":3}"#)
            .await;
        assert_eq!(store::lock(&fx.store).len(), 1);

        fx.router
            .dispatch(b"clock/alarm_delete", br#"{"index":0}"#)
            .await;
        assert!(store::lock(&fx.store).is_empty());

        fx.router
            .dispatch(b"clock/alarm_delete", br#"{"index":-1}"#)
            .await;

        let replies = fx
            .publisher
            .sent()
            .into_iter()
            .map(|(_, body)| body)
            .collect::<Vec<_>>();
        assert_eq!(
            replies,
            vec![
                "Delete result: Index Error",
                "Delete result: Deleted",
                "Delete result: Index Error",
            ]
        );
    }

    #[tokio::test]
    async fn delete_by_id_uses_stable_identifier() {
        let fx = fixture();
        let id = {
            let mut guard = store::lock(&fx.store);
            guard.add(6, 0, vec![]).expect("valid");
            guard.add(7, 0, vec![]).expect("valid");
            guard.get_all()[1].id
        };

        let payload = format!(r#"{{"id":{id}}}"#);
        fx.router
            .dispatch(b"clock/alarm_delete", payload.as_bytes())
            .await;

        let guard = store::lock(&fx.store);
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.get_all()[0].hour, 6);
    }

    #[tokio::test]
    async fn list_publishes_store_as_json() {
        let fx = fixture();
        store::lock(&fx.store)
            .add(8, 30, vec![Weekday::Mon])
            .expect("valid");

        fx.router.dispatch(b"clock/alarm_list", b"").await;
        let sent = fx.publisher.sent();
        assert_eq!(sent[0].0, "clock/response");

        let records: Vec<AlarmRecord> = serde_json::from_str(&sent[0].1).expect("json");
        assert_eq!(records.len(), 1);
        assert_eq!((records[0].hour, records[0].minute), (8, 30));
        assert!(records[0].enabled);
    }

    #[tokio::test]
    async fn unregistered_topic_leaves_store_untouched() {
        let fx = fixture();
        let outcome = fx
            .router
            .dispatch(b"clock/alarm_snooze", br#"{"h":7,"m":15}"#)
            .await;
        assert_eq!(outcome, DispatchOutcome::Unmatched);
        assert!(store::lock(&fx.store).is_empty());
        assert!(fx.publisher.sent().is_empty());
    }
}
