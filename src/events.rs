use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};
use url::Url;

pub const TIME_STAMP_KEY: &str = "timeStamp";

/// Host-visible identifier for a frame. The top-level frame is always 0;
/// anything else is the engine identifier narrowed to the host width.
#[must_use]
pub fn frame_id(is_main_frame: bool, frame_id: i64) -> i32 {
    if is_main_frame { 0 } else { frame_id as i32 }
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> f64;
}

#[derive(Debug, Default)]
pub struct SystemClock {
    last: Mutex<f64>,
}

impl Clock for SystemClock {
    fn now_millis(&self) -> f64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1_000.0)
            .unwrap_or(0.0);
        match self.last.lock() {
            Ok(mut last) => {
                if now > *last {
                    *last = now;
                }
                *last
            }
            Err(_) => now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedClock(pub f64);

impl Clock for FixedClock {
    fn now_millis(&self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventRecord {
    fields: Map<String, Value>,
}

impl EventRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn int(self, key: &str, value: i64) -> Self {
        self.field(key, Value::from(value))
    }

    #[must_use]
    pub fn double(self, key: &str, value: f64) -> Self {
        self.field(key, Value::from(value))
    }

    #[must_use]
    pub fn string(self, key: &str, value: impl Into<String>) -> Self {
        self.field(key, Value::String(value.into()))
    }

    #[must_use]
    pub fn strings<I, S>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = values
            .into_iter()
            .map(|v| Value::String(v.into()))
            .collect();
        self.field(key, Value::Array(list))
    }

    #[must_use]
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub topic: String,
    pub args: Vec<Value>,
    pub url: Option<Url>,
}

pub trait EventSink {
    fn dispatch(&self, event: Event);
}

pub fn dispatch_record(
    sink: &dyn EventSink,
    clock: &dyn Clock,
    topic: &str,
    record: EventRecord,
    url: Option<&Url>,
) {
    let record = record.double(TIME_STAMP_KEY, clock.now_millis());
    tracing::trace!(topic, url = url.map(Url::as_str), "dispatching event");
    sink.dispatch(Event {
        topic: topic.to_string(),
        args: vec![record.into_value()],
        url: url.cloned(),
    });
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    #[must_use]
    pub fn take(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn dispatch(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(0)]
    #[case(42)]
    #[case(i64::MAX)]
    #[case(i64::MIN)]
    fn main_frame_is_always_zero(#[case] internal: i64) {
        assert_eq!(frame_id(true, internal), 0);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(i64::from(i32::MAX), i32::MAX)]
    #[case((1_i64 << 32) + 5, 5)]
    #[case(i64::from(u32::MAX), -1)]
    #[case(-7, -7)]
    fn subframes_truncate_to_host_width(#[case] internal: i64, #[case] expected: i32) {
        assert_eq!(frame_id(false, internal), expected);
    }

    #[test]
    fn dispatch_stamps_time_and_keeps_fields() {
        let sink = RecordingSink::default();
        let url = Url::parse("https://example.com/a").unwrap();
        let record = EventRecord::new()
            .int("tabId", 3)
            .string("url", url.as_str())
            .strings("tags", ["a", "b"]);
        dispatch_record(&sink, &FixedClock(1234.5), "test.topic", record, Some(&url));

        let events = sink.take();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, "test.topic");
        assert_eq!(events[0].url.as_ref(), Some(&url));
        assert_eq!(
            events[0].args,
            vec![json!({
                "tabId": 3,
                "url": "https://example.com/a",
                "tags": ["a", "b"],
                "timeStamp": 1234.5,
            })]
        );
        assert!(sink.take().is_empty());
    }

    #[test]
    fn system_clock_never_goes_backwards() {
        let clock = SystemClock::default();
        let first = clock.now_millis();
        let second = clock.now_millis();
        assert!(first > 0.0);
        assert!(second >= first);
    }
}
