//! Helpers for document values and store-assigned timestamps.
//!
//! Creation times that order user-visible lists (posts, chat previews) are
//! assigned by the store at write time, not by the client clock.  Writers
//! embed the sentinel `{".sv": "timestamp"}` and the backend replaces it
//! with epoch milliseconds when the write lands.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Key of the server-value sentinel object.
pub const SV_KEY: &str = ".sv";

/// Sentinel resolved by the backend to the write-time epoch milliseconds.
pub fn server_timestamp() -> Value {
    json!({ SV_KEY: "timestamp" })
}

/// True if `value` is the server-timestamp sentinel.
fn is_timestamp_sentinel(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|o| o.get(SV_KEY))
        .and_then(Value::as_str)
        == Some("timestamp")
}

/// Replace every server-value sentinel in `value` with `now` millis.
///
/// Backends that resolve server values locally (the in-memory backend)
/// call this on every written payload; the REST backend leaves resolution
/// to the remote store.
pub fn resolve_server_values(value: &mut Value, now: DateTime<Utc>) {
    if is_timestamp_sentinel(value) {
        *value = Value::from(now.timestamp_millis());
        return;
    }
    match value {
        Value::Object(map) => {
            for v in map.values_mut() {
                resolve_server_values(v, now);
            }
        }
        Value::Array(items) => {
            for v in items.iter_mut() {
                resolve_server_values(v, now);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn resolves_nested_sentinels() {
        let mut doc = json!({
            "date": server_timestamp(),
            "items": [ { "at": server_timestamp() }, { "at": 42 } ],
        });
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        resolve_server_values(&mut doc, now);

        let expected = now.timestamp_millis();
        assert_eq!(doc["date"], Value::from(expected));
        assert_eq!(doc["items"][0]["at"], Value::from(expected));
        assert_eq!(doc["items"][1]["at"], Value::from(42));
    }

    #[test]
    fn leaves_plain_objects_alone() {
        let mut doc = json!({ "sv": "timestamp", "x": 1 });
        resolve_server_values(&mut doc, Utc::now());
        assert_eq!(doc["sv"], Value::from("timestamp"));
    }
}
