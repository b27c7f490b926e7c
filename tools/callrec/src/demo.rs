//! In-memory key/value store used to demonstrate the recorder.
//!
//! `Cache::store` is counted and recorded per instance: two caches never share
//! a history.

use crate::capture::CapturePolicy;
use crate::errors::CacheError;
use crate::logging::EventSink;
use crate::replay::counter::{counted, Counted};
use crate::replay::recorder::{recorder, Recorded};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

pub const STORE_NAME: &str = "Cache.store";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Data {
    /// Reads a command-line value, preferring integers, then floats.
    pub fn parse(raw: &str) -> Self {
        if let Ok(value) = raw.parse::<i64>() {
            return Data::Int(value);
        }
        if let Ok(value) = raw.parse::<f64>() {
            if value.is_finite() {
                return Data::Float(value);
            }
        }
        Data::Text(raw.to_string())
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Int(value) => write!(f, "{value}"),
            Data::Float(value) => write!(f, "{value}"),
            Data::Text(value) => f.write_str(value),
            Data::Bytes(value) => f.write_str(&String::from_utf8_lossy(value)),
        }
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::Text(value.to_string())
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::Text(value)
    }
}

impl From<i64> for Data {
    fn from(value: i64) -> Self {
        Data::Int(value)
    }
}

impl From<f64> for Data {
    fn from(value: f64) -> Self {
        Data::Float(value)
    }
}

impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Data::Bytes(value)
    }
}

type Entries = Arc<Mutex<HashMap<String, Data>>>;
pub type StoreFn = Box<dyn Fn((Data,)) -> Result<String, Infallible> + Send + Sync>;
pub type StoreRecorder = Recorded<StoreFn, (Data,), String, Infallible>;
pub type StoreCounter = Counted<StoreFn, (Data,), String, Infallible>;

pub struct Cache {
    entries: Entries,
    counter: Arc<StoreCounter>,
    store: StoreRecorder,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self::with_instrumentation(CapturePolicy::default(), None)
    }

    pub fn with_instrumentation(policy: CapturePolicy, sink: Option<Arc<dyn EventSink>>) -> Self {
        let entries: Entries = Arc::new(Mutex::new(HashMap::new()));

        let backing = Arc::clone(&entries);
        let insert: StoreFn = Box::new(move |(data,): (Data,)| {
            let key = Uuid::new_v4().to_string();
            lock(&backing).insert(key.clone(), data);
            Ok::<_, Infallible>(key)
        });

        let mut counter = counted(STORE_NAME, insert);
        if let Some(sink) = &sink {
            counter = counter.with_sink(Arc::clone(sink));
        }
        let counter = Arc::new(counter);

        let inner = Arc::clone(&counter);
        let counted_insert: StoreFn = Box::new(move |args: (Data,)| inner.call(args));
        let mut store = recorder(STORE_NAME, counted_insert).with_policy(policy);
        if let Some(sink) = sink {
            store = store.with_sink(sink);
        }

        Self {
            entries,
            counter,
            store,
        }
    }

    /// Saves `data` under a fresh UUID key and returns the key.
    pub fn store(&self, data: impl Into<Data>) -> String {
        self.store.invoke((data.into(),))
    }

    /// The recorded `store` wrapper, for `replay`.
    pub fn store_recorder(&self) -> &StoreRecorder {
        &self.store
    }

    pub fn store_counter(&self) -> &StoreCounter {
        &self.counter
    }

    pub fn get(&self, key: &str) -> Option<Data> {
        lock(&self.entries).get(key).cloned()
    }

    /// Reads `key` and converts the stored value with `convert`.
    pub fn get_with<T>(&self, key: &str, convert: impl FnOnce(Data) -> T) -> Option<T> {
        self.get(key).map(convert)
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get_with(key, |data| data.to_string())
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let Some(data) = self.get(key) else {
            return Ok(None);
        };
        let value = match &data {
            Data::Int(value) => Some(*value),
            Data::Text(text) => text.trim().parse().ok(),
            Data::Bytes(bytes) => std::str::from_utf8(bytes)
                .ok()
                .and_then(|text| text.trim().parse().ok()),
            Data::Float(_) => None,
        };
        value.map(Some).ok_or_else(|| CacheError::Conversion {
            key: key.to_string(),
            value: data.to_string(),
        })
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("entries", &lock(&self.entries).len())
            .field("store", &self.store)
            .field("counter", &self.counter)
            .finish()
    }
}

fn lock(entries: &Mutex<HashMap<String, Data>>) -> MutexGuard<'_, HashMap<String, Data>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::replayer::replay;
    use serde_json::json;

    #[test]
    fn store_then_get_round_trips_each_kind() {
        let cache = Cache::new();
        let text = cache.store("hello");
        let int = cache.store(42_i64);
        let bytes = cache.store(b"7".to_vec());

        assert_eq!(cache.get_str(&text), Some("hello".to_string()));
        assert_eq!(cache.get_int(&int), Ok(Some(42)));
        assert_eq!(cache.get_int(&bytes), Ok(Some(7)));
        assert_eq!(cache.get(&text), Some(Data::Text("hello".to_string())));
    }

    #[test]
    fn missing_keys_read_as_none() {
        let cache = Cache::new();
        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.get_str("nope"), None);
        assert_eq!(cache.get_int("nope"), Ok(None));
    }

    #[test]
    fn non_integer_values_fail_get_int() {
        let cache = Cache::new();
        let key = cache.store("forty-two");
        let err = cache.get_int(&key).expect_err("not an int");
        assert_eq!(
            err,
            CacheError::Conversion {
                key: key.clone(),
                value: "forty-two".to_string()
            }
        );
    }

    #[test]
    fn store_is_counted_and_recorded() {
        let cache = Cache::new();
        let first = cache.store("hello");
        let second = cache.store("world");

        assert_eq!(cache.store_counter().call_count(), 2);
        let rendered = replay(cache.store_recorder()).expect("replay");
        assert_eq!(rendered.name, STORE_NAME);
        assert_eq!(rendered.call_count, 2);
        assert_eq!(rendered.entries[0].args, vec![json!("hello")]);
        assert_eq!(rendered.entries[0].output, json!(first));
        assert_eq!(rendered.entries[1].args, vec![json!("world")]);
        assert_eq!(rendered.entries[1].output, json!(second));
    }

    #[test]
    fn caches_keep_separate_histories() {
        let a = Cache::new();
        let b = Cache::new();
        a.store("only in a");
        assert_eq!(a.store_recorder().call_count(), 1);
        assert_eq!(b.store_recorder().call_count(), 0);
        assert_eq!(b.store_counter().call_count(), 0);
    }

    #[test]
    fn data_parse_prefers_numbers() {
        assert_eq!(Data::parse("12"), Data::Int(12));
        assert_eq!(Data::parse("1.5"), Data::Float(1.5));
        assert_eq!(Data::parse("inf"), Data::Text("inf".to_string()));
        assert_eq!(Data::parse("hello"), Data::Text("hello".to_string()));
    }
}
