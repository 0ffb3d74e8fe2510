//! Two-tier cache: a process-local map in
//! front of a durable key-value store.
//!
//! Durable entries are JSON envelopes
//! `{"fetchedAt": <epoch millis>, "data": T}`.
//! Every failure of the durable tier
//! degrades to a miss; nothing here returns
//! an error to the caller.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  error,
  warn
};

use crate::clock::Clock;
use crate::store::KeyValueStore;

/// Maps a typed cache key onto the durable
/// store's string key scheme.
pub trait CacheKey:
  Clone + Eq + Hash + Debug + Send + Sync
{
  fn storage_key(&self) -> String;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<V> {
  #[serde(alias = "timestamp")]
  fetched_at: i64,
  data:       V
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a, V> {
  fetched_at: i64,
  data:       &'a V
}

pub struct Cache<K, V> {
  name:       &'static str,
  ttl_millis: i64,
  memory:     Mutex<HashMap<K, V>>,
  store:      Arc<dyn KeyValueStore>,
  clock:      Arc<dyn Clock>,
  _key:       PhantomData<fn(K)>
}

impl<K, V> Cache<K, V>
where
  K: CacheKey,
  V: Clone + Serialize + DeserializeOwned
{
  pub fn new(
    name: &'static str,
    ttl_millis: i64,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>
  ) -> Self {
    Self {
      name,
      ttl_millis,
      memory: Mutex::new(HashMap::new()),
      store,
      clock,
      _key: PhantomData
    }
  }

  /// Lookup with this cache's own TTL.
  pub fn get(&self, key: &K) -> Option<V> {
    self.get_within(key, self.ttl_millis)
  }

  /// Memory first (no TTL re-check), then
  /// the durable tier. Stale or corrupt
  /// durable entries are deleted.
  pub fn get_within(
    &self,
    key: &K,
    ttl_millis: i64
  ) -> Option<V> {
    if let Some(value) =
      self.memory.lock().get(key).cloned()
    {
      debug!(cache = self.name, ?key, "cache hit (memory)");
      return Some(value);
    }

    let storage_key = key.storage_key();
    let raw = match self
      .store
      .get(&storage_key)
    {
      | Ok(Some(raw)) => raw,
      | Ok(None) => {
        debug!(cache = self.name, key = %storage_key, "cache miss");
        return None;
      }
      | Err(err) => {
        error!(
          cache = self.name,
          key = %storage_key,
          error = %err,
          "durable store read failed"
        );
        return None;
      }
    };

    let envelope = match serde_json::from_str::<
      Envelope<V>
    >(&raw)
    {
      | Ok(envelope) => envelope,
      | Err(err) => {
        warn!(
          cache = self.name,
          key = %storage_key,
          error = %err,
          "corrupt cache entry; discarding"
        );
        self.remove_durable(&storage_key);
        return None;
      }
    };

    let age = self
      .clock
      .now_millis()
      .saturating_sub(envelope.fetched_at);
    if age >= ttl_millis {
      debug!(
        cache = self.name,
        key = %storage_key,
        age_ms = age,
        ttl_ms = ttl_millis,
        "cache entry expired"
      );
      self.remove_durable(&storage_key);
      return None;
    }

    debug!(cache = self.name, key = %storage_key, "cache hit (storage)");
    self.memory.lock().insert(
      key.clone(),
      envelope.data.clone()
    );
    Some(envelope.data)
  }

  /// Writes both tiers. The memory write
  /// always lands; a durable failure is
  /// logged and dropped.
  pub fn put(&self, key: &K, value: V) {
    let storage_key = key.storage_key();
    let envelope = EnvelopeRef {
      fetched_at: self.clock.now_millis(),
      data:       &value
    };

    match serde_json::to_string(&envelope)
    {
      | Ok(json) => {
        if let Err(err) = self
          .store
          .set(&storage_key, &json)
        {
          error!(
            cache = self.name,
            key = %storage_key,
            error = %err,
            "durable store write failed"
          );
        }
      }
      | Err(err) => {
        error!(
          cache = self.name,
          key = %storage_key,
          error = %err,
          "failed serializing cache entry"
        );
      }
    }

    self
      .memory
      .lock()
      .insert(key.clone(), value);
  }

  pub fn invalidate(&self, key: &K) {
    self.memory.lock().remove(key);
    self.remove_durable(&key.storage_key());
  }

  /// Drops the memory tier only, as a fresh
  /// process would see the cache.
  pub fn forget_memory(&self) {
    self.memory.lock().clear();
  }

  fn remove_durable(
    &self,
    storage_key: &str
  ) {
    if let Err(err) =
      self.store.remove(storage_key)
    {
      error!(
        cache = self.name,
        key = %storage_key,
        error = %err,
        "durable store remove failed"
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use anyhow::anyhow;

  use super::*;
  use crate::clock::FixedClock;
  use crate::store::MemoryStore;

  const NOW: i64 = 1_700_000_000_000;
  const TTL: i64 = 86_400_000;

  #[derive(
    Debug, Clone, PartialEq, Eq, Hash,
  )]
  struct TestKey(&'static str);

  impl CacheKey for TestKey {
    fn storage_key(&self) -> String {
      format!("test-{}", self.0)
    }
  }

  struct FailingStore;

  impl KeyValueStore for FailingStore {
    fn get(
      &self,
      _key: &str
    ) -> anyhow::Result<Option<String>>
    {
      Err(anyhow!("quota exceeded"))
    }

    fn set(
      &self,
      _key: &str,
      _value: &str
    ) -> anyhow::Result<()> {
      Err(anyhow!("quota exceeded"))
    }

    fn remove(
      &self,
      _key: &str
    ) -> anyhow::Result<()> {
      Err(anyhow!("quota exceeded"))
    }
  }

  fn cache_with(
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>
  ) -> Cache<TestKey, Vec<String>> {
    Cache::new("test", TTL, store, clock)
  }

  fn stored(
    fetched_at: i64,
    data: &str
  ) -> String {
    format!(
      r#"{{"fetchedAt":{fetched_at},"data":{data}}}"#
    )
  }

  #[test]
  fn put_then_get_returns_value() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache =
      cache_with(store.clone(), clock);

    let value = vec![
      "a".to_string(),
      "b".to_string(),
    ];
    cache.put(&TestKey("x"), value.clone());
    assert_eq!(
      cache.get(&TestKey("x")),
      Some(value)
    );
    assert!(
      store
        .get("test-x")
        .expect("store read")
        .is_some()
    );
  }

  #[test]
  fn durable_entry_is_promoted_to_memory() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache =
      cache_with(store.clone(), clock);

    store
      .set("test-x", &stored(NOW - 10, r#"["v"]"#))
      .expect("seed");
    assert_eq!(
      cache.get(&TestKey("x")),
      Some(vec!["v".to_string()])
    );

    // memory tier now answers without the
    // durable entry
    store.remove("test-x").expect("remove");
    assert_eq!(
      cache.get(&TestKey("x")),
      Some(vec!["v".to_string()])
    );
  }

  #[test]
  fn expiry_boundary() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache =
      cache_with(store.clone(), clock);

    store
      .set(
        "test-old",
        &stored(NOW - TTL - 1, "[]")
      )
      .expect("seed");
    store
      .set(
        "test-fresh",
        &stored(NOW - TTL + 1, "[]")
      )
      .expect("seed");

    assert_eq!(cache.get(&TestKey("old")), None);
    assert!(
      store
        .get("test-old")
        .expect("store read")
        .is_none()
    );
    assert_eq!(
      cache.get(&TestKey("fresh")),
      Some(vec![])
    );
  }

  #[test]
  fn age_equal_to_ttl_is_a_miss() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache = cache_with(store.clone(), clock);

    store
      .set("test-edge", &stored(NOW - TTL, "[]"))
      .expect("seed");
    assert_eq!(cache.get(&TestKey("edge")), None);
  }

  #[test]
  fn corrupt_entry_is_deleted() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache =
      cache_with(store.clone(), clock);

    store
      .set("test-bad", "{not json")
      .expect("seed");
    assert_eq!(cache.get(&TestKey("bad")), None);
    assert!(
      store
        .get("test-bad")
        .expect("store read")
        .is_none()
    );
  }

  #[test]
  fn legacy_timestamp_field_is_accepted() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache =
      cache_with(store.clone(), clock);

    store
      .set(
        "test-legacy",
        &format!(
          r#"{{"timestamp":{},"data":["x"]}}"#,
          NOW - 5
        )
      )
      .expect("seed");
    assert_eq!(
      cache.get(&TestKey("legacy")),
      Some(vec!["x".to_string()])
    );
  }

  #[test]
  fn invalidate_clears_both_tiers() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache =
      cache_with(store.clone(), clock);

    cache.put(&TestKey("x"), vec![]);
    cache.invalidate(&TestKey("x"));
    assert_eq!(cache.get(&TestKey("x")), None);
    assert!(store.is_empty());
  }

  #[test]
  fn failing_store_degrades_to_memory_only() {
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache: Cache<TestKey, Vec<String>> =
      Cache::new(
        "test",
        TTL,
        Arc::new(FailingStore),
        clock
      );

    assert_eq!(cache.get(&TestKey("x")), None);
    cache.put(
      &TestKey("x"),
      vec!["kept".to_string()]
    );
    assert_eq!(
      cache.get(&TestKey("x")),
      Some(vec!["kept".to_string()])
    );
    cache.invalidate(&TestKey("x"));
    assert_eq!(cache.get(&TestKey("x")), None);
  }

  #[test]
  fn memory_tier_does_not_recheck_ttl() {
    let store = Arc::new(MemoryStore::new());
    let clock =
      Arc::new(FixedClock::new(NOW));
    let cache = cache_with(
      store.clone(),
      clock.clone()
    );

    cache.put(&TestKey("x"), vec![]);
    clock.advance(TTL * 2);
    assert_eq!(
      cache.get(&TestKey("x")),
      Some(vec![])
    );

    cache.forget_memory();
    assert_eq!(cache.get(&TestKey("x")), None);
  }
}
