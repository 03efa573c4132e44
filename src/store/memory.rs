//! In-Memory Store
//!
//! Single-process implementation of the store command set: strings with
//! expiry, sorted sets and key expiry. Backs the embedded store and the
//! `/store` endpoint, and doubles as the stub store in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{Command, RemoteStore};
use crate::clock::{system_clock, SharedClock};
use crate::error::StoreError;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

// == Stored Value ==
#[derive(Debug, Clone)]
enum Data {
    Text(String),
    /// member -> score
    Sorted(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct StoredValue {
    data: Data,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    expires_at: Option<i64>,
}

impl StoredValue {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }
}

// == Memory Remote Store ==
/// Process-local stand-in for the shared store.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    clock: SharedClock,
    /// Names of executed commands, for tests asserting store traffic
    commands: Mutex<Vec<String>>,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            commands: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, StoredValue>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names of the commands executed so far, oldest first.
    pub fn command_log(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // == Length ==
    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now_ms();
        self.entries()
            .values()
            .filter(|value| !value.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Cleanup Expired ==
    /// Removes all expired keys. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, value| !value.is_expired(now));
        before - entries.len()
    }

    // == Apply ==
    /// Executes one command synchronously.
    pub fn apply(&self, command: &Command) -> Result<Value, StoreError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.name().to_string());

        let now = self.clock.now_ms();
        let mut entries = self.entries();

        // Lazy expiry, same as a GET on an expired key
        if entries
            .get(command.key())
            .is_some_and(|value| value.is_expired(now))
        {
            entries.remove(command.key());
        }

        match command {
            Command::Get { key } => match entries.get(key) {
                None => Ok(Value::Null),
                Some(StoredValue {
                    data: Data::Text(text),
                    ..
                }) => Ok(Value::String(text.clone())),
                Some(_) => Err(StoreError::Command(WRONGTYPE.to_string())),
            },

            Command::Set {
                key,
                value,
                ttl_seconds,
            } => {
                let expires_at = ttl_seconds.map(|ttl| expiry_after(now, ttl));
                entries.insert(
                    key.clone(),
                    StoredValue {
                        data: Data::Text(value.clone()),
                        expires_at,
                    },
                );
                Ok(json!("OK"))
            }

            Command::Del { key } => Ok(json!(entries.remove(key).map_or(0, |_| 1))),

            Command::ZAdd { key, score, member } => {
                let stored = entries.entry(key.clone()).or_insert_with(|| StoredValue {
                    data: Data::Sorted(HashMap::new()),
                    expires_at: None,
                });
                let Data::Sorted(set) = &mut stored.data else {
                    return Err(StoreError::Command(WRONGTYPE.to_string()));
                };
                let added = set.insert(member.clone(), *score).is_none();
                Ok(json!(if added { 1 } else { 0 }))
            }

            Command::ZCard { key } => match entries.get(key) {
                None => Ok(json!(0)),
                Some(StoredValue {
                    data: Data::Sorted(set),
                    ..
                }) => Ok(json!(set.len())),
                Some(_) => Err(StoreError::Command(WRONGTYPE.to_string())),
            },

            Command::ZRange {
                key,
                start,
                stop,
                with_scores,
            } => {
                let set = match entries.get(key) {
                    None => return Ok(json!([])),
                    Some(StoredValue {
                        data: Data::Sorted(set),
                        ..
                    }) => set,
                    Some(_) => return Err(StoreError::Command(WRONGTYPE.to_string())),
                };

                let ranked = ranked(set);
                let Some((from, to)) = resolve_range(*start, *stop, ranked.len()) else {
                    return Ok(json!([]));
                };

                let mut reply = Vec::new();
                for (member, score) in &ranked[from..=to] {
                    reply.push(Value::String((*member).clone()));
                    if *with_scores {
                        reply.push(Value::String(score.to_string()));
                    }
                }
                Ok(Value::Array(reply))
            }

            Command::ZRemRangeByScore { key, min, max } => {
                let Some(stored) = entries.get_mut(key) else {
                    return Ok(json!(0));
                };
                let Data::Sorted(set) = &mut stored.data else {
                    return Err(StoreError::Command(WRONGTYPE.to_string()));
                };

                let before = set.len();
                set.retain(|_, score| *score < *min || *score > *max);
                let removed = before - set.len();

                if set.is_empty() {
                    entries.remove(key);
                }
                debug!(key = %key, removed, "ZREMRANGEBYSCORE");
                Ok(json!(removed))
            }

            Command::Expire { key, seconds } => match entries.get_mut(key) {
                None => Ok(json!(0)),
                Some(stored) => {
                    stored.expires_at = Some(expiry_after(now, *seconds));
                    Ok(json!(1))
                }
            },
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn execute(&self, command: Command) -> Result<Value, StoreError> {
        self.apply(&command)
    }
}

/// Absolute expiry `seconds` after `now`, clamped to `i64::MAX`.
fn expiry_after(now: i64, seconds: u64) -> i64 {
    let ms = i64::try_from(seconds).unwrap_or(i64::MAX).saturating_mul(1000);
    now.saturating_add(ms)
}

/// Members ordered by score, ties broken lexicographically.
fn ranked(set: &HashMap<String, f64>) -> Vec<(&String, f64)> {
    let mut ranked: Vec<(&String, f64)> = set.iter().map(|(m, s)| (m, *s)).collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

/// Converts possibly negative rank bounds into an inclusive index range.
fn resolve_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    let normalize = |index: i64| if index < 0 { len + index } else { index };

    let start = normalize(start).max(0);
    let stop = normalize(stop).min(len - 1);

    if len == 0 || start > stop {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_at(start: i64) -> (MemoryRemoteStore, ManualClock) {
        let clock = ManualClock::new(start);
        (MemoryRemoteStore::with_clock(clock.shared()), clock)
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (store, _) = store_at(0);
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_with_ttl_expires() {
        let (store, clock) = store_at(10_000);

        store.set("k", "v", Some(2)).await.unwrap();
        clock.advance(1_999);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        clock.advance(1);
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_without_ttl_persists() {
        let (store, clock) = store_at(0);

        store.set("k", "v", None).await.unwrap();
        clock.advance(i64::from(u32::MAX));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.del("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sorted_set_operations() {
        let (store, _) = store_at(0);

        store.zadd("z", 30.0, "c").await.unwrap();
        store.zadd("z", 10.0, "a").await.unwrap();
        store.zadd("z", 20.0, "b").await.unwrap();
        assert_eq!(store.zcard("z").await.unwrap(), 3);

        let oldest = store.zrange("z", 0, 0, true).await.unwrap();
        assert_eq!(oldest.len(), 1);
        assert_eq!(oldest[0].member, "a");
        assert_eq!(oldest[0].score, Some(10.0));

        let all = store.zrange("z", 0, -1, false).await.unwrap();
        let names: Vec<_> = all.iter().map(|m| m.member.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        store.zrem_range_by_score("z", 0.0, 20.0).await.unwrap();
        assert_eq!(store.zcard("z").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zrange_on_missing_key_is_empty() {
        let (store, _) = store_at(0);
        assert!(store.zrange("z", 0, 0, true).await.unwrap().is_empty());
        assert_eq!(store.zcard("z").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expire_on_sorted_set() {
        let (store, clock) = store_at(0);

        store.zadd("z", 1.0, "a").await.unwrap();
        store.expire("z", 61).await.unwrap();

        clock.advance(60_999);
        assert_eq!(store.zcard("z").await.unwrap(), 1);
        clock.advance(1);
        assert_eq!(store.zcard("z").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_is_command_error() {
        let (store, _) = store_at(0);

        store.set("k", "v", None).await.unwrap();
        let result = store.zadd("k", 1.0, "m").await;
        assert!(matches!(result, Err(StoreError::Command(_))));
    }

    #[test]
    fn test_cleanup_expired() {
        let (store, clock) = store_at(0);

        store
            .apply(&Command::Set {
                key: "short".into(),
                value: "1".into(),
                ttl_seconds: Some(1),
            })
            .unwrap();
        store
            .apply(&Command::Set {
                key: "long".into(),
                value: "1".into(),
                ttl_seconds: Some(100),
            })
            .unwrap();

        clock.advance(1_500);
        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_expire_immediately() {
        let (store, clock) = store_at(1_700_000_000_000);

        store.set("k", "v", Some(u64::MAX)).await.unwrap();
        store.zadd("z", 1.0, "a").await.unwrap();
        store.expire("z", u64::MAX).await.unwrap();

        clock.advance(i64::from(u32::MAX));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.zcard("z").await.unwrap(), 1);
    }

    #[test]
    fn test_expiry_after_saturates() {
        assert_eq!(expiry_after(1_000, 2), 3_000);
        assert_eq!(expiry_after(1_000, u64::MAX), i64::MAX);
        assert_eq!(expiry_after(1_000, (i64::MAX / 1000) as u64), i64::MAX);
    }

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(0, 0, 3), Some((0, 0)));
        assert_eq!(resolve_range(0, -1, 3), Some((0, 2)));
        assert_eq!(resolve_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(resolve_range(5, 10, 3), None);
        assert_eq!(resolve_range(0, 0, 0), None);
    }
}
