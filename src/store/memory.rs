use super::{ScoredMember, Store, StoreError};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

enum Value {
    Hash(HashMap<String, String>),
    Sorted(HashMap<String, i64>),
    Counter(i64),
}

struct Entry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

/// Minimum time between full sweeps of expired keys.
const SWEEP_INTERVAL_SECS: i64 = 60;

struct Inner {
    entries: HashMap<String, Entry>,
    clock_offset: Duration,
    last_sweep: DateTime<Utc>,
}

impl Default for Inner {
    fn default() -> Self {
        Inner {
            entries: HashMap::new(),
            clock_offset: Duration::zero(),
            last_sweep: Utc::now(),
        }
    }
}

impl Inner {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }

    /// Drops every expired key, at most once per [`SWEEP_INTERVAL_SECS`].
    fn sweep_if_due(&mut self) {
        let now = self.now();
        if now - self.last_sweep < Duration::seconds(SWEEP_INTERVAL_SECS) {
            return;
        }
        self.entries
            .retain(|_, entry| entry.expires_at.map_or(true, |at| at > now));
        self.last_sweep = now;
    }

    /// Drops `key` if its expiry has passed, then returns what is left.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        let now = self.now();
        let expired = matches!(
            self.entries.get(key),
            Some(Entry { expires_at: Some(at), .. }) if *at <= now
        );
        if expired {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn sorted(&mut self, key: &str) -> Result<Option<&HashMap<String, i64>>, StoreError> {
        match self.live(key) {
            None => Ok(None),
            Some(Entry { value: Value::Sorted(set), .. }) => Ok(Some(&*set)),
            Some(_) => Err(StoreError::WrongKind { key: key.to_string() }),
        }
    }
}

/// Process-local store with the same semantics as [`super::SqliteStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves this store's notion of "now" forward, expiring keys as it goes.
    #[cfg(test)]
    pub fn advance_clock(&self, by: Duration) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.clock_offset = inner.clock_offset + by;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        let mut inner = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        inner.sweep_if_due();
        Ok(inner)
    }
}

fn descending(set: &HashMap<String, i64>) -> Vec<ScoredMember> {
    let mut members: Vec<ScoredMember> = set
        .iter()
        .map(|(member, score)| ScoredMember {
            member: member.clone(),
            score: *score,
        })
        .collect();
    members.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| b.member.cmp(&a.member)));
    members
}

impl Store for MemoryStore {
    fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.live(key).is_none() {
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match inner.entries.get_mut(key) {
            Some(Entry { value: Value::Hash(map), .. }) => {
                for (field, value) in fields {
                    map.insert((*field).to_string(), value.clone());
                }
                Ok(())
            }
            _ => Err(StoreError::WrongKind { key: key.to_string() }),
        }
    }

    fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut inner = self.lock()?;
        match inner.live(key) {
            None => Ok(HashMap::new()),
            Some(Entry { value: Value::Hash(map), .. }) => Ok(map.clone()),
            Some(_) => Err(StoreError::WrongKind { key: key.to_string() }),
        }
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let now = inner.now();
        let at = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if let Some(entry) = inner.live(key) {
            entry.expires_at = Some(at);
        }
        Ok(())
    }

    fn sorted_set_insert(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.live(key).is_none() {
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Sorted(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match inner.entries.get_mut(key) {
            Some(Entry { value: Value::Sorted(set), .. }) => {
                set.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(StoreError::WrongKind { key: key.to_string() }),
        }
    }

    fn sorted_set_range_desc_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        let mut inner = self.lock()?;
        let Some(set) = inner.sorted(key)? else {
            return Ok(Vec::new());
        };
        if stop < start {
            return Ok(Vec::new());
        }
        Ok(descending(set)
            .into_iter()
            .skip(start)
            .take(stop - start + 1)
            .collect())
    }

    fn sorted_set_rev_rank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
        let mut inner = self.lock()?;
        let Some(set) = inner.sorted(key)? else {
            return Ok(None);
        };
        Ok(descending(set)
            .iter()
            .position(|m| m.member == member)
            .map(|pos| pos as u64))
    }

    fn sorted_set_cardinality(&self, key: &str) -> Result<u64, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.sorted(key)?.map_or(0, |set| set.len() as u64))
    }

    fn increment(&self, key: &str) -> Result<i64, StoreError> {
        let mut inner = self.lock()?;
        if inner.live(key).is_none() {
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Counter(0),
                    expires_at: None,
                },
            );
        }
        match inner.entries.get_mut(key) {
            Some(Entry { value: Value::Counter(n), .. }) => {
                *n += 1;
                Ok(*n)
            }
            _ => Err(StoreError::WrongKind { key: key.to_string() }),
        }
    }
}
