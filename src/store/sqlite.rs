use super::{ScoredMember, Store, StoreError};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

const SCHEMA: &str = include_str!("schema.sql");

const KIND_HASH: &str = "hash";
const KIND_SORTED: &str = "zset";
const KIND_COUNTER: &str = "counter";

/// Minimum time between full sweeps of expired keys.
const SWEEP_INTERVAL_MS: i64 = 60_000;

/// SQLite-backed [`Store`]. A single connection behind a mutex keeps every
/// call atomic with respect to the others.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    /// Unix millis of the last sweep; only touched while `conn` is locked.
    last_sweep: AtomicI64,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            last_sweep: AtomicI64::new(0),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
            last_sweep: AtomicI64::new(0),
        })
    }

    /// Runs `f` inside a transaction after evicting `key` if it has expired.
    /// Every [`SWEEP_INTERVAL_MS`] the whole keyspace is swept first.
    fn with_key<F, T>(&self, key: &str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;
        let now = now_millis();
        if now - self.last_sweep.load(Ordering::Relaxed) >= SWEEP_INTERVAL_MS {
            let swept = sweep_expired(&tx, now)?;
            if swept > 0 {
                log::debug!("swept {} expired keys", swept);
            }
            self.last_sweep.store(now, Ordering::Relaxed);
        }
        evict_if_expired(&tx, key)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn evict_if_expired(conn: &Connection, key: &str) -> Result<(), StoreError> {
    let expires_at: Option<Option<i64>> = conn
        .query_row(
            "SELECT expires_at FROM store_keys WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(Some(at)) = expires_at {
        if at <= now_millis() {
            conn.execute("DELETE FROM hash_fields WHERE key = ?1", params![key])?;
            conn.execute("DELETE FROM sorted_members WHERE key = ?1", params![key])?;
            conn.execute("DELETE FROM counters WHERE key = ?1", params![key])?;
            conn.execute("DELETE FROM store_keys WHERE key = ?1", params![key])?;
        }
    }
    Ok(())
}

/// Deletes every key whose expiry has passed. Returns how many went.
fn sweep_expired(conn: &Connection, now: i64) -> Result<usize, StoreError> {
    const EXPIRED: &str =
        "SELECT key FROM store_keys WHERE expires_at IS NOT NULL AND expires_at <= ?1";
    for table in ["hash_fields", "sorted_members", "counters"] {
        conn.execute(
            &format!("DELETE FROM {} WHERE key IN ({})", table, EXPIRED),
            params![now],
        )?;
    }
    Ok(conn.execute(
        "DELETE FROM store_keys WHERE expires_at IS NOT NULL AND expires_at <= ?1",
        params![now],
    )?)
}

fn kind_of(conn: &Connection, key: &str) -> Result<Option<String>, StoreError> {
    Ok(conn
        .query_row(
            "SELECT kind FROM store_keys WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

/// Fails if `key` holds another kind of value; registers it when absent.
fn claim_kind(conn: &Connection, key: &str, kind: &str) -> Result<(), StoreError> {
    match kind_of(conn, key)? {
        Some(existing) if existing == kind => Ok(()),
        Some(_) => Err(StoreError::WrongKind { key: key.to_string() }),
        None => {
            conn.execute(
                "INSERT INTO store_keys (key, kind, expires_at) VALUES (?1, ?2, NULL)",
                params![key, kind],
            )?;
            Ok(())
        }
    }
}

/// Like [`claim_kind`] but for reads: `false` means the key does not exist.
fn has_kind(conn: &Connection, key: &str, kind: &str) -> Result<bool, StoreError> {
    match kind_of(conn, key)? {
        Some(existing) if existing == kind => Ok(true),
        Some(_) => Err(StoreError::WrongKind { key: key.to_string() }),
        None => Ok(false),
    }
}

impl Store for SqliteStore {
    fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        self.with_key(key, |tx| {
            claim_kind(tx, key, KIND_HASH)?;
            let mut stmt = tx.prepare(
                "INSERT INTO hash_fields (key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
            )?;
            for (field, value) in fields {
                stmt.execute(params![key, field, value])?;
            }
            Ok(())
        })
    }

    fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.with_key(key, |tx| {
            if !has_kind(tx, key, KIND_HASH)? {
                return Ok(HashMap::new());
            }
            let mut stmt = tx.prepare("SELECT field, value FROM hash_fields WHERE key = ?1")?;
            let rows = stmt.query_map(params![key], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            let mut map = HashMap::new();
            for row in rows {
                let (field, value) = row?;
                map.insert(field, value);
            }
            Ok(map)
        })
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError> {
        let ttl_ms = i64::try_from(seconds).unwrap_or(i64::MAX).saturating_mul(1000);
        let at = now_millis().saturating_add(ttl_ms);
        self.with_key(key, |tx| {
            tx.execute(
                "UPDATE store_keys SET expires_at = ?2 WHERE key = ?1",
                params![key, at],
            )?;
            Ok(())
        })
    }

    fn sorted_set_insert(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError> {
        self.with_key(key, |tx| {
            claim_kind(tx, key, KIND_SORTED)?;
            tx.execute(
                "INSERT INTO sorted_members (key, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, member) DO UPDATE SET score = excluded.score",
                params![key, member, score],
            )?;
            Ok(())
        })
    }

    fn sorted_set_range_desc_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        if stop < start {
            return Ok(Vec::new());
        }
        self.with_key(key, |tx| {
            if !has_kind(tx, key, KIND_SORTED)? {
                return Ok(Vec::new());
            }
            let mut stmt = tx.prepare(
                "SELECT member, score FROM sorted_members WHERE key = ?1
                 ORDER BY score DESC, member DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(
                params![key, (stop - start + 1) as i64, start as i64],
                |row| {
                    Ok(ScoredMember {
                        member: row.get(0)?,
                        score: row.get(1)?,
                    })
                },
            )?;
            let mut members = Vec::new();
            for row in rows {
                members.push(row?);
            }
            Ok(members)
        })
    }

    fn sorted_set_rev_rank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError> {
        self.with_key(key, |tx| {
            if !has_kind(tx, key, KIND_SORTED)? {
                return Ok(None);
            }
            let score: Option<i64> = tx
                .query_row(
                    "SELECT score FROM sorted_members WHERE key = ?1 AND member = ?2",
                    params![key, member],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(score) = score else {
                return Ok(None);
            };
            let ahead: i64 = tx.query_row(
                "SELECT COUNT(*) FROM sorted_members
                 WHERE key = ?1 AND (score > ?2 OR (score = ?2 AND member > ?3))",
                params![key, score, member],
                |row| row.get(0),
            )?;
            Ok(Some(ahead as u64))
        })
    }

    fn sorted_set_cardinality(&self, key: &str) -> Result<u64, StoreError> {
        self.with_key(key, |tx| {
            if !has_kind(tx, key, KIND_SORTED)? {
                return Ok(0);
            }
            let count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM sorted_members WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    fn increment(&self, key: &str) -> Result<i64, StoreError> {
        self.with_key(key, |tx| {
            claim_kind(tx, key, KIND_COUNTER)?;
            let value: i64 = tx.query_row(
                "INSERT INTO counters (key, value) VALUES (?1, 1)
                 ON CONFLICT(key) DO UPDATE SET value = value + 1
                 RETURNING value",
                params![key],
                |row| row.get(0),
            )?;
            Ok(value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_schema_created() {
        let store = SqliteStore::open_in_memory().expect("Failed to open in-memory store");
        let conn = store.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='sorted_members'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_contract() {
        contract::hash_roundtrip(&SqliteStore::open_in_memory().unwrap());
        contract::sorted_set_ordering(&SqliteStore::open_in_memory().unwrap());
        contract::counters(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_zero_expiry_evicts_on_next_access() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.increment("c").unwrap();
        store.increment("c").unwrap();
        store.expire("c", 0).unwrap();
        assert_eq!(store.increment("c").unwrap(), 1);

        store.sorted_set_insert("z", 1, "a").unwrap();
        store.expire("z", 0).unwrap();
        assert_eq!(store.sorted_set_cardinality("z").unwrap(), 0);
        assert_eq!(store.sorted_set_rev_rank("z", "a").unwrap(), None);
    }

    #[test]
    fn test_unexpired_keys_survive() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.hash_set("h", &[("a", "1".into())]).unwrap();
        store.expire("h", 3600).unwrap();
        assert_eq!(store.hash_get_all("h").unwrap().len(), 1);
    }

    fn row_count(store: &SqliteStore, table: &str) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_expired_keys_are_swept_without_being_touched() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..200 {
            let key = format!("ratelimit:daily:10.0.0.{}", i);
            store.increment(&key).unwrap();
            store.expire(&key, 0).unwrap();
        }
        store.hash_set("run:gone", &[("a", "1".into())]).unwrap();
        store.expire("run:gone", 0).unwrap();
        store.hash_set("run:kept", &[("a", "1".into())]).unwrap();
        assert_eq!(row_count(&store, "store_keys"), 202);

        // pretend the last sweep was long ago
        store.last_sweep.store(0, Ordering::Relaxed);
        store.increment("unrelated").unwrap();

        assert_eq!(row_count(&store, "store_keys"), 2);
        assert_eq!(row_count(&store, "counters"), 1);
        assert_eq!(row_count(&store, "hash_fields"), 1);
    }

    #[test]
    fn test_huge_expiry_keeps_the_key() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.increment("c").unwrap();
        store.expire("c", u64::MAX).unwrap();
        assert_eq!(store.increment("c").unwrap(), 2);
    }

    #[test]
    fn test_wrong_kind_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.hash_set("k", &[("a", "1".into())]).unwrap();
        assert!(matches!(store.increment("k"), Err(StoreError::WrongKind { .. })));
    }
}
