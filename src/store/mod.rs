//! Key/value and sorted-set storage used by the leaderboard.
//!
//! Everything the submission pipeline and the leaderboard queries persist goes
//! through the [`Store`] trait. Each call is atomic on its own; nothing here
//! offers multi-key transactions.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Sorted set holding every run id, scored by run score.
pub const GLOBAL_RANKING_KEY: &str = "leaderboard:global";

pub fn run_key(id: &str) -> String {
    format!("run:{}", id)
}

pub fn player_key(normalized_name: &str) -> String {
    format!("player:{}", normalized_name)
}

pub fn burst_key(client: &str) -> String {
    format!("ratelimit:burst:{}", client)
}

pub fn daily_key(client: &str) -> String {
    format!("ratelimit:daily:{}", client)
}

/// One sorted-set entry as returned by range queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub member: String,
    pub score: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("key {key} holds a value of the wrong kind")]
    WrongKind { key: String },
}

/// Storage primitives consumed by the ranking and rate limiting code.
///
/// Sorted sets order members by score descending, ties broken by member
/// descending. Ranges take inclusive 0-based `start`/`stop` positions. A key
/// whose expiry has passed behaves as if it never existed.
pub trait Store: Send + Sync {
    fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError>;

    /// Returns an empty map for a missing or expired key.
    fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    fn expire(&self, key: &str, seconds: u64) -> Result<(), StoreError>;

    /// Adds `member`, or updates its score if already present.
    fn sorted_set_insert(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError>;

    fn sorted_set_range_desc_with_scores(
        &self,
        key: &str,
        start: usize,
        stop: usize,
    ) -> Result<Vec<ScoredMember>, StoreError>;

    /// 0-based position of `member` in descending order.
    fn sorted_set_rev_rank(&self, key: &str, member: &str) -> Result<Option<u64>, StoreError>;

    fn sorted_set_cardinality(&self, key: &str) -> Result<u64, StoreError>;

    /// Increments a counter and returns the new value. A missing key starts at 0.
    fn increment(&self, key: &str) -> Result<i64, StoreError>;
}

#[cfg(test)]
pub(crate) mod contract {
    //! Behaviour every [`Store`] binding must share.

    use super::*;

    pub fn hash_roundtrip(store: &dyn Store) {
        store
            .hash_set("run:a", &[("name", "Bob".into()), ("score", "10".into())])
            .unwrap();
        let map = store.hash_get_all("run:a").unwrap();
        assert_eq!(map.get("name").map(String::as_str), Some("Bob"));
        assert_eq!(map.get("score").map(String::as_str), Some("10"));
        assert!(store.hash_get_all("run:missing").unwrap().is_empty());
    }

    pub fn sorted_set_ordering(store: &dyn Store) {
        store.sorted_set_insert("z", 10, "a").unwrap();
        store.sorted_set_insert("z", 30, "b").unwrap();
        store.sorted_set_insert("z", 20, "c").unwrap();
        store.sorted_set_insert("z", 20, "d").unwrap();

        let all = store.sorted_set_range_desc_with_scores("z", 0, 10).unwrap();
        let members: Vec<&str> = all.iter().map(|m| m.member.as_str()).collect();
        assert_eq!(members, vec!["b", "d", "c", "a"]);

        let head = store.sorted_set_range_desc_with_scores("z", 0, 1).unwrap();
        assert_eq!(head.len(), 2);
        assert_eq!(head[0], ScoredMember { member: "b".into(), score: 30 });

        assert_eq!(store.sorted_set_rev_rank("z", "b").unwrap(), Some(0));
        assert_eq!(store.sorted_set_rev_rank("z", "c").unwrap(), Some(2));
        assert_eq!(store.sorted_set_rev_rank("z", "nope").unwrap(), None);
        assert_eq!(store.sorted_set_cardinality("z").unwrap(), 4);
        assert_eq!(store.sorted_set_cardinality("empty").unwrap(), 0);

        // re-inserting moves the member instead of duplicating it
        store.sorted_set_insert("z", 5, "b").unwrap();
        assert_eq!(store.sorted_set_cardinality("z").unwrap(), 4);
        assert_eq!(store.sorted_set_rev_rank("z", "b").unwrap(), Some(3));

        assert!(store
            .sorted_set_range_desc_with_scores("z", 10, 20)
            .unwrap()
            .is_empty());
    }

    pub fn counters(store: &dyn Store) {
        assert_eq!(store.increment("c").unwrap(), 1);
        assert_eq!(store.increment("c").unwrap(), 2);
        assert_eq!(store.increment("other").unwrap(), 1);
    }
}
