use crate::error::AppError;
use crate::models::leaderboard::{LeaderboardEntry, LeaderboardResponse, PlayerBest};
use crate::models::run::RunRecord;
use crate::store::{self, Store, GLOBAL_RANKING_KEY};
use crate::validation::normalize_player;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;

/// Parses the `limit` query parameter. Missing, garbled or non-positive
/// values fall back to [`DEFAULT_LIMIT`]; large ones are capped.
pub fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map_or(DEFAULT_LIMIT, |n| (n as u64).min(MAX_LIMIT as u64) as usize)
}

fn load_run(store: &dyn Store, id: &str) -> Result<Option<RunRecord>, AppError> {
    let fields = store.hash_get_all(&store::run_key(id))?;
    let record = RunRecord::from_fields(&fields);
    if record.is_none() {
        log::warn!("ranking entry {} has no readable run record, skipping", id);
    }
    Ok(record)
}

/// Highest scoring runs, best first. Entries whose record is gone are
/// dropped and the remaining ones are numbered 1, 2, 3, ... without gaps.
pub fn top_entries(store: &dyn Store, limit: usize) -> Result<Vec<LeaderboardEntry>, AppError> {
    let limit = limit.min(MAX_LIMIT);
    if limit == 0 {
        return Ok(Vec::new());
    }
    let ranked = store.sorted_set_range_desc_with_scores(GLOBAL_RANKING_KEY, 0, limit - 1)?;

    let mut entries = Vec::with_capacity(ranked.len());
    for scored in ranked {
        if let Some(run) = load_run(store, &scored.member)? {
            entries.push(LeaderboardEntry {
                rank: entries.len() as u64 + 1,
                run,
            });
        }
    }
    Ok(entries)
}

/// The best run submitted under `name` (case and surrounding space ignored).
pub fn player_best(store: &dyn Store, name: &str) -> Result<Option<PlayerBest>, AppError> {
    let normalized = normalize_player(name);
    if normalized.is_empty() {
        return Ok(None);
    }
    let best = store.sorted_set_range_desc_with_scores(&store::player_key(&normalized), 0, 0)?;
    let Some(top) = best.into_iter().next() else {
        return Ok(None);
    };
    let Some(run) = load_run(store, &top.member)? else {
        return Ok(None);
    };
    let rank = store
        .sorted_set_rev_rank(GLOBAL_RANKING_KEY, &top.member)?
        .map(|r| r + 1);
    Ok(Some(PlayerBest { run, rank }))
}

pub fn total(store: &dyn Store) -> Result<u64, AppError> {
    Ok(store.sorted_set_cardinality(GLOBAL_RANKING_KEY)?)
}

pub fn get_leaderboard(
    store: &dyn Store,
    limit: usize,
    player: Option<&str>,
) -> Result<LeaderboardResponse, AppError> {
    let entries = top_entries(store, limit)?;
    let total = total(store)?;
    let player_best = match player {
        Some(name) => player_best(store, name)?,
        None => None,
    };
    Ok(LeaderboardResponse {
        entries,
        total,
        player_best,
    })
}
