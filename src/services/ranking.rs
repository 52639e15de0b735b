use crate::config::Config;
use crate::error::AppError;
use crate::models::run::{RunRecord, RunSubmissionResult, ValidatedRun};
use crate::store::{self, Store, GLOBAL_RANKING_KEY};
use crate::validation::normalize_player;
use chrono::Utc;
use uuid::Uuid;

/// Persists a scored run and places it in the global and per-player rankings.
///
/// The record is written before either ranking insert, so a reader can only
/// ever see a ranking entry whose record is missing, never the reverse.
pub fn record_run(
    store: &dyn Store,
    run: ValidatedRun,
    score: i64,
    config: &Config,
) -> Result<RunSubmissionResult, AppError> {
    let record = RunRecord {
        id: Uuid::new_v4().to_string(),
        score,
        floor: run.floor,
        kills: run.kills,
        level: run.level,
        time: run.time.round() as i64,
        boss_kills: run.boss_kills,
        bb_earned: run.bb_earned,
        viewers: run.viewers,
        victory: run.victory,
        timestamp: Utc::now().timestamp_millis(),
        name: run.name,
        class_id: run.class_id,
        race_id: run.race_id,
    };

    let key = store::run_key(&record.id);
    store.hash_set(&key, &record.to_fields())?;
    store.expire(&key, config.run_retention_secs)?;

    store.sorted_set_insert(GLOBAL_RANKING_KEY, score, &record.id)?;
    let player = store::player_key(&normalize_player(&record.name));
    store.sorted_set_insert(&player, score, &record.id)?;

    let rank = store
        .sorted_set_rev_rank(GLOBAL_RANKING_KEY, &record.id)?
        .ok_or_else(|| AppError::Internal(format!("run {} missing from ranking", record.id)))?;

    log::info!(
        "recorded run {} for {} (score {}, rank {})",
        record.id,
        record.name,
        score,
        rank + 1
    );

    Ok(RunSubmissionResult {
        success: true,
        id: record.id,
        score,
        rank: rank + 1,
    })
}
