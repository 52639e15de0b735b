use crate::models::run::ValidatedRun;

const FLOOR_POINTS: i64 = 1000;
const BOSS_POINTS: i64 = 500;
const KILL_POINTS: i64 = 2;
const LEVEL_POINTS: i64 = 50;
const VIEWERS_PER_POINT: i64 = 100;
const VICTORY_BONUS: i64 = 5000;
const SECONDS_PER_PENALTY: f64 = 10.0;

/// Server-side score for a validated run. Goes negative for very long runs.
pub fn compute_score(run: &ValidatedRun) -> i64 {
    let victory = if run.victory { VICTORY_BONUS } else { 0 };
    run.floor * FLOOR_POINTS
        + run.boss_kills * BOSS_POINTS
        + run.kills * KILL_POINTS
        + run.level * LEVEL_POINTS
        + run.viewers / VIEWERS_PER_POINT
        + victory
        - (run.time / SECONDS_PER_PENALTY).floor() as i64
}
