use super::run::RunRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<String>,
    pub player: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u64,
    #[serde(flatten)]
    pub run: RunRecord,
}

/// A player's highest scoring run and where it sits globally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerBest {
    #[serde(flatten)]
    pub run: RunRecord,
    pub rank: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub total: u64,
    pub player_best: Option<PlayerBest>,
}
