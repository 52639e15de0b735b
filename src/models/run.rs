use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Run fields exactly as the client sent them. Nothing here is trusted; a
/// client-supplied `score` is not even read.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSubmission {
    pub name: Option<Value>,
    pub floor: Option<Value>,
    pub kills: Option<Value>,
    pub level: Option<Value>,
    pub time: Option<Value>,
    pub boss_kills: Option<Value>,
    pub bb_earned: Option<Value>,
    pub viewers: Option<Value>,
    pub class_id: Option<Value>,
    pub race_id: Option<Value>,
    pub victory: Option<Value>,
    pub checksum: Option<Value>,
}

/// A submission that passed every plausibility check.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRun {
    pub name: String,
    pub floor: i64,
    pub kills: i64,
    pub level: i64,
    pub time: f64,
    pub boss_kills: i64,
    pub bb_earned: i64,
    pub viewers: i64,
    pub class_id: String,
    pub race_id: String,
    pub victory: bool,
}

/// A persisted run. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub name: String,
    pub score: i64,
    pub floor: i64,
    pub kills: i64,
    pub level: i64,
    pub time: i64,
    pub boss_kills: i64,
    pub bb_earned: i64,
    pub viewers: i64,
    pub class_id: String,
    pub race_id: String,
    pub victory: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl RunRecord {
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("name", self.name.clone()),
            ("score", self.score.to_string()),
            ("floor", self.floor.to_string()),
            ("kills", self.kills.to_string()),
            ("level", self.level.to_string()),
            ("time", self.time.to_string()),
            ("bossKills", self.boss_kills.to_string()),
            ("bbEarned", self.bb_earned.to_string()),
            ("viewers", self.viewers.to_string()),
            ("classId", self.class_id.clone()),
            ("raceId", self.race_id.clone()),
            ("victory", self.victory.to_string()),
            ("timestamp", self.timestamp.to_string()),
        ]
    }

    /// Rebuilds a record from its stored hash. `None` if the hash is empty
    /// (expired or never written) or a field is missing or garbled.
    pub fn from_fields(fields: &HashMap<String, String>) -> Option<Self> {
        let text = |name: &str| fields.get(name).cloned();
        let int = |name: &str| fields.get(name)?.parse::<i64>().ok();
        Some(RunRecord {
            id: text("id")?,
            name: text("name")?,
            score: int("score")?,
            floor: int("floor")?,
            kills: int("kills")?,
            level: int("level")?,
            time: int("time")?,
            boss_kills: int("bossKills")?,
            bb_earned: int("bbEarned")?,
            viewers: int("viewers")?,
            class_id: text("classId")?,
            race_id: text("raceId")?,
            victory: fields.get("victory")? == "true",
            timestamp: int("timestamp")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RunSubmissionResult {
    pub success: bool,
    pub id: String,
    pub score: i64,
    pub rank: u64,
}
