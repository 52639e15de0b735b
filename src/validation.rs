use crate::error::AppError;
use crate::models::run::{RunSubmission, ValidatedRun};
use serde_json::Value;

const VALID_CLASSES: &[&str] = &[
    "pugilist",
    "berserker",
    "elementalist",
    "trapper",
    "beastmaster",
    "necromancer",
];
const VALID_RACES: &[&str] = &["human", "primal", "halfElf", "goblin"];

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 16;
const MAX_FLOOR: i64 = 9;
const MAX_KILLS: i64 = 5000;
const MAX_LEVEL: i64 = 60;
const MIN_RUN_SECS: f64 = 20.0;
/// Keeps whole-second renderings of the time exact in an `i64`.
const MAX_RUN_SECS: f64 = 1_000_000_000.0;
const VICTORY_BOSS_KILLS: i64 = 9;

/// Removes `<...>` spans, then every character outside ASCII word
/// characters, space, `-`, `.` and `!`, then trims and truncates.
pub fn sanitize_name(raw: &str) -> String {
    let mut without_tags = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                without_tags.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            None => break,
        }
    }
    without_tags.push_str(rest);

    let allowed: String = without_tags
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ' ' | '-' | '.' | '!'))
        .collect();
    allowed.trim().chars().take(MAX_NAME_LEN).collect()
}

/// Lower-cased, trimmed form used to group runs by player.
pub fn normalize_player(name: &str) -> String {
    name.trim().to_lowercase()
}

fn validate_name(value: Option<&Value>) -> Result<String, AppError> {
    let raw = value
        .and_then(Value::as_str)
        .ok_or(AppError::InvalidField("name"))?;
    let name = sanitize_name(raw);
    let len = name.chars().count();
    if (MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        Ok(name)
    } else {
        Err(AppError::InvalidField("name"))
    }
}

/// Reads a JSON number, or a string holding one. Anything else is `None`.
fn number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn validate_int(
    field: &'static str,
    value: Option<&Value>,
    min: i64,
    max: i64,
) -> Result<i64, AppError> {
    let n = number(value).ok_or(AppError::InvalidField(field))?;
    if n.fract() != 0.0 || n < min as f64 || n > max as f64 {
        return Err(AppError::InvalidField(field));
    }
    Ok(n as i64)
}

fn validate_choice(
    field: &'static str,
    value: Option<&Value>,
    choices: &[&str],
) -> Result<String, AppError> {
    match value.and_then(Value::as_str) {
        Some(s) if choices.contains(&s) => Ok(s.to_string()),
        _ => Err(AppError::InvalidField(field)),
    }
}

fn validate_victory(value: Option<&Value>) -> Result<bool, AppError> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(AppError::InvalidField("victory")),
    }
}

/// Checks every field in a fixed order and stops at the first failure.
pub fn validate_run(req: &RunSubmission) -> Result<ValidatedRun, AppError> {
    let name = validate_name(req.name.as_ref())?;
    let floor = validate_int("floor", req.floor.as_ref(), 1, MAX_FLOOR)?;
    let kills = validate_int("kills", req.kills.as_ref(), 0, MAX_KILLS)?;
    let level = validate_int("level", req.level.as_ref(), 1, MAX_LEVEL)?;
    let time = number(req.time.as_ref())
        .filter(|t| (MIN_RUN_SECS..=MAX_RUN_SECS).contains(t))
        .ok_or(AppError::InvalidField("time"))?;
    let boss_kills = validate_int("bossKills", req.boss_kills.as_ref(), 0, floor)?;
    let bb_earned = validate_int("bbEarned", req.bb_earned.as_ref(), 0, i64::MAX)?;
    let viewers = validate_int("viewers", req.viewers.as_ref(), 0, i64::MAX)?;
    let class_id = validate_choice("classId", req.class_id.as_ref(), VALID_CLASSES)?;
    let race_id = validate_choice("raceId", req.race_id.as_ref(), VALID_RACES)?;
    let victory = validate_victory(req.victory.as_ref())?;
    if victory && !(floor == MAX_FLOOR && boss_kills >= VICTORY_BOSS_KILLS) {
        return Err(AppError::InvalidVictoryClaim);
    }

    Ok(ValidatedRun {
        name,
        floor,
        kills,
        level,
        time,
        boss_kills,
        bb_earned,
        viewers,
        class_id,
        race_id,
        victory,
    })
}
