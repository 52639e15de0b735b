use crate::config::Config;
use crate::error::AppError;
use crate::models::run::{RunSubmission, RunSubmissionResult};
use crate::services::{checksum, ranking, rate_limit, scoring};
use crate::store::Store;
use crate::validation;
use serde_json::Value;

/// Decodes a request body. Empty bodies and anything that is not a JSON
/// object count as missing.
pub fn parse_submission(body: &[u8]) -> Result<RunSubmission, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::MissingBody);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => {
            serde_json::from_value(value).map_err(|_| AppError::MissingBody)
        }
        _ => Err(AppError::MissingBody),
    }
}

/// Full submission pipeline: rate limit, validate, verify checksum, score,
/// then persist and rank.
pub fn submit_run(
    store: &dyn Store,
    client: &str,
    body: &[u8],
    config: &Config,
) -> Result<RunSubmissionResult, AppError> {
    rate_limit::check_rate_limit(store, client, config)?;

    let req = parse_submission(body)?;
    let run = validation::validate_run(&req)?;
    let supplied = req.checksum.as_ref().and_then(Value::as_str);
    if let Err(e) = checksum::verify_checksum(&run, supplied, &config.checksum_secret) {
        log::warn!("checksum mismatch from {} for player {}", client, run.name);
        return Err(e);
    }

    let score = scoring::compute_score(&run);
    ranking::record_run(store, run, score, config)
}
