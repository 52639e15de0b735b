use crate::error::AppError;
use crate::models::run::ValidatedRun;

const SEPARATOR: &str = "|";

/// 32-bit multiplicative string hash (`h * 33 + c`, seed 5381) over UTF-16
/// code units, wrapping like a signed 32-bit integer. Rendered as unsigned hex.
pub fn hash_string(input: &str) -> String {
    let hash = input
        .encode_utf16()
        .fold(5381i32, |h, c| h.wrapping_mul(33).wrapping_add(i32::from(c)));
    format!("{:x}", hash as u32)
}

/// The checksum a client should have sent for this run. Computed over the
/// sanitized fields so a tampered name cannot ride on an old checksum.
pub fn expected_checksum(run: &ValidatedRun, secret: &str) -> String {
    let payload = [
        run.name.clone(),
        run.floor.to_string(),
        run.kills.to_string(),
        run.level.to_string(),
        (run.time.floor() as i64).to_string(),
        run.boss_kills.to_string(),
        run.bb_earned.to_string(),
        run.viewers.to_string(),
        run.class_id.clone(),
        run.race_id.clone(),
        secret.to_string(),
    ]
    .join(SEPARATOR);
    hash_string(&payload)
}

pub fn verify_checksum(
    run: &ValidatedRun,
    supplied: Option<&str>,
    secret: &str,
) -> Result<(), AppError> {
    match supplied {
        Some(checksum) if checksum == expected_checksum(run, secret) => Ok(()),
        _ => Err(AppError::ChecksumMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> ValidatedRun {
        ValidatedRun {
            name: "Bob".into(),
            floor: 4,
            kills: 120,
            level: 22,
            time: 845.6,
            boss_kills: 3,
            bb_earned: 40,
            viewers: 250,
            class_id: "berserker".into(),
            race_id: "goblin".into(),
            victory: false,
        }
    }

    #[test]
    fn test_hash_string_known_values() {
        assert_eq!(hash_string(""), "1505");
        // 5381 * 33 + 97
        assert_eq!(hash_string("a"), "2b606");
        assert_eq!(hash_string("ab"), "597728");
    }

    #[test]
    fn test_hash_wraps_to_unsigned() {
        let long = "z".repeat(64);
        let hex = hash_string(&long);
        assert!(hex.len() <= 8);
        assert!(u32::from_str_radix(&hex, 16).is_ok());
    }

    #[test]
    fn test_payload_layout() {
        let expected = hash_string("Bob|4|120|22|845|3|40|250|berserker|goblin|s3cret");
        assert_eq!(expected_checksum(&run(), "s3cret"), expected);
    }

    #[test]
    fn test_verify() {
        let good = expected_checksum(&run(), "s3cret");
        assert!(verify_checksum(&run(), Some(&good), "s3cret").is_ok());
        assert!(matches!(
            verify_checksum(&run(), Some(&good), "other"),
            Err(AppError::ChecksumMismatch)
        ));
        assert!(matches!(
            verify_checksum(&run(), None, "s3cret"),
            Err(AppError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_any_field_change_breaks_checksum() {
        let good = expected_checksum(&run(), "s3cret");
        let mut tampered = run();
        tampered.kills += 1;
        assert!(verify_checksum(&tampered, Some(&good), "s3cret").is_err());

        let mut renamed = run();
        renamed.name = "Bob!".into();
        assert!(verify_checksum(&renamed, Some(&good), "s3cret").is_err());
    }

    #[test]
    fn test_fractional_time_does_not_matter() {
        let good = expected_checksum(&run(), "s3cret");
        let mut later = run();
        later.time = 845.99;
        assert!(verify_checksum(&later, Some(&good), "s3cret").is_ok());
    }
}
