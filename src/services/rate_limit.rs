use crate::config::Config;
use crate::error::{AppError, RateLimitKind};
use crate::store::{self, Store, StoreError};

/// Identity used when the request carries no forwarding header.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// First address of an `X-Forwarded-For` value, or [`UNKNOWN_CLIENT`].
pub fn client_identity(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Increments a windowed counter, starting its expiry on the first hit.
fn hit(store: &dyn Store, key: &str, window_secs: u64) -> Result<i64, StoreError> {
    let count = store.increment(key)?;
    if count == 1 {
        store.expire(key, window_secs)?;
    }
    Ok(count)
}

/// Charges one submission to `client`. Both counters are always consumed,
/// whatever happens to the submission afterwards.
pub fn check_rate_limit(store: &dyn Store, client: &str, config: &Config) -> Result<(), AppError> {
    let burst = hit(store, &store::burst_key(client), config.burst_window_secs)?;
    let daily = hit(store, &store::daily_key(client), config.daily_window_secs)?;

    if burst > config.burst_limit {
        log::info!("burst limit hit for {} ({} in window)", client, burst);
        return Err(AppError::RateLimited(RateLimitKind::Burst));
    }
    if daily > config.daily_limit {
        log::info!("daily limit hit for {} ({} today)", client, daily);
        return Err(AppError::RateLimited(RateLimitKind::Daily));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn limited(result: Result<(), AppError>) -> Option<RateLimitKind> {
        match result {
            Ok(()) => None,
            Err(AppError::RateLimited(kind)) => Some(kind),
            Err(e) => panic!("unexpected error {:?}", e),
        }
    }

    #[test]
    fn test_client_identity() {
        assert_eq!(client_identity(Some("1.2.3.4, 10.0.0.1")), "1.2.3.4");
        assert_eq!(client_identity(Some(" 5.6.7.8 ")), "5.6.7.8");
        assert_eq!(client_identity(Some("")), UNKNOWN_CLIENT);
        assert_eq!(client_identity(None), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_third_submission_in_window_is_burst_limited() {
        let store = MemoryStore::new();
        let config = Config::default();
        assert_eq!(limited(check_rate_limit(&store, "a", &config)), None);
        assert_eq!(limited(check_rate_limit(&store, "a", &config)), None);
        assert_eq!(
            limited(check_rate_limit(&store, "a", &config)),
            Some(RateLimitKind::Burst)
        );
        // other clients have their own counters
        assert_eq!(limited(check_rate_limit(&store, "b", &config)), None);
    }

    #[test]
    fn test_burst_window_expires() {
        let store = MemoryStore::new();
        let config = Config::default();
        check_rate_limit(&store, "a", &config).unwrap();
        check_rate_limit(&store, "a", &config).unwrap();
        store.advance_clock(Duration::seconds(31));
        assert_eq!(limited(check_rate_limit(&store, "a", &config)), None);
    }

    #[test]
    fn test_twenty_first_submission_in_a_day_is_daily_limited() {
        let store = MemoryStore::new();
        let config = Config::default();
        for _ in 0..10 {
            assert_eq!(limited(check_rate_limit(&store, "a", &config)), None);
            assert_eq!(limited(check_rate_limit(&store, "a", &config)), None);
            store.advance_clock(Duration::seconds(31));
        }
        assert_eq!(
            limited(check_rate_limit(&store, "a", &config)),
            Some(RateLimitKind::Daily)
        );

        store.advance_clock(Duration::hours(24));
        assert_eq!(limited(check_rate_limit(&store, "a", &config)), None);
    }

    #[test]
    fn test_rejected_attempts_still_count() {
        let store = MemoryStore::new();
        let config = Config::default();
        for _ in 0..5 {
            let _ = check_rate_limit(&store, "a", &config);
        }
        assert_eq!(store.increment(&store::daily_key("a")).unwrap(), 6);
    }
}
