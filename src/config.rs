use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

/// Server settings, read from environment variables of the same name in
/// upper case (`PORT`, `CHECKSUM_SECRET`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,
    /// Shared with the game client; mixed into every run checksum.
    #[serde(default = "default_checksum_secret")]
    pub checksum_secret: String,
    #[serde(default = "default_burst_limit")]
    pub burst_limit: i64,
    #[serde(default = "default_burst_window_secs")]
    pub burst_window_secs: u64,
    #[serde(default = "default_daily_limit")]
    pub daily_limit: i64,
    #[serde(default = "default_daily_window_secs")]
    pub daily_window_secs: u64,
    #[serde(default = "default_run_retention_secs")]
    pub run_retention_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3001
}

fn default_database_path() -> String {
    "leaderboard.db".into()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Sqlite
}

fn default_checksum_secret() -> String {
    "dungeon-crawler-stream-2024".into()
}

fn default_burst_limit() -> i64 {
    2
}

fn default_burst_window_secs() -> u64 {
    30
}

fn default_daily_limit() -> i64 {
    20
}

fn default_daily_window_secs() -> u64 {
    24 * 60 * 60
}

fn default_run_retention_secs() -> u64 {
    90 * 24 * 60 * 60
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            store_backend: default_store_backend(),
            checksum_secret: default_checksum_secret(),
            burst_limit: default_burst_limit(),
            burst_window_secs: default_burst_window_secs(),
            daily_limit: default_daily_limit(),
            daily_window_secs: default_daily_window_secs(),
            run_retention_secs: default_run_retention_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_env() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.burst_limit, 2);
        assert_eq!(config.daily_limit, 20);
        assert_eq!(config.run_retention_secs, 7_776_000);
    }

    #[test]
    fn test_overrides() {
        let config: Config = envy::from_iter(vec![
            ("PORT".to_string(), "8080".to_string()),
            ("STORE_BACKEND".to_string(), "memory".to_string()),
            ("CHECKSUM_SECRET".to_string(), "hunter2".to_string()),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.checksum_secret, "hunter2");
    }
}
