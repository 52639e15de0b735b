pub mod checksum;
pub mod leaderboard;
pub mod ranking;
pub mod rate_limit;
pub mod scoring;
pub mod submission;
