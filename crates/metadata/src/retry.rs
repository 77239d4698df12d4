use crate::MetadataResult;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_DELAY_SECONDS: u64 = 1;

/// Connection retry settings for the database metadata store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseRetryConfig {
    pub max_attempts: u32,
    pub initial_delay_seconds: u64,
}

impl Default for DatabaseRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_seconds: DEFAULT_INITIAL_DELAY_SECONDS,
        }
    }
}

impl DatabaseRetryConfig {
    /// Read `DB_RETRY_MAX_ATTEMPTS` and `DB_RETRY_INITIAL_DELAY_SECONDS`,
    /// keeping the default for anything missing or unparsable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_attempts = lookup("DB_RETRY_MAX_ATTEMPTS")
            .and_then(|v| v.trim().parse().ok())
            .filter(|&n: &u32| n > 0)
            .unwrap_or(defaults.max_attempts);
        let initial_delay_seconds = lookup("DB_RETRY_INITIAL_DELAY_SECONDS")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(defaults.initial_delay_seconds);
        Self {
            max_attempts,
            initial_delay_seconds,
        }
    }

    /// Delay before the retry following attempt `attempt` (1-based), doubling each time
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_secs(self.initial_delay_seconds.saturating_mul(factor))
    }

    /// Connect to `database_url`, backing off exponentially between attempts
    pub async fn connect(&self, database_url: &str) -> MetadataResult<PgPool> {
        let mut attempt = 1;
        loop {
            match PgPool::connect(database_url).await {
                Ok(pool) => {
                    info!(attempt, "Connected to PostgreSQL");
                    return Ok(pool);
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Database connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
