use chrono::{DateTime, FixedOffset, Utc};
use std::env;

use crate::error::BotError;

/// Process-wide read-only configuration, loaded once at startup and handed to
/// the handlers through `dptree::deps`. `BOT_TOKEN` is consumed separately by
/// `Bot::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    pub owner_id: i64,
    pub database_url: String,
    pub tz_offset: FixedOffset,
    pub code_length: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, BotError> {
        let owner_id = get_env("OWNER_ID")?
            .parse()
            .map_err(|_| BotError::Config("OWNER_ID must be a numeric telegram id".into()))?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/quizzes.sqlite3".to_owned());

        let offset_hours: i32 = match env::var("TZ_OFFSET_HOURS") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| BotError::Config("TZ_OFFSET_HOURS must be an integer".into()))?,
            Err(_) => 5,
        };
        let tz_offset = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or_else(|| BotError::Config("TZ_OFFSET_HOURS is out of range".into()))?;

        let code_length = match env::var("CODE_LENGTH") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| BotError::Config("CODE_LENGTH must be a positive integer".into()))?,
            Err(_) => 6,
        };

        Ok(Self { owner_id, database_url, tz_offset, code_length })
    }

    /// The current instant in the configured zone. Deadline comparisons all
    /// go through this so they agree with what was shown to the admin.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.tz_offset)
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == user_id
    }
}

fn get_env(name: &str) -> Result<String, BotError> {
    env::var(name).map_err(|_| BotError::Config(format!("missing environment variable: {name}")))
}
