//! Environment-driven configuration
//!
//! Values are read once at startup after `.env` has been loaded.

use anyhow::{Context, Result};
use chrono_tz::Tz;

/// Timezone the reminder timetable runs in unless overridden
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub discord_guild_id: Option<String>,
    pub database_path: String,
    pub log_level: String,
    pub timezone: Tz,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (env vars in production, maps in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let discord_token = lookup("DISCORD_TOKEN")
            .filter(|v| !v.trim().is_empty())
            .context("DISCORD_TOKEN must be set")?;

        let timezone = match lookup("BIRTHDAY_TIMEZONE") {
            Some(name) => name
                .trim()
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("Invalid BIRTHDAY_TIMEZONE '{}': {}", name, e))?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Config {
            discord_token,
            discord_guild_id: lookup("DISCORD_GUILD_ID").filter(|v| !v.trim().is_empty()),
            database_path: lookup("DATABASE_PATH").unwrap_or_else(|| "birthdays.db".to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            timezone,
        })
    }
}
