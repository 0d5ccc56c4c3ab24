use crate::error::{config_error, env_error, AppResult};
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default calendar page queried per day
pub const DEFAULT_CALENDAR_URL: &str = "https://www.forexfactory.com/calendar";

/// Default table holding the harvested events
pub const DEFAULT_TABLE: &str = "forex_calendar";

/// Browser-like user agent; the calendar site rejects bare HTTP clients
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub const DEFAULT_SEED_DAYS: u32 = 3;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_TRIGGER_WINDOW_SECS: u64 = 60;

/// Optional overrides read from `config/schedule.toml`
const SCHEDULE_FILE: &str = "config/schedule.toml";

/// Main configuration structure for the harvester
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Datastore REST endpoint
    pub supabase_url: String,
    /// Datastore API key
    pub supabase_key: String,
    /// Table the events are written to
    pub supabase_table: String,
    /// Timezone persisted times are expressed in
    pub target_timezone: String,
    /// Timezone the calendar page renders its times in
    pub source_timezone: String,
    /// Base day-query URL of the calendar
    pub calendar_url: String,
    /// User agent sent with every calendar request
    pub user_agent: String,
    /// Number of days seeded at startup, starting today
    pub seed_days: u32,
    /// Seconds between two watch loop polls
    pub poll_interval_secs: u64,
    /// Tolerance within which an event counts as due
    pub trigger_window_secs: u64,
}

/// Numeric settings that may be overridden from file
#[derive(Debug, Default, Deserialize)]
struct ScheduleOverrides {
    seed_days: Option<u32>,
    poll_interval_secs: Option<u64>,
    trigger_window_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment and config file
    pub fn load() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let supabase_url = env::var("SUPABASE_URL").map_err(|_| env_error("SUPABASE_URL"))?;
        let supabase_key = env::var("SUPABASE_KEY").map_err(|_| env_error("SUPABASE_KEY"))?;

        let supabase_table = env_or("SUPABASE_TABLE", DEFAULT_TABLE.to_string())?;
        let target_timezone = env_or("TARGET_TIMEZONE", String::from("UTC"))?;
        let source_timezone = env_or("SOURCE_TIMEZONE", String::from("UTC"))?;
        let calendar_url = env_or("CALENDAR_URL", DEFAULT_CALENDAR_URL.to_string())?;
        let user_agent = env_or("USER_AGENT", DEFAULT_USER_AGENT.to_string())?;

        let mut config = Config {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_key,
            supabase_table,
            target_timezone,
            source_timezone,
            calendar_url,
            user_agent,
            seed_days: env_or("SEED_DAYS", DEFAULT_SEED_DAYS)?,
            poll_interval_secs: env_or("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
            trigger_window_secs: env_or("TRIGGER_WINDOW_SECS", DEFAULT_TRIGGER_WINDOW_SECS)?,
        };

        if Path::new(SCHEDULE_FILE).exists() {
            let content = fs::read_to_string(SCHEDULE_FILE)?;
            config.apply_overrides(&content)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge `config/schedule.toml` style overrides into this config
    pub fn apply_overrides(&mut self, content: &str) -> AppResult<()> {
        let overrides: ScheduleOverrides = toml::from_str(content)?;
        if let Some(days) = overrides.seed_days {
            self.seed_days = days;
        }
        if let Some(secs) = overrides.poll_interval_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(secs) = overrides.trigger_window_secs {
            self.trigger_window_secs = secs;
        }
        Ok(())
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> AppResult<()> {
        self.target_tz()?;
        Tz::from_str(&self.source_timezone).map_err(|_| {
            config_error(&format!("Unknown source timezone: {}", self.source_timezone))
        })?;
        if self.poll_interval_secs == 0 {
            return Err(config_error("POLL_INTERVAL_SECS must be greater than zero"));
        }
        if self.trigger_window_secs == 0 {
            return Err(config_error("TRIGGER_WINDOW_SECS must be greater than zero"));
        }
        Ok(())
    }

    /// Parsed target timezone
    pub fn target_tz(&self) -> AppResult<Tz> {
        Tz::from_str(&self.target_timezone).map_err(|_| {
            config_error(&format!("Unknown target timezone: {}", self.target_timezone))
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn trigger_window(&self) -> Duration {
        Duration::from_secs(self.trigger_window_secs)
    }
}

/// Read an optional environment variable, falling back to a default
fn env_or<T: FromStr>(var: &str, default: T) -> AppResult<T> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| config_error(&format!("Invalid {} format", var))),
        Err(_) => Ok(default),
    }
}
