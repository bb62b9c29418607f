use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::AppError;
use crate::services::slot_search::SlotCatalogue;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: SocketAddr,
    /// Seconds between automatic conversion + publication passes; 0 disables.
    pub automation_interval_secs: u64,
    pub scheduling: SchedulingSettings,
}

/// Knobs of the scheduling engine itself.
#[derive(Clone, Debug)]
pub struct SchedulingSettings {
    pub catalogue: SlotCatalogue,
    /// Move conflicting sessions to the next free catalogue slot before the
    /// retry pass instead of retrying them in place.
    pub reschedule_on_conflict: bool,
    pub max_suggestions: usize,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            catalogue: SlotCatalogue::standard(),
            reschedule_on_conflict: false,
            max_suggestions: 5,
        }
    }
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://timetable.db".to_string());
        let db_max_connections = parse_var("DB_MAX_CONNECTIONS", 5)?;
        let bind_addr = parse_var("BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?;
        let automation_interval_secs = parse_var("AUTOMATION_INTERVAL_SECS", 0)?;

        let defaults = SchedulingSettings::default();
        let scheduling = SchedulingSettings {
            catalogue: defaults.catalogue,
            reschedule_on_conflict: parse_var("RESCHEDULE_ON_CONFLICT", false)?,
            max_suggestions: parse_var("MAX_SUGGESTIONS", defaults.max_suggestions)?,
        };

        Ok(Self {
            database_url,
            db_max_connections,
            bind_addr,
            automation_interval_secs,
            scheduling,
        })
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::BadRequest(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}
