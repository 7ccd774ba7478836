use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Fallback estimate when a doctor has no completed services yet.
    pub default_service_minutes: i64,
    /// Number of recent completions kept for the rolling service-time average.
    pub service_average_window: usize,
    /// Lower bound applied to the rolling average.
    pub min_service_minutes: i64,
    /// Entries at or below this position get an "approaching" notification
    /// when the queue compacts.
    pub approaching_threshold: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: read_var("PORT", 3000),
            default_service_minutes: read_var("DEFAULT_SERVICE_MINUTES", 15),
            service_average_window: read_var("SERVICE_AVERAGE_WINDOW", 20),
            min_service_minutes: read_var("MIN_SERVICE_MINUTES", 5),
            approaching_threshold: read_var("QUEUE_APPROACHING_THRESHOLD", 3),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            default_service_minutes: 15,
            service_average_window: 20,
            min_service_minutes: 5,
            approaching_threshold: 3,
        }
    }
}

fn read_var<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
