//! Gateway configuration.
//!
//! Configuration is loaded from environment variables. The store seed path
//! is redacted in Debug output since it can point into a user profile.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP bind address. Loopback only: the gateway is a local service.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8899";

/// Default provider id echoed in responses.
pub const DEFAULT_PROVIDER_ID: &str = "OwnerGateway/v1.0";

/// Default bounded dispatch queue capacity.
pub const DEFAULT_DISPATCH_QUEUE_CAPACITY: usize = 64;

/// Default per-call dispatch deadline in seconds.
pub const DEFAULT_DISPATCH_TIMEOUT_SECONDS: u64 = 30;

/// Default free/busy interval in minutes.
pub const DEFAULT_FREE_BUSY_INTERVAL_MINUTES: u32 = 30;

/// Default longest availability range in days.
pub const DEFAULT_MAX_AVAILABILITY_DAYS: u32 = 62;

/// Largest accepted UTC offset in minutes (UTC+14:00).
pub const MAX_UTC_OFFSET_MINUTES: i32 = 840;

/// Default working day start hour (local).
pub const DEFAULT_WORKDAY_START_HOUR: u32 = 9;

/// Default working day end hour (local).
pub const DEFAULT_WORKDAY_END_HOUR: u32 = 17;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;

/// Default owner name (thread name and current user local part).
pub const DEFAULT_OWNER_NAME: &str = "owner";

/// Gateway configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "127.0.0.1:8899").
    pub bind_address: String,

    /// Provider id echoed in every response body.
    pub provider_id: String,

    /// Bounded queue capacity of the owner dispatcher.
    pub dispatch_queue_capacity: usize,

    /// Per-call deadline for dispatched work. `None` waits indefinitely.
    pub dispatch_timeout: Option<Duration>,

    /// Free/busy interval granularity in minutes.
    pub free_busy_interval_minutes: u32,

    /// Longest `start_date_utc..end_date_utc` range an availability query
    /// may cover.
    pub max_availability_days: u32,

    /// Fixed local offset used for the working-hours filter.
    pub utc_offset_minutes: i32,

    /// Local hour at which the working day starts.
    pub workday_start_hour: u32,

    /// Local hour at which the working day ends.
    pub workday_end_hour: u32,

    /// tower-http request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Optional JSON seed file for the in-memory store.
    pub store_seed_path: Option<PathBuf>,

    /// Owner thread name, also the current user's identity in the store.
    pub owner_name: String,

    /// Seconds to wait after a shutdown signal before draining the owner.
    pub drain_seconds: u64,

    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
}

/// Custom Debug implementation that redacts the seed path.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("provider_id", &self.provider_id)
            .field("dispatch_queue_capacity", &self.dispatch_queue_capacity)
            .field("dispatch_timeout", &self.dispatch_timeout)
            .field(
                "free_busy_interval_minutes",
                &self.free_busy_interval_minutes,
            )
            .field("max_availability_days", &self.max_availability_days)
            .field("utc_offset_minutes", &self.utc_offset_minutes)
            .field("workday_start_hour", &self.workday_start_hour)
            .field("workday_end_hour", &self.workday_end_hour)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field(
                "store_seed_path",
                &self.store_seed_path.as_ref().map(|_| "[REDACTED]"),
            )
            .field("owner_name", &self.owner_name)
            .field("drain_seconds", &self.drain_seconds)
            .field("log_json", &self.log_json)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            name,
            reason: reason.into(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable fails to parse or
    /// is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable fails to parse or
    /// is out of range.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("GATEWAY_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let provider_id = vars
            .get("GATEWAY_PROVIDER_ID")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string());

        let dispatch_queue_capacity: usize = parse_or(
            vars,
            "GATEWAY_DISPATCH_QUEUE_CAPACITY",
            DEFAULT_DISPATCH_QUEUE_CAPACITY,
        )?;
        if dispatch_queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "GATEWAY_DISPATCH_QUEUE_CAPACITY",
                "must be greater than 0",
            ));
        }

        // 0 disables the deadline entirely.
        let dispatch_timeout_seconds: u64 = parse_or(
            vars,
            "GATEWAY_DISPATCH_TIMEOUT_SECONDS",
            DEFAULT_DISPATCH_TIMEOUT_SECONDS,
        )?;
        let dispatch_timeout =
            (dispatch_timeout_seconds > 0).then(|| Duration::from_secs(dispatch_timeout_seconds));

        let free_busy_interval_minutes: u32 = parse_or(
            vars,
            "GATEWAY_FREE_BUSY_INTERVAL_MINUTES",
            DEFAULT_FREE_BUSY_INTERVAL_MINUTES,
        )?;
        if !(1..=1440).contains(&free_busy_interval_minutes) {
            return Err(ConfigError::invalid(
                "GATEWAY_FREE_BUSY_INTERVAL_MINUTES",
                format!("must be between 1 and 1440, got {free_busy_interval_minutes}"),
            ));
        }

        let max_availability_days: u32 = parse_or(
            vars,
            "GATEWAY_MAX_AVAILABILITY_DAYS",
            DEFAULT_MAX_AVAILABILITY_DAYS,
        )?;
        if max_availability_days == 0 {
            return Err(ConfigError::invalid(
                "GATEWAY_MAX_AVAILABILITY_DAYS",
                "must be greater than 0",
            ));
        }

        let utc_offset_minutes: i32 = parse_or(vars, "GATEWAY_UTC_OFFSET_MINUTES", 0)?;
        if utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ConfigError::invalid(
                "GATEWAY_UTC_OFFSET_MINUTES",
                format!(
                    "must be within +/-{MAX_UTC_OFFSET_MINUTES} minutes, got {utc_offset_minutes}"
                ),
            ));
        }

        let workday_start_hour: u32 = parse_or(
            vars,
            "GATEWAY_WORKDAY_START_HOUR",
            DEFAULT_WORKDAY_START_HOUR,
        )?;
        let workday_end_hour: u32 =
            parse_or(vars, "GATEWAY_WORKDAY_END_HOUR", DEFAULT_WORKDAY_END_HOUR)?;
        if workday_end_hour > 24 || workday_start_hour >= workday_end_hour {
            return Err(ConfigError::invalid(
                "GATEWAY_WORKDAY_END_HOUR",
                format!(
                    "working day must satisfy start < end <= 24, got {workday_start_hour}..{workday_end_hour}"
                ),
            ));
        }

        let request_timeout_seconds: u64 = parse_or(
            vars,
            "GATEWAY_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;
        if request_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "GATEWAY_REQUEST_TIMEOUT_SECONDS",
                "must be greater than 0",
            ));
        }

        let store_seed_path = vars
            .get("GATEWAY_STORE_SEED_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let owner_name = vars
            .get("GATEWAY_OWNER_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_OWNER_NAME.to_string());
        if owner_name.trim().is_empty() {
            return Err(ConfigError::invalid(
                "GATEWAY_OWNER_NAME",
                "must not be empty",
            ));
        }

        let drain_seconds: u64 = parse_or(vars, "GATEWAY_DRAIN_SECONDS", 0)?;

        let log_json = match vars.get("GATEWAY_LOG_JSON").map(|v| v.to_ascii_lowercase()) {
            None => false,
            Some(value) => match value.as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" | "" => false,
                other => {
                    return Err(ConfigError::invalid(
                        "GATEWAY_LOG_JSON",
                        format!("expected true or false, got '{other}'"),
                    ));
                }
            },
        };

        Ok(Config {
            bind_address,
            provider_id,
            dispatch_queue_capacity,
            dispatch_timeout,
            free_busy_interval_minutes,
            max_availability_days,
            utc_offset_minutes,
            workday_start_hour,
            workday_end_hour,
            request_timeout_seconds,
            store_seed_path,
            owner_name,
            drain_seconds,
            log_json,
        })
    }
}

fn parse_or<T>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match vars.get(name) {
        Some(value) => value.trim().parse().map_err(|e| {
            ConfigError::invalid(name, format!("could not parse '{value}': {e}"))
        }),
        None => Ok(default),
    }
}
