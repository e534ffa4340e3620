//! Process configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `PORT` | 8080 |
//! | `DATA_FILE` | unset: in-memory store |
//! | `JWT_SECRET` | development secret (logged as a warning) |
//! | `TOKEN_TTL_SECS` | 86400 |
//! | `INITIAL_CREDITS` | 2000 |
//! | `STORE_TIMEOUT_MS` | 2000 |
//! | `TICK_INTERVAL_MS` | 2000 |
//! | `SIM_SEED` | unset: OS entropy |
//! | `SIM_MAX_MOVE_PCT` | 2 |
//!
//! Unparseable values fall back to the default with a warning.

use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::exchange::DEFAULT_INITIAL_CREDITS;
use crate::simulation::SimulatorConfig;

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub data_file: Option<PathBuf>,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub initial_credits: Decimal,
    pub store_timeout: Duration,
    pub simulator: SimulatorConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("JWT_SECRET not set; using the development secret");
            DEV_SECRET.to_string()
        });
        let defaults = SimulatorConfig::default();
        Self {
            port: parse_or(get("PORT"), "PORT", 8080),
            data_file: get("DATA_FILE").map(PathBuf::from),
            jwt_secret,
            token_ttl: Duration::from_secs(parse_or(get("TOKEN_TTL_SECS"), "TOKEN_TTL_SECS", 86_400)),
            initial_credits: parse_or(get("INITIAL_CREDITS"), "INITIAL_CREDITS", DEFAULT_INITIAL_CREDITS),
            store_timeout: Duration::from_millis(parse_or(get("STORE_TIMEOUT_MS"), "STORE_TIMEOUT_MS", 2_000)),
            simulator: SimulatorConfig {
                seed: get("SIM_SEED").and_then(|v| parse_opt(&v, "SIM_SEED")),
                tick_interval: Duration::from_millis(
                    parse_or(get("TICK_INTERVAL_MS"), "TICK_INTERVAL_MS", 2_000u64).max(1),
                ),
                max_move_pct: parse_or(get("SIM_MAX_MOVE_PCT"), "SIM_MAX_MOVE_PCT", defaults.max_move_pct),
                ..defaults
            },
        }
    }
}

fn parse_opt<T: FromStr>(raw: &str, key: &str) -> Option<T> {
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring invalid value key={} value={}", key, raw);
            None
        }
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    raw.and_then(|v| parse_opt(&v, key)).unwrap_or(default)
}
