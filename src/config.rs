//! Configuration loaded from environment variables.
//!
//! Every setting has a default so the ledger works locally with no
//! configuration. Only slip verification needs real credentials.

use std::path::PathBuf;
use std::time::Duration;

/// Settings for the remote slip oracle.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Env: `EASYSLIP_API_URL`
    pub base_url: Option<String>,

    /// Bearer token.
    /// Env: `EASYSLIP_API_TOKEN`
    pub token: Option<String>,

    /// Client-side request timeout.
    /// Env: `EASYSLIP_TIMEOUT_SECS`
    /// Default: 10 seconds
    pub timeout: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database file.
    /// Env: `DB_PATH`
    /// Default: `data/subshare.db`
    pub database_path: PathBuf,

    /// Currency stamped on bills opened by a cycle rollover.
    /// Env: `SUBSHARE_CURRENCY`
    /// Default: `THB`
    pub currency: String,

    /// How often the rollover task checks the calendar.
    /// Env: `ROLLOVER_CHECK_SECS`
    /// Default: one hour
    pub rollover_check_period: Duration,

    pub oracle: OracleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data").join("subshare.db"),
            currency: "THB".to_string(),
            rollover_check_period: Duration::from_secs(60 * 60),
            oracle: OracleConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("DB_PATH").filter(|p| !p.is_empty()) {
            config.database_path = PathBuf::from(path);
        }

        if let Some(currency) = lookup("SUBSHARE_CURRENCY").filter(|c| !c.is_empty()) {
            config.currency = currency;
        }

        if let Some(val) = lookup("ROLLOVER_CHECK_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.rollover_check_period = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid ROLLOVER_CHECK_SECS, using default"),
            }
        }

        config.oracle.base_url = lookup("EASYSLIP_API_URL").filter(|u| !u.is_empty());
        config.oracle.token = lookup("EASYSLIP_API_TOKEN").filter(|t| !t.is_empty());

        if let Some(val) = lookup("EASYSLIP_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) if secs > 0 => config.oracle.timeout = Duration::from_secs(secs),
                _ => tracing::warn!(value = %val, "Invalid EASYSLIP_TIMEOUT_SECS, using default"),
            }
        }

        config
    }
}
