//! Runtime configuration
//!
//! Settings that vary per deployment: where students join from, and the
//! defaults applied to questions and leaderboards.

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Join URL base used when nothing is configured
pub const DEFAULT_CLIENT_URL: &str = "http://localhost:5173";

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the student client, the join URL is `{client_url}/join/{code}`
    #[garde(length(min = 1))]
    pub client_url: String,
    /// Time limit in seconds applied to questions added without one
    #[garde(range(
        min = constants::question::MIN_TIME_LIMIT,
        max = constants::question::MAX_TIME_LIMIT
    ))]
    pub default_time_limit: u32,
    /// Number of entries on the shared leaderboard
    #[garde(range(min = 1, max = constants::leaderboard::MAX_TOP_N))]
    pub leaderboard_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_url: DEFAULT_CLIENT_URL.to_owned(),
            default_time_limit: constants::question::DEFAULT_TIME_LIMIT,
            leaderboard_size: constants::leaderboard::DEFAULT_TOP_N,
        }
    }
}

/// Trims a configured URL and strips trailing slashes
///
/// Blank values fall back to `fallback`.
pub fn sanitize_url(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(cleaned) if !cleaned.is_empty() => {
            let normalized = cleaned.trim_end_matches('/');
            if normalized.is_empty() {
                fallback.to_owned()
            } else {
                normalized.to_owned()
            }
        }
        _ => fallback.to_owned(),
    }
}

impl Config {
    /// Reads the configuration from environment variables
    ///
    /// * `CLIENT_URL` - base of the join URL
    /// * `QUIZ_DEFAULT_TIME_LIMIT` - default question time limit in seconds
    /// * `QUIZ_LEADERBOARD_SIZE` - shared leaderboard size
    ///
    /// Unparsable numbers are ignored and the default is kept.
    ///
    /// # Errors
    ///
    /// Returns the validation report if the resulting configuration is out
    /// of bounds.
    pub fn from_env() -> Result<Self, garde::Report> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    ///
    /// # Errors
    ///
    /// Returns the validation report if the resulting configuration is out
    /// of bounds.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, garde::Report> {
        let defaults = Self::default();

        let config = Self {
            client_url: sanitize_url(lookup("CLIENT_URL").as_deref(), &defaults.client_url),
            default_time_limit: lookup("QUIZ_DEFAULT_TIME_LIMIT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.default_time_limit),
            leaderboard_size: lookup("QUIZ_LEADERBOARD_SIZE")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.leaderboard_size),
        };

        config.validate()?;

        Ok(config)
    }

    /// Builds the URL students open to join a session
    pub fn join_url(&self, code: &str) -> String {
        format!("{}/join/{code}", self.client_url)
    }
}
