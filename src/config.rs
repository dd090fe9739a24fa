use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Labsight";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Model label stamped on every diagnostic analysis.
pub const AI_MODEL_TAG: &str = "gemini-1.5-flash";

/// Attribution headers sent with every completion request.
pub const APP_REFERER: &str = "https://labsight.local";
pub const APP_TITLE: &str = "Labsight Diagnostic Insights";

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-exp:free";
/// Per-request timeout for downloads and completions.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_BASE_URL: &str = "OPENROUTER_BASE_URL";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_TIMEOUT: &str = "LABSIGHT_HTTP_TIMEOUT_SECS";
pub const ENV_TESSDATA: &str = "TESSDATA_PREFIX";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set; the completion service cannot be reached without it")]
    MissingCredential(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Process-wide settings, read once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub api_key: String,
    pub llm_base_url: String,
    pub model: String,
    pub http_timeout_secs: u64,
    pub tessdata_dir: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(ENV_API_KEY).ok_or(ConfigError::MissingCredential(ENV_API_KEY))?;

        let http_timeout_secs = match get(ENV_TIMEOUT) {
            None => DEFAULT_TIMEOUT_SECS,
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: ENV_TIMEOUT,
                        reason: "must be greater than zero".into(),
                    })
                }
                Ok(secs) => secs,
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: ENV_TIMEOUT,
                        reason: e.to_string(),
                    })
                }
            },
        };

        let llm_base_url = get(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !(llm_base_url.starts_with("http://") || llm_base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: ENV_BASE_URL,
                reason: format!("expected an http(s) URL, got {llm_base_url}"),
            });
        }

        Ok(Self {
            api_key,
            llm_base_url,
            model: get(ENV_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            http_timeout_secs,
            tessdata_dir: get(ENV_TESSDATA).map(PathBuf::from),
        })
    }
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,labsight=debug"
    } else {
        "info"
    }
}
