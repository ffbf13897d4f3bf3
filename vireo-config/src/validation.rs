//! Guard rails for policy values

use thiserror::Error;
use url::Url;

use crate::models::SessionConfig;

/// A configuration value that would make the session misbehave.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be a percentage in (0, 100], got {value}")]
    Percentage { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    NonPositive { field: &'static str },

    #[error("default locale `{0}` is not blank-free")]
    BlankLocale(String),

    #[error("api.base_url `{url}` is not a valid http(s) url: {reason}")]
    BaseUrl { url: String, reason: String },
}

/// A value that is legal but probably not what the operator meant.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigWarning {
    pub field: &'static str,
    pub message: String,
}

impl SessionConfig {
    /// Check every section, returning soft warnings on success.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        check_percentage("resume.max_resume_percent", self.resume.max_resume_percent)?;
        check_percentage(
            "persistence.completion_percent",
            self.persistence.completion_percent,
        )?;

        if !(self.persistence.save_every_secs.is_finite()
            && self.persistence.save_every_secs > 0.0)
        {
            return Err(ConfigError::NonPositive {
                field: "persistence.save_every_secs",
            });
        }
        if self.transcript.merge_threshold_chars == 0 {
            return Err(ConfigError::NonPositive {
                field: "transcript.merge_threshold_chars",
            });
        }
        if self.bridge.event_capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "bridge.event_capacity",
            });
        }

        let locale = self.transcript.default_locale.trim();
        if locale.is_empty() || locale.contains(char::is_whitespace) {
            return Err(ConfigError::BlankLocale(
                self.transcript.default_locale.clone(),
            ));
        }

        if let Some(raw) = self.api.base_url.as_deref() {
            let parsed = Url::parse(raw).map_err(|err| ConfigError::BaseUrl {
                url: raw.to_string(),
                reason: err.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::BaseUrl {
                    url: raw.to_string(),
                    reason: format!("unsupported scheme {}", parsed.scheme()),
                });
            }
        }

        let mut warnings = Vec::new();
        if !self
            .transcript
            .supported_locales
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(locale))
        {
            warnings.push(ConfigWarning {
                field: "transcript.default_locale",
                message: format!(
                    "default locale `{locale}` is not in supported_locales; fallback fetches may 404"
                ),
            });
        }
        if self.resume.timeout_ms == 0 {
            warnings.push(ConfigWarning {
                field: "resume.timeout_ms",
                message: "zero timeout never waits for saved progress".into(),
            });
        }
        if self.resume.seek_settle_ms == 0 {
            warnings.push(ConfigWarning {
                field: "resume.seek_settle_ms",
                message: "play may race the seek on remote players".into(),
            });
        }

        Ok(warnings)
    }
}

fn check_percentage(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(ConfigError::Percentage { field, value })
    }
}
