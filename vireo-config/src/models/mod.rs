use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level playback session settings. Every section and field falls back
/// to its default, so a config file only needs the values it changes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub resume: ResumeSettings,
    pub persistence: PersistenceSettings,
    pub transcript: TranscriptSettings,
    pub view: ViewSettings,
    pub bridge: BridgeSettings,
    pub api: ApiSettings,
}

/// Resume-from-saved-position policy.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResumeSettings {
    /// Resume from saved progress at all. When off, every session starts
    /// from the beginning.
    pub enabled: bool,
    /// How long (ms) to wait for saved progress once the backend is ready
    /// before starting from the beginning anyway.
    pub timeout_ms: u64,
    /// Delay (ms) between issuing a seek and issuing play. Backends give no
    /// seek acknowledgement, so this is a grace period, not a guarantee.
    pub seek_settle_ms: u64,
    /// Saved progress at or above this percentage is treated as finished and
    /// playback starts from the beginning.
    pub max_resume_percent: f64,
}

impl Default for ResumeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 3_000,
            seek_settle_ms: 100,
            max_resume_percent: 90.0,
        }
    }
}

impl ResumeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn seek_settle(&self) -> Duration {
        Duration::from_millis(self.seek_settle_ms)
    }
}

/// Watch-progress persistence cadence.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Seconds of playback movement since the last save that arm a new save.
    pub save_every_secs: f64,
    /// Trailing window (ms) that coalesces a burst of updates into one write.
    pub debounce_ms: u64,
    /// Percentage at or above which a video is reported as completed.
    pub completion_percent: f64,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            save_every_secs: 5.0,
            debounce_ms: 1_000,
            completion_percent: 90.0,
        }
    }
}

impl PersistenceSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Transcript parsing and locale selection.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Untimed lines keep merging into the previous segment while its text
    /// is shorter than this many characters.
    pub merge_threshold_chars: usize,
    /// Locale used when the requested one is not supported.
    pub default_locale: String,
    /// Locales the transcript endpoint can serve.
    pub supported_locales: Vec<String>,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            merge_threshold_chars: 200,
            default_locale: "en".to_string(),
            supported_locales: vec!["en".to_string()],
        }
    }
}

/// View synchronization timings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewSettings {
    /// Settle delay (ms) before scrolling the active segment into view.
    pub scroll_settle_ms: u64,
    /// Position sampling interval (ms) for locally owned media.
    pub local_tick_ms: u64,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            scroll_settle_ms: 50,
            local_tick_ms: 250,
        }
    }
}

impl ViewSettings {
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn local_tick(&self) -> Duration {
        Duration::from_millis(self.local_tick_ms.max(1))
    }
}

/// Remote player bridge settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// How long (ms) a callback-style query waits for its reply.
    pub reply_timeout_ms: u64,
    /// Capacity of the per-session event fan-out channel.
    pub event_capacity: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 2_000,
            event_capacity: 256,
        }
    }
}

impl BridgeSettings {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// Progress/transcript API endpoint settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let config = SessionConfig::default();
        assert_eq!(config.resume.timeout(), Duration::from_secs(3));
        assert_eq!(config.resume.seek_settle(), Duration::from_millis(100));
        assert_eq!(config.resume.max_resume_percent, 90.0);
        assert_eq!(config.persistence.save_every_secs, 5.0);
        assert_eq!(config.persistence.debounce(), Duration::from_secs(1));
        assert_eq!(config.view.scroll_settle(), Duration::from_millis(50));
        assert_eq!(config.transcript.merge_threshold_chars, 200);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: SessionConfig = toml::from_str(
            r#"
            [resume]
            timeout_ms = 1500

            [transcript]
            supported_locales = ["en", "pt"]
            "#,
        )
        .expect("parse");

        assert_eq!(config.resume.timeout_ms, 1_500);
        assert_eq!(config.resume.seek_settle_ms, 100);
        assert_eq!(config.transcript.supported_locales, vec!["en", "pt"]);
        assert_eq!(config.transcript.default_locale, "en");
    }
}
