//! Watch progress records
//!
//! Two shapes travel over the wire:
//!
//! - [`SavedProgress`] is what the progress-read endpoint returns for the
//!   current user and video. It is fetched once per session.
//! - [`ProgressUpdate`] is the body of the progress-write endpoint. It always
//!   carries the absolute watched position, never a delta, so replayed or
//!   reordered writes converge (last write wins).

/// Saved watch progress for one (user, video) pair.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct SavedProgress {
    #[cfg_attr(feature = "serde", serde(alias = "time_watched"))]
    pub watched_seconds: f64,
    #[cfg_attr(feature = "serde", serde(alias = "progress_percentage"))]
    pub percentage: f64,
    #[cfg_attr(feature = "serde", serde(default, alias = "is_completed"))]
    pub completed: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub liked: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub disliked: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub favorite: bool,
}

impl SavedProgress {
    pub fn at(watched_seconds: f64, percentage: f64) -> Self {
        Self {
            watched_seconds,
            percentage,
            completed: false,
            ..Self::default()
        }
    }
}

/// Body of the progress-write endpoint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressUpdate {
    pub time_watched: f64,
    pub video_duration: f64,
    pub progress_percentage: f64,
    pub is_completed: bool,
}

impl ProgressUpdate {
    /// Build an update from an absolute position.
    ///
    /// `completion_percent` is the percentage at or above which the video
    /// counts as completed.
    pub fn from_position(
        watched_seconds: f64,
        duration_seconds: f64,
        completion_percent: f64,
    ) -> Self {
        let watched = if watched_seconds.is_finite() {
            watched_seconds.max(0.0)
        } else {
            0.0
        };
        let percentage = if duration_seconds > 0.0 {
            (watched / duration_seconds * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        };

        Self {
            time_watched: watched,
            video_duration: duration_seconds.max(0.0),
            progress_percentage: percentage,
            is_completed: percentage >= completion_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_and_completion_follow_threshold() {
        let update = ProgressUpdate::from_position(540.0, 600.0, 90.0);
        assert_eq!(update.progress_percentage, 90.0);
        assert!(update.is_completed);

        let update = ProgressUpdate::from_position(120.0, 600.0, 90.0);
        assert_eq!(update.progress_percentage, 20.0);
        assert!(!update.is_completed);
    }

    #[test]
    fn zero_duration_yields_zero_percent() {
        let update = ProgressUpdate::from_position(12.0, 0.0, 90.0);
        assert_eq!(update.progress_percentage, 0.0);
        assert!(!update.is_completed);
    }

    #[test]
    fn overshoot_is_clamped() {
        let update = ProgressUpdate::from_position(700.0, 600.0, 90.0);
        assert_eq!(update.progress_percentage, 100.0);
        assert_eq!(update.time_watched, 700.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn saved_progress_accepts_write_endpoint_names() {
        let raw = r#"{"time_watched": 120.5, "progress_percentage": 20.0, "is_completed": false, "favorite": true}"#;
        let progress: SavedProgress =
            serde_json::from_str(raw).expect("deserialize");
        assert_eq!(progress.watched_seconds, 120.5);
        assert_eq!(progress.percentage, 20.0);
        assert!(progress.favorite);
        assert!(!progress.liked);
    }
}
