use crate::error::ModelError;
use uuid::Uuid;

/// Identifier of a video as handed to us by the catalog.
///
/// The catalog owns the format; we only require it to be non-blank so it can
/// be used as a path segment and a log key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct VideoId(String);

impl VideoId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ModelError::InvalidId("video id is blank".into()));
        }
        if trimmed.contains('/') {
            return Err(ModelError::InvalidId(format!(
                "video id `{trimmed}` contains a path separator"
            )));
        }
        Ok(VideoId(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one playback session (one mounted video view).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionId(pub Uuid);

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Short form used in log lines.
    pub fn short(&self) -> String {
        let mut rendered = self.0.simple().to_string();
        rendered.truncate(8);
        rendered
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_is_trimmed() {
        let id = VideoId::new("  abc-123 ").expect("valid id");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn video_id_rejects_blank_and_separators() {
        assert!(VideoId::new("   ").is_err());
        assert!(VideoId::new("a/b").is_err());
    }

    #[test]
    fn session_id_short_form_is_eight_chars() {
        assert_eq!(SessionId::new().short().len(), 8);
    }
}
