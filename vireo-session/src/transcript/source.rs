use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use vireo_config::TranscriptSettings;
use vireo_model::{RawTranscript, TranscriptSegment, VideoId, VideoMeta};

use super::parser::TranscriptParser;

/// On-demand transcript lookup by video and locale.
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    /// `Ok(None)` means the video has no transcript in that locale.
    async fn fetch_transcript(
        &self,
        video_id: &VideoId,
        locale: &str,
    ) -> anyhow::Result<Option<RawTranscript>>;
}

/// Where a resolved transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptOrigin {
    Embedded,
    Fetched,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTranscript {
    pub locale: String,
    pub origin: TranscriptOrigin,
    pub segments: Vec<TranscriptSegment>,
    /// The payload the segments were parsed from.
    pub raw: Option<RawTranscript>,
}

impl ResolvedTranscript {
    fn unavailable(locale: String) -> Self {
        Self {
            locale,
            origin: TranscriptOrigin::Unavailable,
            segments: Vec::new(),
            raw: None,
        }
    }

    /// Raw text to show when a transcript exists but yielded no segments.
    pub fn fallback_text(&self) -> Option<String> {
        if !self.segments.is_empty() {
            return None;
        }
        self.raw
            .as_ref()
            .map(RawTranscript::as_text)
            .filter(|text| !text.trim().is_empty())
    }
}

/// Picks the transcript for a session: embedded text first, otherwise a
/// fetch for the best supported locale.
#[derive(Clone)]
pub struct TranscriptResolver {
    parser: TranscriptParser,
    default_locale: String,
    supported_locales: Vec<String>,
    fetcher: Option<Arc<dyn TranscriptFetcher>>,
}

impl std::fmt::Debug for TranscriptResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptResolver")
            .field("default_locale", &self.default_locale)
            .field("supported_locales", &self.supported_locales)
            .field("has_fetcher", &self.fetcher.is_some())
            .finish()
    }
}

impl TranscriptResolver {
    pub fn new(settings: &TranscriptSettings) -> Self {
        Self {
            parser: TranscriptParser::from_settings(settings),
            default_locale: settings.default_locale.clone(),
            supported_locales: settings.supported_locales.clone(),
            fetcher: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn TranscriptFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Map a requested locale onto one the transcript endpoint serves: exact
    /// tag, then primary subtag (`pt-BR` → `pt`), else the default locale.
    pub fn normalize_locale(&self, requested: &str) -> String {
        let requested = requested.trim();
        if let Some(exact) = self
            .supported_locales
            .iter()
            .find(|supported| supported.eq_ignore_ascii_case(requested))
        {
            return exact.clone();
        }

        let primary = primary_subtag(requested);
        if let Some(partial) = self
            .supported_locales
            .iter()
            .find(|supported| supported.eq_ignore_ascii_case(primary))
        {
            return partial.clone();
        }

        self.default_locale.clone()
    }

    /// Never fails: a missing or unreachable transcript resolves to an empty
    /// segment list.
    pub async fn resolve(&self, meta: &VideoMeta, requested: &str) -> ResolvedTranscript {
        let locale = self.normalize_locale(requested);

        let embedded = embedded_for(meta, requested).or_else(|| embedded_for(meta, &locale));
        if let Some((found_locale, raw)) = embedded {
            let segments = self.parser.parse(raw, meta.duration_seconds);
            debug!(
                "[Transcript] Using embedded {} transcript for {} ({} segments)",
                found_locale,
                meta.id,
                segments.len()
            );
            return ResolvedTranscript {
                locale: found_locale,
                origin: TranscriptOrigin::Embedded,
                segments,
                raw: Some(raw.clone()),
            };
        }

        let Some(fetcher) = self.fetcher.as_ref() else {
            return ResolvedTranscript::unavailable(locale);
        };

        match fetcher.fetch_transcript(&meta.id, &locale).await {
            Ok(Some(raw)) => {
                let segments = self.parser.parse(&raw, meta.duration_seconds);
                info!(
                    "[Transcript] Fetched {} transcript for {} ({} segments)",
                    locale,
                    meta.id,
                    segments.len()
                );
                ResolvedTranscript {
                    locale,
                    origin: TranscriptOrigin::Fetched,
                    segments,
                    raw: Some(raw),
                }
            }
            Ok(None) => {
                debug!("[Transcript] No {} transcript for {}", locale, meta.id);
                ResolvedTranscript::unavailable(locale)
            }
            Err(err) => {
                debug!(
                    "[Transcript] Fetch for {} ({}) failed, showing none: {:#}",
                    meta.id, locale, err
                );
                ResolvedTranscript::unavailable(locale)
            }
        }
    }
}

fn primary_subtag(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

fn embedded_for<'a>(meta: &'a VideoMeta, locale: &str) -> Option<(String, &'a RawTranscript)> {
    let exact = meta
        .transcripts
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(locale));
    let found = exact.or_else(|| {
        let primary = primary_subtag(locale);
        meta.transcripts
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(primary))
    });
    found.map(|(key, raw)| (key.clone(), raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use url::Url;
    use vireo_model::BackendConnection;

    struct FakeFetcher {
        calls: Mutex<Vec<String>>,
        result: fn() -> anyhow::Result<Option<RawTranscript>>,
    }

    #[async_trait]
    impl TranscriptFetcher for FakeFetcher {
        async fn fetch_transcript(
            &self,
            _video_id: &VideoId,
            locale: &str,
        ) -> anyhow::Result<Option<RawTranscript>> {
            self.calls.lock().push(locale.to_string());
            (self.result)()
        }
    }

    fn settings() -> TranscriptSettings {
        TranscriptSettings {
            supported_locales: vec!["en".into(), "pt".into()],
            ..TranscriptSettings::default()
        }
    }

    fn meta() -> VideoMeta {
        VideoMeta::new(
            VideoId::new("v-42").expect("id"),
            30.0,
            BackendConnection::Local {
                source: Url::parse("https://cdn.example.com/v-42.mp4").expect("url"),
            },
        )
        .expect("meta")
    }

    #[test]
    fn locale_normalization() {
        let resolver = TranscriptResolver::new(&settings());
        assert_eq!(resolver.normalize_locale("EN"), "en");
        assert_eq!(resolver.normalize_locale("pt-BR"), "pt");
        assert_eq!(resolver.normalize_locale("ja"), "en");
    }

    #[tokio::test]
    async fn embedded_transcript_wins_without_fetch() {
        let fetcher = Arc::new(FakeFetcher {
            calls: Mutex::new(Vec::new()),
            result: || Ok(None),
        });
        let resolver = TranscriptResolver::new(&settings()).with_fetcher(fetcher.clone());
        let meta = meta().with_transcript("pt", "[0:00] Olá".into());

        let resolved = resolver.resolve(&meta, "pt-BR").await;
        assert_eq!(resolved.origin, TranscriptOrigin::Embedded);
        assert_eq!(resolved.segments.len(), 1);
        assert!(fetcher.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn unsupported_locale_fetches_default() {
        let fetcher = Arc::new(FakeFetcher {
            calls: Mutex::new(Vec::new()),
            result: || Ok(Some(RawTranscript::Text("hello".into()))),
        });
        let resolver = TranscriptResolver::new(&settings()).with_fetcher(fetcher.clone());

        let resolved = resolver.resolve(&meta(), "ja").await;
        assert_eq!(resolved.origin, TranscriptOrigin::Fetched);
        assert_eq!(resolved.locale, "en");
        assert_eq!(*fetcher.calls.lock(), vec!["en".to_string()]);
    }

    #[tokio::test]
    async fn fetch_failure_means_no_transcript() {
        let fetcher = Arc::new(FakeFetcher {
            calls: Mutex::new(Vec::new()),
            result: || Err(anyhow::anyhow!("connection refused")),
        });
        let resolver = TranscriptResolver::new(&settings()).with_fetcher(fetcher);

        let resolved = resolver.resolve(&meta(), "en").await;
        assert_eq!(resolved.origin, TranscriptOrigin::Unavailable);
        assert!(resolved.segments.is_empty());
    }

    #[tokio::test]
    async fn unparseable_fetch_keeps_raw_text_for_fallback() {
        let fetcher = Arc::new(FakeFetcher {
            calls: Mutex::new(Vec::new()),
            result: || {
                Ok(Some(RawTranscript::Text(
                    "00:00:05.000 --> 00:00:02.000\nbackwards\n".into(),
                )))
            },
        });
        let resolver = TranscriptResolver::new(&settings()).with_fetcher(fetcher);

        let resolved = resolver.resolve(&meta(), "en").await;
        assert_eq!(resolved.origin, TranscriptOrigin::Fetched);
        assert!(resolved.segments.is_empty());
        assert_eq!(
            resolved.fallback_text().as_deref(),
            Some("00:00:05.000 --> 00:00:02.000\nbackwards\n")
        );
    }

    #[tokio::test]
    async fn parsed_transcript_needs_no_fallback() {
        let resolver = TranscriptResolver::new(&settings());
        let meta = meta().with_transcript("en", "[0:00] Hello".into());

        let resolved = resolver.resolve(&meta, "en").await;
        assert_eq!(resolved.segments.len(), 1);
        assert_eq!(resolved.fallback_text(), None);
        assert_eq!(resolved.raw, Some(RawTranscript::from("[0:00] Hello")));
    }
}
