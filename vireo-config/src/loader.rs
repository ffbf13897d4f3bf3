use anyhow::{Context, anyhow};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use crate::models::SessionConfig;
use crate::util::{duration_to_millis, parse_bool, parse_csv, parse_duration};

pub const CONFIG_PATH_VAR: &str = "VIREO_CONFIG_PATH";
pub const CONFIG_JSON_VAR: &str = "VIREO_CONFIG_JSON";
pub const AUTO_RESUME_VAR: &str = "VIREO_AUTO_RESUME";
pub const RESUME_TIMEOUT_VAR: &str = "VIREO_RESUME_TIMEOUT";
pub const SEEK_SETTLE_VAR: &str = "VIREO_SEEK_SETTLE";
pub const SAVE_DEBOUNCE_VAR: &str = "VIREO_SAVE_DEBOUNCE";
pub const SUPPORTED_LOCALES_VAR: &str = "VIREO_SUPPORTED_LOCALES";
pub const DEFAULT_LOCALE_VAR: &str = "VIREO_DEFAULT_LOCALE";
pub const API_BASE_URL_VAR: &str = "VIREO_API_BASE_URL";

/// Source that produced the session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    EnvInline,
    File(PathBuf),
}

/// A loaded configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: SessionConfig,
    pub source: ConfigSource,
    /// Whether a `.env` file was found and applied before reading variables.
    pub env_file_loaded: bool,
    /// Names of the environment variables that overrode file values.
    pub overrides: Vec<&'static str>,
}

impl SessionConfig {
    /// Load session configuration from the process environment.
    ///
    /// Evaluation order:
    /// 1) `$VIREO_CONFIG_PATH` (TOML or JSON file),
    /// 2) `$VIREO_CONFIG_JSON` (inline JSON),
    /// 3) `vireo.toml`, `vireo.json` or `config/vireo.toml` in the working
    ///    directory,
    /// 4) defaults.
    ///
    /// Individual `VIREO_*` variables are applied on top of whichever source
    /// won. A `.env` file is honoured when present.
    pub fn load_from_env() -> anyhow::Result<ConfigLoad> {
        let env_file_loaded = dotenvy::dotenv().is_ok();
        let mut load = Self::load_with(|key| env::var(key).ok(), Path::new("."))?;
        load.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`SessionConfig::load_from_env`] but reads variables through
    /// `lookup` and searches default files under `search_root`.
    pub fn load_with<F>(lookup: F, search_root: &Path) -> anyhow::Result<ConfigLoad>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank =
            |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let (mut config, source) = if let Some(path_str) = non_blank(CONFIG_PATH_VAR) {
            let path = PathBuf::from(path_str);
            (Self::load_from_file(&path)?, ConfigSource::EnvPath(path))
        } else if let Some(raw) = non_blank(CONFIG_JSON_VAR) {
            let parsed = Self::parse_json(&raw)
                .with_context(|| format!("failed to parse {CONFIG_JSON_VAR}"))?;
            (parsed, ConfigSource::EnvInline)
        } else if let Some(path) = Self::find_default_file(search_root) {
            (Self::load_from_file(&path)?, ConfigSource::File(path))
        } else {
            (Self::default(), ConfigSource::Default)
        };

        let overrides = config.apply_env_overrides(&non_blank)?;

        info!(
            source = ?source,
            overrides = ?overrides,
            "session configuration loaded"
        );

        Ok(ConfigLoad {
            config,
            source,
            env_file_loaded: false,
            overrides,
        })
    }

    fn apply_env_overrides(
        &mut self,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Vec<&'static str>> {
        let mut applied = Vec::new();

        if let Some(raw) = lookup(AUTO_RESUME_VAR) {
            self.resume.enabled = parse_bool(&raw).ok_or_else(|| {
                anyhow!("{AUTO_RESUME_VAR} must be a boolean, got `{raw}`")
            })?;
            applied.push(AUTO_RESUME_VAR);
        }

        for (var, slot) in [
            (RESUME_TIMEOUT_VAR, &mut self.resume.timeout_ms),
            (SEEK_SETTLE_VAR, &mut self.resume.seek_settle_ms),
            (SAVE_DEBOUNCE_VAR, &mut self.persistence.debounce_ms),
        ] {
            if let Some(raw) = lookup(var) {
                let duration = parse_duration(&raw).ok_or_else(|| {
                    anyhow!("{var} must be a duration like `3s` or `150ms`, got `{raw}`")
                })?;
                *slot = duration_to_millis(duration);
                applied.push(var);
            }
        }

        if let Some(raw) = lookup(SUPPORTED_LOCALES_VAR) {
            let locales = parse_csv(&raw);
            if locales.is_empty() {
                warn!("{SUPPORTED_LOCALES_VAR} is set but lists no locales; ignoring");
            } else {
                self.transcript.supported_locales = locales;
                applied.push(SUPPORTED_LOCALES_VAR);
            }
        }

        if let Some(raw) = lookup(DEFAULT_LOCALE_VAR) {
            self.transcript.default_locale = raw.trim().to_string();
            applied.push(DEFAULT_LOCALE_VAR);
        }

        if let Some(raw) = lookup(API_BASE_URL_VAR) {
            self.api.base_url = Some(raw.trim().trim_end_matches('/').to_string());
            applied.push(API_BASE_URL_VAR);
        }

        Ok(applied)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| {
            format!("failed to read session config from {}", path.display())
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::parse_json(&contents).with_context(|| {
                format!("invalid session config {}", path.display())
            }),
            Some("toml") | Some("tml") => toml::from_str(&contents).map_err(|err| {
                anyhow!("invalid session config {}: {}", path.display(), err)
            }),
            _ => Self::parse_from_str(&contents, &path.display().to_string()),
        }
    }

    pub fn parse_from_str(contents: &str, origin: &str) -> anyhow::Result<Self> {
        // TOML first, then JSON.
        toml::from_str(contents).or_else(|toml_err| {
            serde_json::from_str(contents).map_err(|json_err| {
                anyhow!(
                    "failed to parse session config {}: toml error: {}; json error: {}",
                    origin,
                    toml_err,
                    json_err
                )
            })
        })
    }

    pub fn parse_json(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| anyhow!("invalid session config json: {err}"))
    }

    fn find_default_file(root: &Path) -> Option<PathBuf> {
        const CANDIDATES: &[&str] =
            &["vireo.toml", "vireo.json", "config/vireo.toml", "config/vireo.json"];

        CANDIDATES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.exists())
    }
}
