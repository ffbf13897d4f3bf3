//! Shared configuration library for Vireo.
//!
//! Centralizes the playback policy knobs (resume timeout, seek settle delay,
//! save cadence, completion threshold, transcript locales, ...) together with
//! file/env loading and validation, so the session crate and its binaries
//! read a single source of truth for defaults.

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigSource};
pub use models::{
    ApiSettings, BridgeSettings, PersistenceSettings, ResumeSettings,
    SessionConfig, TranscriptSettings, ViewSettings,
};
pub use validation::{ConfigError, ConfigWarning};
