//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`PulseSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `PULSE_*` environment overrides (highest priority)
//! 4. Validate
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::PulseSettings;

/// Resolve the default settings file (`~/.pulse/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pulse").join("settings.json")
}

/// Load settings from the default path with env overrides.
pub fn load_settings() -> Result<PulseSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env overrides.
///
/// A missing file yields defaults; invalid JSON or invalid values are errors.
pub fn load_settings_from_path(path: &Path) -> Result<PulseSettings> {
    let invalid = |source: serde_json::Error| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    };
    let defaults = serde_json::to_value(PulseSettings::default()).map_err(invalid)?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(invalid)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PulseSettings = serde_json::from_value(merged).map_err(invalid)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (falling back to file/default).
pub fn apply_env_overrides(settings: &mut PulseSettings) {
    // ── API / pacing ────────────────────────────────────────────────
    if let Some(v) = read_env_string("PULSE_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = read_env_u64("PULSE_TIMEOUT_SECS", 1, 600) {
        settings.api.timeout_secs = v;
    }
    if let Some(v) = read_env_u64("PULSE_DELAY_MS", 0, 60_000) {
        settings.pacing.delay_ms = v;
    }

    // ── Contacts ────────────────────────────────────────────────────
    if let Some(v) = read_env_usize("PULSE_MAX_CONTACTS", 1, 10_000_000) {
        settings.contacts.max_contacts = Some(v);
    }

    // ── Features ────────────────────────────────────────────────────
    if let Some(v) = read_env_bool("PULSE_DEALS") {
        settings.features.deals = v;
    }
    if let Some(v) = read_env_bool("PULSE_EMAILS") {
        settings.features.emails = v;
    }
    if let Some(v) = read_env_bool("PULSE_FORM_SUBMISSIONS") {
        settings.features.form_submissions = v;
    }
    if let Some(v) = read_env_bool("PULSE_ENGAGEMENT") {
        settings.features.engagement = v;
    }

    // ── Submissions ─────────────────────────────────────────────────
    if let Some(v) = read_env_string("PULSE_CACHE_PATH") {
        settings.submissions.cache_path = v;
    }
    if let Some(v) = read_env_usize("PULSE_CONCURRENCY", 1, 64) {
        settings.submissions.concurrency = v;
    }
    if let Some(v) = read_env_usize("PULSE_MAX_PER_FORM", 1, 1_000_000) {
        settings.submissions.max_per_form = v;
    }
    if let Some(v) = read_env_usize("PULSE_MAX_FORMS", 1, 100_000) {
        settings.submissions.max_forms = Some(v);
    }
    if let Some(v) = read_env_u64("PULSE_MAX_AGE_MONTHS", 1, 600) {
        settings.submissions.max_age_months = Some(v as u32);
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("PULSE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("PULSE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
