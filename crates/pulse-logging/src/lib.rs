//! # pulse-logging
//!
//! Installs the global `tracing` subscriber. Output goes to stderr so the
//! report on stdout stays clean.
//!
//! Filter precedence: `RUST_LOG` (when set and valid) wins over the
//! configured default level and per-module overrides.

#![deny(unsafe_code)]

use pulse_settings::LoggingSettings;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Runtime logging configuration.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Default log level.
    pub level: Level,
    /// Per-module level overrides (e.g. `pulse_crm` => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            module_levels: Vec::new(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Build from settings. Unparseable levels fall back to `info` (or are
    /// dropped, for module overrides) with a note on stderr, since the
    /// subscriber is not installed yet.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        let level = parse_level(&settings.level).unwrap_or_else(|| {
            eprintln!("pulse-logging: unknown level {:?}, using info", settings.level);
            Level::INFO
        });
        let module_levels = settings
            .modules
            .iter()
            .filter_map(|(module, raw)| match parse_level(raw) {
                Some(level) => Some((module.clone(), level)),
                None => {
                    eprintln!("pulse-logging: unknown level {raw:?} for {module}, ignoring");
                    None
                }
            })
            .collect();
        Self {
            level,
            module_levels,
            json: settings.json,
        }
    }

    /// `EnvFilter` directive string for this config, e.g. `info,pulse_crm=debug`.
    pub fn filter_directives(&self) -> String {
        let mut filter = self.level.to_string().to_lowercase();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Parse a level name case-insensitively.
pub fn parse_level(raw: &str) -> Option<Level> {
    raw.trim().parse::<Level>().ok()
}

/// Initialize the global subscriber. Call once at startup.
///
/// Returns `false` when a subscriber was already installed (e.g. in tests).
pub fn init_logging(config: &LoggingConfig) -> bool {
    let directives = config.filter_directives();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
