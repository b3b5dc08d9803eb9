//! Subscriber setup shared by everything that embeds the simulator.
//!
//! `spirsim-core` only emits `tracing` events: invalid memory accesses and
//! misaligned atomics at `error`, printf sink failures at `warn`, buffer
//! lifecycle and recovered builtin errors at `debug`, per-call timings at
//! `trace`. This crate decides where those events go.
//!
//! | Variable                     | Meaning                                   |
//! |------------------------------|-------------------------------------------|
//! | `SPIRSIM_TRACING_PROFILE`    | `local` (default), `ci` or `test`         |
//! | `SPIRSIM_TRACING_DIRECTIVES` | filter directives, e.g. `spirsim_core=debug` |
//! | `SPIRSIM_TRACING_FORMAT`     | `pretty`, `compact` or `json`             |
//! | `RUST_LOG`                   | used when no directives are configured    |

#[macro_use]
pub mod macros;

use std::env;
pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

const PROFILE_VAR: &str = "SPIRSIM_TRACING_PROFILE";
const DIRECTIVES_VAR: &str = "SPIRSIM_TRACING_DIRECTIVES";
const FORMAT_VAR: &str = "SPIRSIM_TRACING_FORMAT";

// ================================================================================================
// Configuration
// ================================================================================================

/// Preset bundles of [`TracingConfig`] settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Profile {
    /// Interactive runs: pretty, coloured, warnings and above.
    #[default]
    Local,
    /// Log collection: JSON without colour codes.
    Ci,
    /// Test binaries: compact and verbose.
    Test,
}

impl Profile {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ci" => Self::Ci,
            "test" => Self::Test,
            _ => Self::Local,
        }
    }
}

/// How formatted events are laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Subscriber settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracingConfig {
    /// Filter directives. `None` defers to `RUST_LOG`, then to `fallback`.
    pub directives: Option<String>,
    /// Directive used when nothing else yields a filter.
    pub fallback: String,
    pub format: LogFormat,
    pub ansi: bool,
    /// Print event targets (module paths).
    pub targets: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_profile(Profile::Local)
    }
}

impl TracingConfig {
    pub fn for_profile(profile: Profile) -> Self {
        let (fallback, format, ansi) = match profile {
            Profile::Local => ("warn", LogFormat::Pretty, true),
            Profile::Ci => ("warn", LogFormat::Json, false),
            Profile::Test => ("debug", LogFormat::Compact, false),
        };
        Self {
            directives: None,
            fallback: fallback.to_string(),
            format,
            ansi,
            targets: true,
        }
    }

    pub fn for_local() -> Self {
        Self::for_profile(Profile::Local)
    }

    pub fn for_ci() -> Self {
        Self::for_profile(Profile::Ci)
    }

    pub fn for_tests() -> Self {
        Self::for_profile(Profile::Test)
    }

    /// Configuration from the `SPIRSIM_TRACING_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Configuration from an arbitrary variable source.
    ///
    /// Blank directives and unknown formats are ignored. JSON output never
    /// carries colour codes.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let profile = lookup(PROFILE_VAR).map(|p| Profile::from_name(&p)).unwrap_or_default();
        let mut config = Self::for_profile(profile);

        config.directives = lookup(DIRECTIVES_VAR).filter(|d| !d.trim().is_empty());
        if let Some(format) = lookup(FORMAT_VAR).and_then(|f| LogFormat::from_name(&f)) {
            config.format = format;
        }
        if config.format == LogFormat::Json {
            config.ansi = false;
        }
        config
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter {
                directives: directives.clone(),
                reason: err.to_string(),
            }),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.fallback))),
        }
    }
}

// ================================================================================================
// Installation
// ================================================================================================

/// Failures while installing a subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    #[error("invalid tracing directives `{directives}`: {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("a global tracing subscriber is already installed: {0}")]
    SubscriberInit(#[from] TryInitError),
}

fn format_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_fmt::layer().with_target(config.targets);
    match config.format {
        LogFormat::Pretty => Box::new(layer.pretty().with_ansi(config.ansi)),
        LogFormat::Compact => Box::new(layer.compact().with_ansi(config.ansi)),
        LogFormat::Json => Box::new(layer.json().with_ansi(false)),
    }
}

/// Subscriber for `config`, not yet installed.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = config.env_filter()?;
    Ok(Registry::default().with(format_layer(config)).with(filter))
}

/// Install the subscriber for `config` as the global default.
pub fn try_init_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    build_subscriber(config)?.try_init()?;
    Ok(())
}

/// Install a subscriber configured from the environment.
///
/// Meant to be called once at host start-up; an existing subscriber wins.
pub fn init_tracing() {
    if let Err(err) = try_init_tracing(&TracingConfig::from_env()) {
        eprintln!("spirsim-tracing: {err}");
    }
}

/// Route events into libtest's captured output. Repeated calls are no-ops.
pub fn init_test_tracing() {
    let Ok(filter) = TracingConfig::for_tests().env_filter() else {
        return;
    };
    let _ = tracing_fmt()
        .compact()
        .with_ansi(false)
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}
