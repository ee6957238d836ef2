//! Shared tracing configuration for the stride workspace.
//!
//! Benchmarks, integration tests and host programs embedding the descriptor
//! runtime install their `tracing` subscriber through this crate so the
//! logging surface (filters, output format, span events) stays the same
//! everywhere.
//!
//! ```no_run
//! use stride_tracing::{init_global_tracing, TracingConfig};
//!
//! init_global_tracing(&TracingConfig::from_env()).expect("subscriber");
//! tracing::info!("descriptor runtime ready");
//! ```

use std::env;

pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Environment variable selecting the preset (`local`, `ci` or `test`).
pub const ENV_PROFILE: &str = "STRIDE_TRACING_PROFILE";
/// Environment variable overriding the filter directives.
pub const ENV_DIRECTIVES: &str = "STRIDE_TRACING_DIRECTIVES";
/// Environment variable selecting the output format.
pub const ENV_FORMAT: &str = "STRIDE_TRACING_FORMAT";
/// Environment variable toggling event targets in the output.
pub const ENV_TARGETS: &str = "STRIDE_TRACING_TARGETS";

/// How the shared subscriber should behave.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Explicit filter directives (e.g. `stride_core=debug`). When absent the
    /// filter comes from `RUST_LOG`, then from [`TracingConfig::default_directive`].
    pub directives: Option<String>,
    /// Directive used when nothing else resolves to a valid filter.
    pub default_directive: String,
    /// Whether event targets (module paths) are printed.
    pub include_targets: bool,
    /// ANSI colouring. Always off for JSON output.
    pub ansi: bool,
    /// Span lifecycle events to emit.
    pub span_events: FmtSpan,
    /// Formatter used for events.
    pub output: TracingOutput,
    /// Route output through libtest's capture instead of stderr.
    pub test_writer: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Pretty, coloured output for local development.
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Pretty,
            test_writer: false,
        }
    }

    /// JSON lines without colour, for CI and log collectors.
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Json,
            test_writer: false,
        }
    }

    /// Compact output captured per test, with the runtime at debug level.
    pub fn for_tests() -> Self {
        Self {
            directives: None,
            default_directive: "stride_core=debug,info".to_string(),
            include_targets: true,
            ansi: false,
            span_events: FmtSpan::NONE,
            output: TracingOutput::Compact,
            test_writer: true,
        }
    }

    /// Build a configuration from the `STRIDE_TRACING_*` environment variables.
    ///
    /// - `STRIDE_TRACING_PROFILE` - `local` (default), `ci` or `test`
    /// - `STRIDE_TRACING_DIRECTIVES` - overrides the filter directives
    /// - `STRIDE_TRACING_FORMAT` - `pretty`, `compact` or `json`
    /// - `STRIDE_TRACING_TARGETS` - `true`/`false`
    pub fn from_env() -> Self {
        let profile = env::var(ENV_PROFILE)
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();

        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            "test" => Self::for_tests(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var(ENV_DIRECTIVES) {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Ok(format) = env::var(ENV_FORMAT) {
            if let Some(output) = TracingOutput::from_env_value(&format) {
                config.output = output;
            }
        }
        if config.output == TracingOutput::Json {
            config.ansi = false;
        }

        if let Ok(targets) = env::var(ENV_TARGETS) {
            match targets.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.include_targets = true,
                "0" | "false" | "no" => config.include_targets = false,
                _ => {}
            }
        }

        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        match &self.directives {
            Some(directives) => {
                EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
            }
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_directive))),
        }
    }
}

/// Output format for the formatter layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Failure to configure the shared subscriber.
#[derive(Debug, thiserror::Error)]
pub enum TracingSetupError {
    /// The directive string could not be parsed.
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),
    /// A global subscriber is already installed.
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Build a subscriber from `config` without installing it.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = config.resolve_filter()?;
    Ok(Registry::default().with(format_layer(config)).with(filter))
}

fn format_layer(config: &TracingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let writer = if config.test_writer {
        BoxMakeWriter::new(TestWriter::new())
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let layer = tracing_fmt::layer()
        .with_writer(writer)
        .with_target(config.include_targets)
        .with_span_events(config.span_events.clone());

    match config.output {
        TracingOutput::Compact => Box::new(layer.compact().with_ansi(config.ansi)),
        TracingOutput::Pretty => Box::new(layer.pretty().with_ansi(config.ansi)),
        TracingOutput::Json => Box::new(layer.json().with_ansi(false)),
    }
}

/// Install the configured subscriber as the process-wide default.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    build_subscriber(config)?.try_init()?;
    Ok(())
}

/// Install the test preset once per process.
///
/// Safe to call from every test: later calls find the subscriber already set
/// and return quietly.
pub fn init_test_tracing() {
    let _ = init_global_tracing(&TracingConfig::for_tests());
}
