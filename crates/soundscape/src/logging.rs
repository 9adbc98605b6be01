//! Log output for the `soundscape` binary.
//!
//! Two targets matter: `soundscape` itself (storage, uploads, analytics) and
//! `tower_http`, which writes one line per request while `soundscape serve`
//! runs. Both follow the `-q`/`-v` flags unless `RUST_LOG` is set.
//!
//! Logs go to stderr. Commands such as `soundscape list --format json` print
//! their results on stdout, and that output must stay parseable.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the CLI and server log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only, for scripting.
    Quiet,
    /// Stored and deleted sounds plus one line per HTTP request.
    #[default]
    Normal,
    /// Adds query details such as nearby search radii and upload cleanup.
    Verbose,
    /// Everything, including request spans from `tower_http`.
    Trace,
}

impl Verbosity {
    /// Pick a verbosity from the `-q` flag and the number of `-v` flags.
    ///
    /// `-q` wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// The most detailed level this verbosity lets through.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Default `EnvFilter` directives, used when `RUST_LOG` is unset.
    #[must_use]
    pub fn filter_directives(&self) -> String {
        let level = self.to_level_filter();
        format!("soundscape={level},tower_http={level}")
    }
}

/// Install the global subscriber. Later calls are no-ops.
///
/// ```no_run
/// use soundscape::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directives()));

    let subscriber = tracing_subscriber::registry().with(env_filter).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity != Verbosity::Normal),
    );

    let _ = subscriber.try_init();
}

/// Route warnings from library code into the test harness output.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("soundscape=warn")
        .with_test_writer()
        .try_init();
}
