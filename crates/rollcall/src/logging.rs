//! Logging setup.
//!
//! Events from this crate are shown at the level picked on the command line.
//! The HTTP and database stacks stay at `warn` unless tracing everything.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level for events from other crates below `Trace`.
const DEPENDENCY_LEVEL: Level = Level::WARN;

/// How much the CLI reports on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// `-q`: errors only.
    Quiet,
    /// Operation outcomes: loads, saves, written reports.
    #[default]
    Normal,
    /// `-v`: per-record submissions and fetch details.
    Verbose,
    /// `-vv`: everything, dependencies included.
    Trace,
}

impl Verbosity {
    /// Map `-q` and the number of `-v` flags to a verbosity.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// Level for events from this crate.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set.
    ///
    /// Other crates log at `warn` (`error` when quiet) so reqwest and
    /// rusqlite chatter stays out of normal runs.
    #[must_use]
    pub fn directive(self) -> String {
        let dependencies = match self {
            Self::Quiet => Level::ERROR,
            Self::Trace => Level::TRACE,
            Self::Normal | Self::Verbose => DEPENDENCY_LEVEL,
        };
        format!("{dependencies},rollcall={}", self.level())
    }

    /// Build the filter: `RUST_LOG` when set, else [`Self::directive`].
    #[must_use]
    pub fn env_filter(self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()))
    }
}

/// Install the global subscriber, writing to stderr so `--json` output on
/// stdout stays parseable.
///
/// A second call is a no-op.
///
/// ```no_run
/// use rollcall::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let subscriber = tracing_subscriber::registry().with(verbosity.env_filter()).with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(verbosity == Verbosity::Trace)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(Verbosity::Quiet.level(), Level::ERROR);
        assert_eq!(Verbosity::default().level(), Level::INFO);
        assert_eq!(Verbosity::from_flags(false, 1).level(), Level::DEBUG);
        assert_eq!(Verbosity::from_flags(false, 3).level(), Level::TRACE);
    }

    #[test]
    fn test_quiet_wins_over_verbose() {
        assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
    }

    #[test]
    fn test_directive_keeps_dependencies_at_warn() {
        assert_eq!(Verbosity::Normal.directive(), "WARN,rollcall=INFO");
        assert_eq!(Verbosity::Verbose.directive(), "WARN,rollcall=DEBUG");
        assert_eq!(Verbosity::Quiet.directive(), "ERROR,rollcall=ERROR");
        assert_eq!(Verbosity::Trace.directive(), "TRACE,rollcall=TRACE");
    }

    #[test]
    fn test_directives_parse() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(verbosity.directive()).is_ok());
        }
    }
}
