//! Verbosity levels shared by every check
//!
//! Plugin output is a single line on stdout, so everything else is opt-in.
//! Errors always go to stderr, verbose and debug output go to stdout.

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// How much to say besides the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Silent,
    Error,
    Verbose,
    Debug,
}

impl Verbosity {
    /// Pick a level from the standard `-q`, `-v` and `-d` flags
    ///
    /// The most verbose flag wins.
    pub fn from_flags(quiet: bool, verbose: bool, debug: bool) -> Verbosity {
        if debug {
            Verbosity::Debug
        } else if verbose {
            Verbosity::Verbose
        } else if quiet {
            Verbosity::Silent
        } else {
            Verbosity::Error
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Silent => LevelFilter::OFF,
            Verbosity::Error => LevelFilter::ERROR,
            Verbosity::Verbose => LevelFilter::INFO,
            Verbosity::Debug => LevelFilter::DEBUG,
        }
    }
}

/// Install the global subscriber
///
/// Safe to call more than once, later calls are ignored.
pub fn init(verbosity: Verbosity) {
    let writer = std::io::stderr
        .with_max_level(Level::ERROR)
        .or_else(std::io::stdout);
    let _ = tracing_subscriber::fmt()
        .with_max_level(verbosity.level_filter())
        .with_writer(writer)
        .without_time()
        .with_target(false)
        .with_ansi(false)
        .try_init();
}

#[cfg(test)]
mod test {
    use super::Verbosity;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn most_verbose_flag_wins() {
        assert_eq!(Verbosity::from_flags(false, false, false), Verbosity::Error);
        assert_eq!(Verbosity::from_flags(true, false, false), Verbosity::Silent);
        assert_eq!(Verbosity::from_flags(true, true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true, true), Verbosity::Debug);
    }

    #[test]
    fn levels_map_to_filters() {
        assert_eq!(Verbosity::Silent.level_filter(), LevelFilter::OFF);
        assert_eq!(Verbosity::Debug.level_filter(), LevelFilter::DEBUG);
    }
}
