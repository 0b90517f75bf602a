//! Terminal output for the CLI and the library.
//!
//! Errors and warnings go to stderr, everything else to stdout. `--quiet`
//! silences all but errors; `--verbose` adds diagnostic lines.

use crate::constants::{ERROR_PREFIX, VERBOSE_PREFIX, WARNING_PREFIX};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static QUIET_MODE: AtomicBool = AtomicBool::new(false);
static VERBOSE_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_quiet_mode(quiet: bool) {
    QUIET_MODE.store(quiet, Ordering::Relaxed);
}

pub fn set_verbose_mode(verbose: bool) {
    VERBOSE_MODE.store(verbose, Ordering::Relaxed);
}

pub fn is_quiet() -> bool {
    QUIET_MODE.load(Ordering::Relaxed)
}

pub fn is_verbose() -> bool {
    VERBOSE_MODE.load(Ordering::Relaxed)
}

/// Apply the CLI's `--quiet` / `--verbose` flags. Quiet wins when both are set.
pub fn init(quiet: bool, verbose: bool) {
    set_quiet_mode(quiet);
    set_verbose_mode(verbose && !quiet);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warn,
    Info,
    Verbose,
}

impl Level {
    /// Whether a line at this level is printed under the given switches
    pub fn enabled_for(self, quiet: bool, verbose: bool) -> bool {
        match self {
            Level::Error => true,
            Level::Warn | Level::Info => !quiet,
            Level::Verbose => verbose && !quiet,
        }
    }

    pub fn enabled(self) -> bool {
        self.enabled_for(is_quiet(), is_verbose())
    }

    fn to_stderr(self) -> bool {
        matches!(self, Level::Error | Level::Warn)
    }
}

/// The line printed for `message` at `level`, prefix included
pub fn render(level: Level, message: &str) -> String {
    match level {
        Level::Error => format!("{} {}", ERROR_PREFIX, message),
        // The warning emoji renders one column short in most terminals
        Level::Warn => format!("{}  {}", WARNING_PREFIX, message),
        Level::Info => message.to_string(),
        Level::Verbose => format!("{} {}", VERBOSE_PREFIX, message),
    }
}

/// Backend of the logging macros
pub fn log(level: Level, args: fmt::Arguments<'_>) {
    if !level.enabled() {
        return;
    }
    let line = render(level, &args.to_string());
    if level.to_stderr() {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Verbose, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::log($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}
