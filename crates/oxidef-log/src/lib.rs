//! Leveled diagnostics for the `OxideF` runtime crates.
//!
//! The runtime reports registry changes, table rehashes and buffer growth
//! through this crate. Output goes to stderr so it never mixes with a host
//! program's stdout, and the threshold can be picked up from the
//! `OXIDEF_LOG` environment variable.
//!
//! # Example
//!
//! ```
//! use oxidef_log::{debug, trace, Level};
//!
//! oxidef_log::set_level(Level::Debug);
//!
//! let capacity = 23;
//! debug!("rehashing table to {} buckets", capacity);
//! trace!("this line is filtered out");
//! ```

use std::fmt::Arguments;
use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};

/// Name of the environment variable read by [`init_from_env`].
pub const ENV_VAR: &str = "OXIDEF_LOG";

/// Severity of a diagnostic. Lower values are more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Nothing is printed.
    Off = 0,
    /// Unrecoverable misuse or exhausted resources.
    Error = 1,
    /// Recoverable exhaustion (type table full, allocation failure).
    Warn = 2,
    /// Lifecycle milestones (runtime created, bridge installed).
    Info = 3,
    /// Registry changes.
    Debug = 4,
    /// Per-operation detail such as rehashes and buffer growth.
    Trace = 5,
}

impl Level {
    /// Returns the upper-case label printed in front of each line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Off => "OFF",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn from_u8(raw: u8) -> Level {
        match raw {
            0 => Level::Off,
            1 => Level::Error,
            2 => Level::Warn,
            3 => Level::Info,
            4 => Level::Debug,
            _ => Level::Trace,
        }
    }
}

impl std::str::FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Level::Off),
            "error" => Ok(Level::Error),
            "warn" | "warning" => Ok(Level::Warn),
            "info" => Ok(Level::Info),
            "debug" => Ok(Level::Debug),
            "trace" => Ok(Level::Trace),
            _ => Err(ParseLevelError {
                input: s.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a level name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLevelError {
    input: String,
}

impl std::fmt::Display for ParseLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown log level `{}`", self.input)
    }
}

impl std::error::Error for ParseLevelError {}

/// Threshold shared by every thread. Defaults to `Warn` so library users
/// only see problems unless they opt in.
static THRESHOLD: AtomicU8 = AtomicU8::new(Level::Warn as u8);

/// Sets the most verbose level that is still printed.
pub fn set_level(level: Level) {
    THRESHOLD.store(level as u8, Ordering::Relaxed);
}

/// Returns the current threshold.
#[must_use]
pub fn level() -> Level {
    Level::from_u8(THRESHOLD.load(Ordering::Relaxed))
}

/// Returns `true` if a message at `level` would be printed.
#[inline]
#[must_use]
pub fn enabled(level: Level) -> bool {
    level != Level::Off && level as u8 <= THRESHOLD.load(Ordering::Relaxed)
}

/// Reads [`ENV_VAR`] and applies it as the threshold.
///
/// An unset variable leaves the threshold untouched and returns `Ok(None)`.
///
/// # Errors
///
/// Returns [`ParseLevelError`] if the variable holds an unknown level name;
/// the threshold is left unchanged in that case.
pub fn init_from_env() -> Result<Option<Level>, ParseLevelError> {
    match std::env::var(ENV_VAR) {
        Ok(raw) => {
            let level: Level = raw.parse()?;
            set_level(level);
            Ok(Some(level))
        }
        Err(_) => Ok(None),
    }
}

#[doc(hidden)]
pub fn __emit(level: Level, target: &str, args: Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    // A closed stderr is not worth a panic inside the runtime.
    let _ = writeln!(out, "[{:<5}] {target}: {args}", level.as_str());
}

/// Emits a message at an explicit level.
#[macro_export]
macro_rules! log {
    (level: $level:expr, $($arg:tt)*) => {{
        let level = $level;
        if $crate::enabled(level) {
            $crate::__emit(level, module_path!(), format_args!($($arg)*));
        }
    }};
}

/// Emits at [`Level::Error`].
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Error, $($arg)*) };
}

/// Emits at [`Level::Warn`].
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Warn, $($arg)*) };
}

/// Emits at [`Level::Info`].
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Info, $($arg)*) };
}

/// Emits at [`Level::Debug`].
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Debug, $($arg)*) };
}

/// Emits at [`Level::Trace`].
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::log!(level: $crate::Level::Trace, $($arg)*) };
}
