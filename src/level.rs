use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Logging level of a [`Record`](crate::record::Record).
///
/// Levels are open-ended integers rather than a closed enum: the named
/// constants sit on spaced bands so callers can define intermediate
/// levels (`Level::new(Level::WARN.value() + 1)`) without losing
/// ordering. Only the four named bands map to a concrete [`Severity`];
/// everything else renders as `DEFAULT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Level(i64);

impl Level {
    pub const DEBUG: Level = Level(-4);
    pub const INFO: Level = Level(0);
    pub const WARN: Level = Level(4);
    pub const ERROR: Level = Level(8);

    /// A level with an arbitrary numeric value.
    pub const fn new(value: i64) -> Level {
        Level(value)
    }

    pub const fn value(self) -> i64 {
        self.0
    }
}

impl Default for Level {
    fn default() -> Level {
        Level::INFO
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Named band plus offset, e.g. "INFO", "WARN+2", "DEBUG-1".
        let (name, base) = match self.0 {
            v if v >= Level::ERROR.0 => ("ERROR", Level::ERROR.0),
            v if v >= Level::WARN.0 => ("WARN", Level::WARN.0),
            v if v >= Level::INFO.0 => ("INFO", Level::INFO.0),
            _ => ("DEBUG", Level::DEBUG.0),
        };

        let offset = self.0 - base;
        if offset == 0 {
            f.write_str(name)
        } else {
            write!(f, "{}{:+}", name, offset)
        }
    }
}

/// Error returned when a level string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    /// Parses `"debug"`, `"info"`, `"warn"`/`"warning"`, `"error"`
    /// case-insensitively, with an optional numeric offset suffix such
    /// as `"warn+2"`.
    fn from_str(s: &str) -> Result<Level, ParseLevelError> {
        let (name, offset) = match s.find(['+', '-']) {
            Some(at) => {
                let offset: i64 = s[at..]
                    .parse()
                    .map_err(|_| ParseLevelError(s.to_string()))?;
                (&s[..at], offset)
            }
            None => (s, 0),
        };

        let base = match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => return Err(ParseLevelError(s.to_string())),
        };

        Ok(Level(base.0 + offset))
    }
}

/// Minimum-level variable shared between a handler and the code that
/// tunes it at runtime.
///
/// Cloning shares the underlying value, so a handler built from a
/// `LevelVar` observes later [`set`](LevelVar::set) calls without being
/// rebuilt.
#[derive(Debug, Clone)]
pub struct LevelVar {
    inner: Arc<AtomicI64>,
}

impl LevelVar {
    pub fn new(level: Level) -> LevelVar {
        LevelVar {
            inner: Arc::new(AtomicI64::new(level.value())),
        }
    }

    pub fn level(&self) -> Level {
        Level(self.inner.load(Ordering::Relaxed))
    }

    pub fn set(&self, level: Level) {
        self.inner.store(level.value(), Ordering::Relaxed);
    }
}

impl Default for LevelVar {
    fn default() -> LevelVar {
        LevelVar::new(Level::INFO)
    }
}

impl From<Level> for LevelVar {
    fn from(level: Level) -> LevelVar {
        LevelVar::new(level)
    }
}

/// Severity of an entry in the output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Default,
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Default => "DEFAULT",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl From<Level> for Severity {
    /// Total mapping: the four named bands map to their severity,
    /// every other value maps to `DEFAULT`.
    fn from(level: Level) -> Severity {
        match level {
            Level::DEBUG => Severity::Debug,
            Level::INFO => Severity::Info,
            Level::WARN => Severity::Warning,
            Level::ERROR => Severity::Error,
            _ => Severity::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level::INFO < Level::WARN);
        assert!(Level::WARN < Level::ERROR);
    }

    #[test]
    fn severity_mapping_is_total() {
        assert_eq!(Severity::from(Level::DEBUG), Severity::Debug);
        assert_eq!(Severity::from(Level::INFO), Severity::Info);
        assert_eq!(Severity::from(Level::WARN), Severity::Warning);
        assert_eq!(Severity::from(Level::ERROR), Severity::Error);

        // Out-of-band levels fall back to DEFAULT.
        assert_eq!(Severity::from(Level::new(-8)), Severity::Default);
        assert_eq!(Severity::from(Level::new(2)), Severity::Default);
        assert_eq!(Severity::from(Level::new(100)), Severity::Default);
    }

    #[test]
    fn parse_named_levels() {
        assert_eq!("debug".parse(), Ok(Level::DEBUG));
        assert_eq!("INFO".parse(), Ok(Level::INFO));
        assert_eq!("Warning".parse(), Ok(Level::WARN));
        assert_eq!("error".parse(), Ok(Level::ERROR));
        assert_eq!("warn+2".parse(), Ok(Level::new(6)));
        assert!("verbose".parse::<Level>().is_err());
    }

    #[test]
    fn display_round_trips_named_levels() {
        assert_eq!(Level::INFO.to_string(), "INFO");
        assert_eq!(Level::new(6).to_string(), "WARN+2");
        assert_eq!(Level::new(-5).to_string(), "DEBUG-1");
    }

    #[test]
    fn level_var_is_shared() {
        let var = LevelVar::new(Level::INFO);
        let clone = var.clone();

        var.set(Level::ERROR);
        assert_eq!(clone.level(), Level::ERROR);
    }
}
