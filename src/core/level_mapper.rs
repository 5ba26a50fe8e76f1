//! Mapping of native framework severities onto [`LogLevel`]
//!
//! Every scale is mapped by picking the nearest bucket whose threshold is
//! less than or equal to the native value. Values outside a scale's range and
//! unrecognized names resolve to [`LogLevel::Info`]; the "everything" and
//! "nothing" markers of a scale resolve to its extremes so that an `OFF`
//! setting can never be shown by a downstream filter.

use super::log_level::LogLevel;

/// A severity as reported by a source framework.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLevel {
    /// Already on the canonical scale.
    Canonical(LogLevel),
    /// A level name such as `"WARN"`, `"ALL"` or `"OFF"` (Log4j style).
    Named(String),
    /// JUL-style integer levels (`SEVERE = 1000` .. `FINEST = 300`).
    Jul(i32),
    /// Logback-style integer levels (`ERROR = 40000` .. `TRACE = 5000`).
    Logback(i32),
    /// RFC 5424 syslog severities (`0 = emergency` .. `7 = debug`).
    Syslog(i32),
}

/// Bucket thresholds for an integer scale, highest first.
struct NumericScale {
    buckets: &'static [(i32, LogLevel)],
}

impl NumericScale {
    fn map(&self, value: i32) -> LogLevel {
        match value {
            i32::MIN => LogLevel::Trace,
            i32::MAX => LogLevel::Fatal,
            v => self
                .buckets
                .iter()
                .find(|(threshold, _)| v >= *threshold)
                .map(|(_, level)| *level)
                .unwrap_or(LogLevel::Info),
        }
    }
}

const JUL: NumericScale = NumericScale {
    buckets: &[
        (1000, LogLevel::Error),
        (900, LogLevel::Warn),
        (800, LogLevel::Info),
        (500, LogLevel::Debug),
        (300, LogLevel::Trace),
    ],
};

const LOGBACK: NumericScale = NumericScale {
    buckets: &[
        (40000, LogLevel::Error),
        (30000, LogLevel::Warn),
        (20000, LogLevel::Info),
        (10000, LogLevel::Debug),
        (5000, LogLevel::Trace),
    ],
};

/// Stateless converter from native severities to the canonical scale.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelMapper;

impl LevelMapper {
    /// Map a native severity. Never fails.
    pub fn map(source: &SourceLevel) -> LogLevel {
        match source {
            SourceLevel::Canonical(level) => *level,
            SourceLevel::Named(name) => Self::map_name(name),
            SourceLevel::Jul(value) => JUL.map(*value),
            SourceLevel::Logback(value) => LOGBACK.map(*value),
            SourceLevel::Syslog(value) => Self::map_syslog(*value),
        }
    }

    pub fn map_name(name: &str) -> LogLevel {
        if let Ok(level) = name.parse::<LogLevel>() {
            return level;
        }
        match name.trim().to_uppercase().as_str() {
            "ALL" => LogLevel::Trace,
            "OFF" => LogLevel::Fatal,
            _ => LogLevel::Info,
        }
    }

    fn map_syslog(severity: i32) -> LogLevel {
        match severity {
            0..=2 => LogLevel::Fatal,
            3 => LogLevel::Error,
            4 => LogLevel::Warn,
            5 | 6 => LogLevel::Info,
            7 => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

impl From<LogLevel> for SourceLevel {
    fn from(level: LogLevel) -> Self {
        SourceLevel::Canonical(level)
    }
}

impl From<&str> for SourceLevel {
    fn from(name: &str) -> Self {
        SourceLevel::Named(name.to_string())
    }
}

#[cfg(feature = "log-bridge")]
impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => LogLevel::Error,
            log::Level::Warn => LogLevel::Warn,
            log::Level::Info => LogLevel::Info,
            log::Level::Debug => LogLevel::Debug,
            log::Level::Trace => LogLevel::Trace,
        }
    }
}

#[cfg(feature = "tracing-bridge")]
impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warn,
            tracing::Level::INFO => LogLevel::Info,
            tracing::Level::DEBUG => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_levels() {
        assert_eq!(LevelMapper::map(&"WARN".into()), LogLevel::Warn);
        assert_eq!(LevelMapper::map(&"error".into()), LogLevel::Error);
        assert_eq!(LevelMapper::map(&"ALL".into()), LogLevel::Trace);
        assert_eq!(LevelMapper::map(&"OFF".into()), LogLevel::Fatal);
        assert_eq!(LevelMapper::map(&"NOTICE".into()), LogLevel::Info);
        assert_eq!(LevelMapper::map(&"".into()), LogLevel::Info);
    }

    #[test]
    fn test_jul_buckets() {
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(1000)), LogLevel::Error);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(950)), LogLevel::Warn);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(800)), LogLevel::Info);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(700)), LogLevel::Debug);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(500)), LogLevel::Debug);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(400)), LogLevel::Trace);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(300)), LogLevel::Trace);
    }

    #[test]
    fn test_jul_extremes_and_out_of_range() {
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(i32::MIN)), LogLevel::Trace);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(i32::MAX)), LogLevel::Fatal);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(10)), LogLevel::Info);
        assert_eq!(LevelMapper::map(&SourceLevel::Jul(-5)), LogLevel::Info);
    }

    #[test]
    fn test_logback_buckets() {
        assert_eq!(LevelMapper::map(&SourceLevel::Logback(40000)), LogLevel::Error);
        assert_eq!(LevelMapper::map(&SourceLevel::Logback(30000)), LogLevel::Warn);
        assert_eq!(LevelMapper::map(&SourceLevel::Logback(20000)), LogLevel::Info);
        assert_eq!(LevelMapper::map(&SourceLevel::Logback(10000)), LogLevel::Debug);
        assert_eq!(LevelMapper::map(&SourceLevel::Logback(5000)), LogLevel::Trace);
        assert_eq!(LevelMapper::map(&SourceLevel::Logback(100)), LogLevel::Info);
        assert_eq!(LevelMapper::map(&SourceLevel::Logback(i32::MAX)), LogLevel::Fatal);
    }

    #[test]
    fn test_syslog_severities() {
        assert_eq!(LevelMapper::map(&SourceLevel::Syslog(0)), LogLevel::Fatal);
        assert_eq!(LevelMapper::map(&SourceLevel::Syslog(2)), LogLevel::Fatal);
        assert_eq!(LevelMapper::map(&SourceLevel::Syslog(3)), LogLevel::Error);
        assert_eq!(LevelMapper::map(&SourceLevel::Syslog(4)), LogLevel::Warn);
        assert_eq!(LevelMapper::map(&SourceLevel::Syslog(6)), LogLevel::Info);
        assert_eq!(LevelMapper::map(&SourceLevel::Syslog(7)), LogLevel::Debug);
        assert_eq!(LevelMapper::map(&SourceLevel::Syslog(42)), LogLevel::Info);
    }

    #[test]
    fn test_canonical_identity() {
        for level in LogLevel::ALL {
            assert_eq!(LevelMapper::map(&level.into()), level);
        }
    }

    #[cfg(feature = "log-bridge")]
    #[test]
    fn test_log_crate_levels() {
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Trace);
        assert_eq!(LogLevel::from(log::Level::Error), LogLevel::Error);
    }

    #[cfg(feature = "tracing-bridge")]
    #[test]
    fn test_tracing_levels() {
        assert_eq!(LogLevel::from(tracing::Level::TRACE), LogLevel::Trace);
        assert_eq!(LogLevel::from(tracing::Level::WARN), LogLevel::Warn);
    }
}
