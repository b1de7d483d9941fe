//! Logging setup.
//!
//! Progress and diagnostics go to stderr so stdout carries only the backend
//! output or the final report. `RUST_LOG` overrides the level chosen from the
//! command line.

use tracing_subscriber::{fmt, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    /// Default: only retries that escalate and unexpected conditions.
    #[default]
    Warn,
    Error,
    Off,
}

impl LogLevel {
    fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }
}

impl From<u8> for LogLevel {
    /// 0-1 = Warn, 2 = Info, 3 = Debug, 4+ = Trace.
    ///
    /// A single `-v` only turns on console progress lines, not log output.
    fn from(verbosity: u8) -> Self {
        match verbosity {
            0 | 1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Configuration for the stderr subscriber.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub with_timestamps: bool,
    /// Whether to include the target (module path)
    pub with_target: bool,
    pub with_ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            with_timestamps: true,
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set whether to include timestamps.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.with_timestamps = enabled;
        self
    }

    /// Set whether to include the target (module path).
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    /// Set whether to emit ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }

    /// Builds a configuration from `-v` count and `--quiet`.
    pub fn from_flags(verbosity: u8, quiet: bool) -> Self {
        let level = if quiet {
            LogLevel::Error
        } else {
            LogLevel::from(verbosity)
        };
        Self::default().with_level(level)
    }

    fn env_filter(&self) -> EnvFilter {
        if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(self.level.as_directive())
        }
    }
}

/// Installs the global stderr subscriber. Call once at startup.
pub fn init_logging(config: LoggingConfig) {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .with_target(config.with_target)
        .with_ansi(config.with_ansi);

    if config.with_timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
