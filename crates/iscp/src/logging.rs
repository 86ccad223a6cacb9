use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

/// Shape of the diagnostic stream on stderr.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// One human-readable line per event.
    Text,
    /// One flat JSON object per event, fields at the top level.
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    /// Adds open, transmit, and completion events from the session.
    Debug,
    /// Adds every decoded frame and every chunk read from the receiver.
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl LogLevel {
    /// Name the emitting crate (`iscp_frame`, `iscp_session`, ...) only when
    /// wire-level events are on; at info and above the target is noise.
    fn shows_target(self) -> bool {
        self >= LogLevel::Debug
    }
}

/// Receiver messages go to stdout; every log event goes to stderr.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(LevelFilter::from(level))
        .with_ansi(false)
        .with_target(level.shows_target());

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().flatten_event(true).try_init();
        }
    }
}
