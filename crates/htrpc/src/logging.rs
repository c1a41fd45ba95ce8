use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Crates whose events reach the log. hyper and reqwest stay silent.
pub const LOG_TARGETS: [&str; 5] = [
    "htrpc",
    "htrpc_peer",
    "htrpc_transport",
    "htrpc_frame",
    "htrpc_schema",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
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

/// Per-crate filter: every htrpc layer at `level`, everything else off.
pub fn log_filter(level: LogLevel) -> Targets {
    Targets::new().with_targets(LOG_TARGETS.map(|target| (target, LevelFilter::from(level))))
}

/// Route htrpc `tracing` events to stderr; stdout carries command output.
///
/// At `debug` and below the emitting crate is printed with each line, so
/// frame, transport and peer events can be told apart.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(level >= LogLevel::Debug);

    let installed = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(layer.with_filter(log_filter(level)))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json().with_filter(log_filter(level)))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}
