use super::config::{ConsoleLog, FileLog, LogConfig, Rotation};
use anyhow::{anyhow, Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const LOG_FILE_NAME: &str = "linkgate.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Holds the file writer's worker alive; drop it last to flush buffered lines.
pub struct LoggerImpl {
    _guard: Option<WorkerGuard>,
}

impl LoggerImpl {
    /// Install the global subscriber described by `config`.
    ///
    /// Console events go to stderr, leaving stdout to command output.
    pub fn init(config: &LogConfig) -> Result<Self> {
        let level = config
            .level()
            .ok_or_else(|| anyhow!("Invalid log level: {}", config.level))?;

        let (file, guard) = match &config.file {
            Some(file) => {
                let (layer, guard) = file_layer(file, level);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };
        let layers: Vec<BoxedLayer> = file.into_iter().chain(console_layer(config.console, level)).collect();

        tracing_subscriber::registry()
            .with(layers)
            .try_init()
            .context("Failed to install global tracing subscriber")?;

        tracing::info!(
            level = %level,
            console = ?config.console,
            log_dir = ?config.file.as_ref().map(|f| &f.directory),
            "logger initialized"
        );

        Ok(Self { _guard: guard })
    }
}

fn appender(file: &FileLog) -> RollingFileAppender {
    match file.rotation {
        Rotation::Daily => rolling::daily(&file.directory, LOG_FILE_NAME),
        Rotation::Hourly => rolling::hourly(&file.directory, LOG_FILE_NAME),
        Rotation::Never => rolling::never(&file.directory, LOG_FILE_NAME),
    }
}

/// JSON lines with span context, one file per rotation period.
fn file_layer(file: &FileLog, level: Level) -> (BoxedLayer, WorkerGuard) {
    let (writer, guard) = tracing_appender::non_blocking(appender(file));
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(writer)
        .with_ansi(false)
        .with_current_span(true)
        .with_span_list(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter(level))
        .boxed();
    (layer, guard)
}

fn console_layer(console: ConsoleLog, level: Level) -> Option<BoxedLayer> {
    let layer = match console {
        ConsoleLog::Off => return None,
        ConsoleLog::Text => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter(level))
            .boxed(),
        ConsoleLog::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_filter(env_filter(level))
            .boxed(),
    };
    Some(layer)
}

/// `RUST_LOG` wins over the configured level when set.
fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_off_builds_no_layer() {
        assert!(console_layer(ConsoleLog::Off, Level::INFO).is_none());
        assert!(console_layer(ConsoleLog::Json, Level::INFO).is_some());
    }

    #[test]
    fn test_invalid_level_is_rejected_before_install() {
        let config = LogConfig {
            level: "chatty".to_string(),
            ..LogConfig::default()
        };
        let err = LoggerImpl::init(&config).err().unwrap();
        assert!(err.to_string().contains("chatty"));
    }

    #[test]
    fn test_file_logger_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            level: "debug".to_string(),
            console: ConsoleLog::Off,
            file: Some(FileLog {
                directory: dir.path().to_path_buf(),
                rotation: Rotation::Never,
            }),
        };

        // The global subscriber can be installed once per test binary; only this test does it.
        let logger = LoggerImpl::init(&config).unwrap();
        assert!(logger._guard.is_some());
        assert!(LoggerImpl::init(&config).is_err());
    }
}
