use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "logs/chatgpt.log";

/// Keeps the file writer flushing until dropped.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    /// Log file, when file logging is on.
    pub file: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// A truthy `DEBUG` wins over `LOG_LEVEL`; unknown levels fall back to info.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_true = |key: &str| lookup(key).is_some_and(|v| parse_flag(&v));

        let level = if is_true("DEBUG") {
            "debug".to_string()
        } else {
            match lookup("LOG_LEVEL").map(|l| l.trim().to_lowercase()) {
                Some(l) if matches!(l.as_str(), "debug" | "info" | "warn" | "error") => l,
                _ => "info".to_string(),
            }
        };

        let file = is_true("LOG_TO_FILE").then(|| {
            lookup("LOG_FILE")
                .filter(|f| !f.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE))
        });

        Self { level, file }
    }
}

/// Logs go to stderr; stdout carries the MCP transport. `RUST_LOG` overrides
/// the configured level.
pub fn init_logging(settings: &LogSettings) -> anyhow::Result<LoggingGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_ansi(false);

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let file = open_log_file(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard { _file: guard })
}

/// Boolean env flag: "true", "yes" or "1", in any case.
fn parse_flag(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    matches!(value.as_str(), "true" | "yes" | "1")
}

fn open_log_file(path: &Path) -> anyhow::Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?)
}
