//! Logging initialisation for the server.
//!
//! Installs a global `tracing` subscriber built from [`LoggingConfig`].
//! `RUST_LOG`, when set, takes precedence over the configured level.
//!
//! The optional file sink rolls over by size and keeps a fixed number of
//! numbered backups (`server.log.1`, `server.log.2`, ...). Each launch starts
//! a fresh file by rolling the previous one over.

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing::{subscriber::SetGlobalDefaultError, Subscriber};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Handle returned once logging is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring logging.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter directive did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// The log file could not be opened or rolled over.
    #[error("cannot open log file {path}: {source}")]
    File {
        /// Configured path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// Another subscriber is already installed.
    #[error("failed to install log subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Install the global subscriber. Later calls are no-ops.
pub fn initialise(config: &LoggingConfig) -> Result<TelemetryHandle, TelemetryError> {
    if INSTALLED.get().is_some() {
        return Ok(TelemetryHandle);
    }
    install_subscriber(config)?;
    let _ = INSTALLED.set(());
    Ok(TelemetryHandle)
}

fn install_subscriber(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(&config.log_level)?;
    let writer = make_writer(config)?;
    let ansi = config.log_to_stdout && config.log_file.is_empty() && io::stdout().is_terminal();

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(writer)
        .with_ansi(ansi);

    let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json {
        Box::new(builder.json().flatten_event(true).finish())
    } else {
        Box::new(builder.finish())
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn build_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn make_writer(config: &LoggingConfig) -> Result<BoxMakeWriter, TelemetryError> {
    let file = if config.log_file.is_empty() {
        None
    } else {
        let file = open_rotating(config).map_err(|source| TelemetryError::File {
            path: config.log_file.clone(),
            source,
        })?;
        Some(Mutex::new(file))
    };

    Ok(match (config.log_to_stdout, file) {
        (true, Some(file)) => BoxMakeWriter::new(io::stdout.and(file)),
        (true, None) => BoxMakeWriter::new(io::stdout),
        (false, Some(file)) => BoxMakeWriter::new(file),
        (false, None) => BoxMakeWriter::new(io::sink),
    })
}

fn open_rotating(config: &LoggingConfig) -> io::Result<FileRotate<AppendCount>> {
    let path = Path::new(&config.log_file);
    // Surface permission and missing-directory errors before handing over
    OpenOptions::new().create(true).append(true).open(path)?;
    let previous = fs::metadata(path)?.len();

    let mut file = FileRotate::new(
        path,
        AppendCount::new(config.num_keep_logs.max(1)),
        ContentLimit::Bytes(config.max_size_bytes().max(1)),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    if previous > 0 {
        file.rotate()?;
    }
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_level_directives() {
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("alpaca_rotator=trace,tower_http=info").is_ok());
    }

    fn file_config(path: &Path) -> LoggingConfig {
        LoggingConfig::default()
            .with_log_to_stdout(false)
            .with_log_file(path.to_str().unwrap())
            .with_max_size_mb(1)
            .with_num_keep_logs(2)
    }

    fn backup(path: &Path, n: usize) -> std::path::PathBuf {
        path.with_file_name(format!("server.log.{n}"))
    }

    #[test]
    fn startup_rolls_previous_log_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        fs::write(&path, "stale contents").unwrap();

        make_writer(&file_config(&path)).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert_eq!(fs::read_to_string(backup(&path, 1)).unwrap(), "stale contents");
    }

    #[test]
    fn fresh_directory_gets_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");

        make_writer(&file_config(&path)).unwrap();

        assert!(path.exists());
        assert!(!backup(&path, 1).exists());
    }

    #[test]
    fn rolls_over_at_size_limit() {
        use std::io::Write;
        use tracing_subscriber::fmt::MakeWriter;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.log");
        fs::write(&path, "stale contents").unwrap();

        let writer = make_writer(&file_config(&path)).unwrap();
        let line = vec![b'x'; 1000];
        {
            let mut sink = writer.make_writer();
            for _ in 0..1500 {
                sink.write_all(&line).unwrap();
            }
            sink.flush().unwrap();
        }

        assert!(fs::metadata(&path).unwrap().len() <= 1_000_000);
        let rolled = fs::metadata(backup(&path, 1)).unwrap().len();
        assert!(rolled > 0 && rolled <= 1_000_000, "rolled file is {rolled} bytes");
        assert_eq!(fs::read_to_string(backup(&path, 2)).unwrap(), "stale contents");
        assert!(!backup(&path, 3).exists());
    }

    #[test]
    fn unwritable_log_file_is_reported() {
        let config = LoggingConfig::default().with_log_file("/nonexistent-dir/x/server.log");
        let Err(err) = make_writer(&config) else {
            panic!("expected a file error");
        };
        assert!(matches!(err, TelemetryError::File { .. }));
    }
}
