use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
    sync::{Arc, Mutex},
};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};

use crate::config::Config;

pub const LOG_FILE_NAME: &str = "tp-dashboard.log";

/// Keeps the optional log file open for the life of the process.
pub struct LogGuard {
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl LogGuard {
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

struct MultiWriter {
    stderr: io::Stderr,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

impl MultiWriter {
    fn new(file: Option<Arc<Mutex<std::fs::File>>>) -> Self {
        Self {
            stderr: io::stderr(),
            file,
        }
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let _ = self.stderr.write_all(buf);
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.stderr.flush();
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Returns `None` when a subscriber was already installed.
pub fn init_logging(config: &Config) -> Option<LogGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let guard = match config.log_dir.as_deref() {
        Some(dir) => match open_log_file(dir) {
            Ok(guard) => guard,
            Err(err) => {
                eprintln!("log_file_error: {err}");
                LogGuard { file: None }
            }
        },
        None => LogGuard { file: None },
    };
    let file = guard.file.clone();
    let make_writer = BoxMakeWriter::new(move || MultiWriter::new(file.clone()));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

fn open_log_file(dir: &Path) -> io::Result<LogGuard> {
    std::fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE_NAME))?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}
