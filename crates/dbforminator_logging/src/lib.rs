//! Logging setup for DBForminator binaries.
//!
//! Library crates only emit `tracing` events. The binary calls
//! [`init_logging`] once, which installs a registry with two layers: a
//! size-rotated file under the logs directory and stderr.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "dbforminator=info,dbforminator_db=info,dbforminator_schema=info";
const VERBOSE_LOG_FILTER: &str =
    "dbforminator=debug,dbforminator_db=debug,dbforminator_schema=debug";
const HOME_ENV: &str = "DBFORMINATOR_HOME";
const KEEP_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Logging configuration, passed explicitly by the binary.
#[derive(Debug, Clone)]
pub struct LogConfig<'a> {
    /// Base name of the log file
    pub app_name: &'a str,
    /// Mirror the file filter (at debug level) on stderr instead of warnings only
    pub verbose: bool,
    /// Overrides [`logs_dir`]
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a size-rotated file writer and stderr output.
///
/// `RUST_LOG` overrides the file filter.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let dir = match config.log_dir {
        Some(dir) => dir,
        None => logs_dir()?,
    };
    let file = LogFile::open(&dir, config.app_name, KEEP_LOG_FILES, MAX_LOG_FILE_SIZE)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        EnvFilter::new(VERBOSE_LOG_FILTER)
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// DBForminator home directory: `$DBFORMINATOR_HOME`, else `~/.dbforminator`.
pub fn dbforminator_home() -> Result<PathBuf> {
    if let Some(path) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(path));
    }
    dirs::home_dir()
        .map(|home| home.join(".dbforminator"))
        .with_context(|| format!("Could not determine home directory; set {}", HOME_ENV))
}

/// Logs directory: `<home>/logs`.
pub fn logs_dir() -> Result<PathBuf> {
    Ok(dbforminator_home()?.join("logs"))
}

/// Append-only log file that rotates once it passes a size limit.
///
/// `<name>.log` is current; `<name>.log.1` is the newest rotated segment and
/// `<name>.log.<keep-1>` the oldest kept.
struct RotatingFile {
    dir: PathBuf,
    name: String,
    keep: usize,
    limit: u64,
    file: Option<File>,
    written: u64,
}

impl RotatingFile {
    fn open(dir: &Path, app_name: &str, keep: usize, limit: u64) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let mut rotating = Self {
            dir: dir.to_path_buf(),
            name: file_stem(app_name),
            keep: keep.max(1),
            limit,
            file: None,
            written: 0,
        };
        rotating.reopen()?;
        if rotating.written > rotating.limit {
            rotating.rotate()?;
        }
        Ok(rotating)
    }

    fn segment(&self, index: usize) -> PathBuf {
        match index {
            0 => self.dir.join(format!("{}.log", self.name)),
            n => self.dir.join(format!("{}.log.{}", self.name, n)),
        }
    }

    fn reopen(&mut self) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.segment(0))?;
        self.written = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        if self.keep > 1 {
            let oldest = self.segment(self.keep - 1);
            if oldest.exists() {
                fs::remove_file(oldest)?;
            }
            for index in (0..self.keep - 1).rev() {
                let from = self.segment(index);
                if from.exists() {
                    fs::rename(from, self.segment(index + 1))?;
                }
            }
        } else {
            fs::remove_file(self.segment(0)).or_else(|e| match e.kind() {
                io::ErrorKind::NotFound => Ok(()),
                _ => Err(e),
            })?;
        }

        self.reopen()
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.limit {
            self.rotate()?;
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;
        let n = file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Shared handle to a [`RotatingFile`]; every `make_writer` call clones it.
#[derive(Clone)]
struct LogFile(Arc<Mutex<RotatingFile>>);

impl LogFile {
    fn open(dir: &Path, app_name: &str, keep: usize, limit: u64) -> io::Result<Self> {
        RotatingFile::open(dir, app_name, keep, limit).map(|file| Self(Arc::new(Mutex::new(file))))
    }

    fn with<T>(&self, f: impl FnOnce(&mut RotatingFile) -> io::Result<T>) -> io::Result<T> {
        let mut file = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        f(&mut file)
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.with(|file| file.flush())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFile {
    type Writer = LogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn file_stem(app_name: &str) -> String {
    let stem: String = app_name
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => ch,
            _ => '_',
        })
        .collect();
    if stem.is_empty() {
        "dbforminator".to_string()
    } else {
        stem
    }
}
