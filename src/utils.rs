use chrono::{Datelike, NaiveDate};
use log::info;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;

/// Day number of 1970-01-01 counted from 0001-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Logs how long a pipeline stage took when dropped.
pub struct StageTimer {
    stage: String,
    start: Instant,
}

impl StageTimer {
    pub fn start(stage: impl Into<String>) -> Self {
        StageTimer {
            stage: stage.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        info!("{} took {:?}", self.stage, self.start.elapsed());
    }
}

/// Creates `path` (and parents) if missing; fails if it exists as a file.
pub(crate) fn ensure_dir_exists(path: &Path) -> io::Result<()> {
    match std::fs::metadata(path) {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating directory: {}", path.display());
            std::fs::create_dir_all(path)
        }
        Err(e) => Err(e),
    }
}

/// Writes `bytes` to a temporary file next to `path` and renames it into
/// place, so a failed write never leaves a partial file at `path`.
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp_file = NamedTempFile::new_in(parent_dir(path))?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Polars stores dates as days since the Unix epoch.
pub(crate) fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}
