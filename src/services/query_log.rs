use crate::error::AppError;
use crate::models::QueryTurn;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const QUERY_LOG_FILE: &str = "queries.log";

/// Append-only plain-text record of turns, one line each
pub struct QueryLog {
    path: PathBuf,
}

impl QueryLog {
    /// Log into `<dir>/queries.log`, creating the directory if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, AppError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .map_err(|e| AppError::Io(format!("Cannot create log directory {}: {}", dir.display(), e)))?;

        Ok(Self {
            path: dir.join(QUERY_LOG_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, turn: &QueryTurn) -> Result<(), AppError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AppError::Io(format!("Cannot open {}: {}", self.path.display(), e)))?;

        writeln!(file, "{}", turn.log_line())?;
        Ok(())
    }
}
