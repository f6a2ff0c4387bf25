//! Append-only CSV destinations.
//!
//! Every write opens the file in append mode and closes it again, so a crash
//! mid-crawl loses at most the batch in flight. The header row is written
//! only when the file is empty at open time; re-runs append below existing
//! rows without deduplication.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::SinkError;

/// One CSV destination file.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `rows` under `header`, writing the header first when the file
    /// is empty. An empty batch still creates the file and its header.
    pub fn write<S: Serialize>(&self, header: &[&str], rows: &[S]) -> Result<(), SinkError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let fresh = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if fresh {
            writer.write_record(header)?;
        }
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        debug!(path = %self.path.display(), rows = rows.len(), "appended rows");
        Ok(())
    }

    /// Truncate the destination so the next write starts a fresh file.
    pub fn reset(&self) -> Result<(), SinkError> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }
}
