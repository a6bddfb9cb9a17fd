//! CSV archiving functionality
//!
//! Archives are CSV files written into the session's `arch/` directory. Two paths are provided:
//! serde-serialised records for fixed-shape rows, and raw string records for files whose header
//! is built at runtime (such as the per-joint sampling archive).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::Path;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
#[derive(Default)]
pub struct Archiver {
    writer: Option<csv::Writer<File>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file: {0}")]
    CannotCreateFile(std::io::Error),

    #[error("Cannot write to the archive: {0}")]
    WriteError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error),

    #[error("The archive has been closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a particular path relative to the session's
    /// archive root.
    pub fn from_path<P: AsRef<Path>>(session: &Session, path: P) -> Result<Self, ArchiveError> {
        let mut session_path = session.arch_root.clone();
        session_path.push(path);

        Self::from_file(session_path)
    }

    /// Create a new archiver writing directly to the given file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        // Create the file if it does not exist
        File::create(&path).map_err(ArchiveError::CannotCreateFile)?;

        // Open the file in append mode
        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(ArchiveError::CannotCreateFile)?;

        let writer = WriterBuilder::new().has_headers(true).from_writer(file);

        Ok(Self {
            writer: Some(writer),
        })
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        match self.writer {
            Some(ref mut w) => {
                w.serialize(record).map_err(ArchiveError::WriteError)?;
                w.flush().map_err(ArchiveError::FlushError)
            }
            None => Err(ArchiveError::Closed),
        }
    }

    /// Write a raw string record into the archive.
    ///
    /// Used for archives whose column set is only known at runtime, for which the caller writes
    /// the header row itself.
    pub fn write_raw<I, F>(&mut self, record: I) -> Result<(), ArchiveError>
    where
        I: IntoIterator<Item = F>,
        F: AsRef<[u8]>,
    {
        match self.writer {
            Some(ref mut w) => {
                w.write_record(record).map_err(ArchiveError::WriteError)?;
                w.flush().map_err(ArchiveError::FlushError)
            }
            None => Err(ArchiveError::Closed),
        }
    }

    /// Flush and close the archive. Further writes return [`ArchiveError::Closed`].
    ///
    /// Closing an already closed archive is a no-op.
    pub fn close(&mut self) -> Result<(), ArchiveError> {
        if let Some(mut w) = self.writer.take() {
            w.flush().map_err(ArchiveError::FlushError)?;
        }

        Ok(())
    }

    /// True if the archive has been closed.
    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("deimos_archive_test_{}_{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_raw_records() {
        let path = temp_path("raw.csv");
        let mut arch = Archiver::from_file(&path).unwrap();

        arch.write_raw(&["timestamp", "q_joint15"]).unwrap();
        arch.write_raw(&["0.1", "0.5"]).unwrap();
        arch.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.starts_with("timestamp,q_joint15"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_close_is_idempotent() {
        let path = temp_path("close.csv");
        let mut arch = Archiver::from_file(&path).unwrap();

        arch.close().unwrap();
        arch.close().unwrap();
        assert!(arch.is_closed());

        // Writes after close are rejected, not a panic
        assert!(matches!(
            arch.write_raw(&["a"]),
            Err(ArchiveError::Closed)
        ));

        std::fs::remove_file(&path).ok();
    }
}
