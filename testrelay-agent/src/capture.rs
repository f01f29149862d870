// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed per-test log buffers.
//!
//! Each in-flight test owns one buffer, keyed by its normalized name and
//! created at test start. The buffer is a transient relay, not durable
//! storage: at test finish its content is read, shipped to the backend as a
//! single log entry, and the file is deleted. Under serialized dispatch at
//! most one buffer is open at a time.

use crate::errors::CaptureError;
use camino::Utf8PathBuf;
use std::{fs, io::Write};
use tracing::warn;

const FILE_EXTENSION: &str = "log";
const FILE_HEADER: &str = "Test log";

/// The value [`LogCapture::read`] returns for a buffer that does not exist.
pub const NOT_FOUND: &str = "No log file was found";

/// Store of per-test log buffers under one directory.
#[derive(Clone, Debug)]
pub struct LogCapture {
    directory: Utf8PathBuf,
}

impl LogCapture {
    /// Creates a capture store rooted at `directory`.
    ///
    /// The directory itself is created lazily, when the first buffer is.
    pub fn new(directory: impl Into<Utf8PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn buffer_path(&self, name: &str) -> Utf8PathBuf {
        self.directory.join(format!("{name}.{FILE_EXTENSION}"))
    }

    /// Opens (or truncates) the buffer for `name`, tagged with the header
    /// line.
    pub fn create(&self, name: &str) -> Result<(), CaptureError> {
        fs::create_dir_all(&self.directory)
            .map_err(|source| CaptureError::new(self.directory.clone(), source))?;
        let path = self.buffer_path(name);
        fs::write(&path, format!("{FILE_HEADER}\n"))
            .map_err(|source| CaptureError::new(path, source))
    }

    /// Appends one line to the buffer for `name`.
    pub fn append(&self, name: &str, line: &str) -> Result<(), CaptureError> {
        let path = self.buffer_path(name);
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| CaptureError::new(path.clone(), source))?;
        writeln!(file, "{line}").map_err(|source| CaptureError::new(path, source))
    }

    /// Returns the full content of the buffer for `name`.
    ///
    /// A missing buffer degrades to [`NOT_FOUND`] rather than an error: the
    /// content is shipped on a best-effort path where a placeholder beats an
    /// abort.
    pub fn read(&self, name: &str) -> String {
        let path = self.buffer_path(name);
        match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => NOT_FOUND.to_owned(),
            Err(error) => {
                warn!(%path, %error, "failed to read log buffer");
                format!("Can't get data from log file with name: {name}.{FILE_EXTENSION}")
            }
        }
    }

    /// Deletes the buffer for `name`, if it exists.
    pub fn delete(&self, name: &str) {
        let path = self.buffer_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
            Err(error) => warn!(%path, %error, "failed to delete log buffer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    #[test]
    fn buffer_lifecycle() {
        let dir = tempdir().expect("tempdir created");
        let capture = LogCapture::new(dir.path().join("buffers"));

        capture.create("login success").expect("buffer created");
        capture
            .append("login success", "[info] tapped login")
            .expect("line appended");
        capture
            .append("login success", "[error] assertion failed")
            .expect("line appended");

        assert_eq!(
            capture.read("login success"),
            "Test log\n[info] tapped login\n[error] assertion failed\n"
        );

        capture.delete("login success");
        assert_eq!(capture.read("login success"), NOT_FOUND);
    }

    #[test]
    fn create_truncates_previous_content() {
        let dir = tempdir().expect("tempdir created");
        let capture = LogCapture::new(dir.path());

        capture.create("checkout").expect("buffer created");
        capture.append("checkout", "stale line").expect("line appended");
        capture.create("checkout").expect("buffer recreated");

        assert_eq!(capture.read("checkout"), "Test log\n");
    }

    #[test]
    fn missing_buffer_reads_as_not_found() {
        let dir = tempdir().expect("tempdir created");
        let capture = LogCapture::new(dir.path());
        assert_eq!(capture.read("never created"), NOT_FOUND);
    }

    #[test]
    fn append_to_missing_buffer_is_an_error() {
        let dir = tempdir().expect("tempdir created");
        let capture = LogCapture::new(dir.path());
        assert!(capture.append("never created", "line").is_err());
    }

    #[test]
    fn delete_of_missing_buffer_is_silent() {
        let dir = tempdir().expect("tempdir created");
        let capture = LogCapture::new(dir.path());
        capture.delete("never created");
    }
}
