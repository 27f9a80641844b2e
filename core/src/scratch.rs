//! Process-wide scratch file backing the `-` filename.
//!
//! A bare `-` in place of a filename means "content was piped in and lives
//! in a scratch temp file". The file is created lazily on first use, reused
//! for the process lifetime, and removed on drop.

use std::io;
use std::path::Path;

use tempfile::NamedTempFile;

pub struct ScratchFile {
    file: Option<NamedTempFile>,
}

impl ScratchFile {
    #[must_use]
    pub fn new() -> Self {
        Self { file: None }
    }

    /// Path of the scratch file, creating it on first call.
    pub fn path(&mut self) -> io::Result<&Path> {
        if self.file.is_none() {
            let file = tempfile::Builder::new()
                .prefix("csense-scratch")
                .tempfile()?;
            tracing::debug!(path = %file.path().display(), "Created scratch file");
            self.file = Some(file);
        }
        Ok(self.file.as_ref().unwrap().path())
    }
}

impl Default for ScratchFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_stable_across_calls() {
        let mut scratch = ScratchFile::new();
        let first = scratch.path().unwrap().to_path_buf();
        let second = scratch.path().unwrap().to_path_buf();
        assert_eq!(first, second);
        assert!(first.exists());
    }

    #[test]
    fn test_file_removed_on_drop() {
        let mut scratch = ScratchFile::new();
        let path = scratch.path().unwrap().to_path_buf();
        drop(scratch);
        assert!(!path.exists());
    }
}
