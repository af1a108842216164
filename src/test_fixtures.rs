// Strata backup system.
// Copyright 2024, 2025 Strata authors.

//! Utilities to set up test environments.
//!
//! Fixtures that create directories delete them when dropped.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tempfile::TempDir;

/// A temporary source tree for running a test against.
pub struct TreeFixture {
    pub root: PathBuf,
    _tempdir: TempDir,
}

impl TreeFixture {
    pub fn new() -> TreeFixture {
        let tempdir = TempDir::new().unwrap();
        let root = tempdir.path().to_path_buf();
        TreeFixture {
            _tempdir: tempdir,
            root,
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn create_file(&self, relative_path: &str) {
        self.create_file_with_contents(relative_path, b"contents");
    }

    pub fn create_file_with_contents(&self, relative_path: &str, contents: &[u8]) {
        let full_path = self.root.join(relative_path);
        let mut f = fs::File::create(full_path).unwrap();
        f.write_all(contents).unwrap();
    }

    pub fn create_dir(&self, relative_path: &str) {
        fs::create_dir(self.root.join(relative_path)).unwrap();
    }

    /// Pin a file's mtime so that change detection is deterministic.
    pub fn set_mtime(&self, relative_path: &str, unix_seconds: i64, nanos: u32) {
        let full_path = self.root.join(relative_path);
        filetime::set_file_mtime(full_path, FileTime::from_unix_time(unix_seconds, nanos))
            .unwrap();
    }
}

impl Default for TreeFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A path for a scratch archive in a temporary directory.
///
/// The archive file itself is not created: a fresh path exercises the
/// absent-archive case the same way the command line does.
pub struct ScratchArchive {
    _tempdir: TempDir,
    path: PathBuf,
}

impl ScratchArchive {
    pub fn new() -> ScratchArchive {
        let tempdir = TempDir::new().unwrap();
        let path = tempdir.path().join("bak.tar");
        ScratchArchive {
            _tempdir: tempdir,
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for ScratchArchive {
    fn default() -> Self {
        Self::new()
    }
}
