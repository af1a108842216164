// Strata backup system.
// Copyright 2024, 2025 Strata authors.

// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! Classify scanned files against the previous version's manifest.
//!
//! A file is reused when the previous version has an entry with the
//! same name, the same size, and exactly the same modification time;
//! its entry is carried over, so its `location` keeps pointing at
//! whichever version already stores the bytes. Anything else is stored
//! by the new version itself. No content is read here.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::manifest::{FileEntry, VersionManifest};
use crate::scan::ScanEntry;
use crate::verid::VersionId;

/// A version under construction: the differ's output, not yet committed.
#[derive(Debug)]
pub struct WorkingVersion {
    pub manifest: VersionManifest,
    /// Source paths of the entries this version stores itself, keyed by
    /// archive name.
    pub source_paths: BTreeMap<String, PathBuf>,
    /// Count of files changed or added since the previous version.
    pub new_files: usize,
}

impl WorkingVersion {
    /// True when nothing changed since the previous version, so there
    /// is nothing to save.
    pub fn is_unchanged(&self) -> bool {
        self.source_paths.is_empty()
    }
}

/// Fold the scanner output into a new working version.
pub fn diff_tree(
    previous: Option<&VersionManifest>,
    scanned: Vec<ScanEntry>,
    id: VersionId,
    time: i64,
) -> WorkingVersion {
    let mut manifest = VersionManifest::new(id, time);
    let mut source_paths = BTreeMap::new();
    let mut new_files = 0;
    for entry in scanned {
        if let Some(prev) = previous.and_then(|p| p.files.get(&entry.apath)) {
            // Exact match on both mtime and size; any difference means
            // "changed".
            if prev.mtime == entry.mtime && prev.size == entry.size {
                manifest.size += entry.size;
                manifest.files.insert(entry.apath, prev.clone());
                continue;
            }
        }
        manifest.size += entry.size;
        manifest.sizedelta += entry.size;
        manifest.files.insert(
            entry.apath.clone(),
            FileEntry {
                location: manifest.id.clone(),
                mtime: entry.mtime,
                size: entry.size,
            },
        );
        source_paths.insert(entry.apath, entry.path);
        new_files += 1;
    }
    WorkingVersion {
        manifest,
        source_paths,
        new_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_entry(apath: &str, size: u64, mtime: f64) -> ScanEntry {
        ScanEntry {
            apath: apath.to_owned(),
            path: PathBuf::from("/src").join(apath),
            size,
            mtime,
        }
    }

    fn previous() -> VersionManifest {
        let id: VersionId = "2026-01-01-000000".parse().unwrap();
        let mut manifest = VersionManifest::new(id.clone(), 100);
        manifest.files.insert(
            "a.txt".to_owned(),
            FileEntry {
                location: id.clone(),
                mtime: 10.5,
                size: 5,
            },
        );
        manifest.files.insert(
            "sub/b.png".to_owned(),
            FileEntry {
                location: id,
                mtime: 11.0,
                size: 128,
            },
        );
        manifest.size = 133;
        manifest.sizedelta = 133;
        manifest
    }

    #[test]
    fn first_version_stores_everything() {
        let id: VersionId = "2026-01-02-000000".parse().unwrap();
        let working = diff_tree(
            None,
            vec![scan_entry("a.txt", 5, 10.5), scan_entry("sub/b.png", 128, 11.0)],
            id.clone(),
            200,
        );
        assert_eq!(working.new_files, 2);
        assert_eq!(working.manifest.size, 133);
        assert_eq!(working.manifest.sizedelta, 133);
        assert_eq!(working.source_paths.len(), 2);
        assert!(working.manifest.files.values().all(|e| e.location == id));
        assert!(!working.is_unchanged());
    }

    #[test]
    fn unchanged_files_are_reused_with_their_old_location() {
        let prev = previous();
        let id: VersionId = "2026-01-02-000000".parse().unwrap();
        let working = diff_tree(
            Some(&prev),
            vec![scan_entry("a.txt", 5, 10.5), scan_entry("sub/b.png", 128, 11.0)],
            id,
            200,
        );
        assert!(working.is_unchanged());
        assert_eq!(working.new_files, 0);
        assert_eq!(working.manifest.size, 133);
        assert_eq!(working.manifest.sizedelta, 0);
        assert_eq!(
            working.manifest.files["a.txt"].location,
            prev.files["a.txt"].location
        );
    }

    #[test]
    fn mtime_change_alone_stores_the_file() {
        let prev = previous();
        let id: VersionId = "2026-01-02-000000".parse().unwrap();
        let working = diff_tree(
            Some(&prev),
            vec![
                scan_entry("a.txt", 5, 10.500001),
                scan_entry("sub/b.png", 128, 11.0),
            ],
            id.clone(),
            200,
        );
        assert_eq!(working.new_files, 1);
        assert_eq!(working.manifest.sizedelta, 5);
        assert_eq!(working.manifest.files["a.txt"].location, id);
        assert_eq!(
            working.manifest.files["sub/b.png"].location,
            prev.files["sub/b.png"].location
        );
    }

    #[test]
    fn size_change_alone_stores_the_file() {
        let prev = previous();
        let id: VersionId = "2026-01-02-000000".parse().unwrap();
        let working = diff_tree(
            Some(&prev),
            vec![scan_entry("a.txt", 6, 10.5), scan_entry("sub/b.png", 128, 11.0)],
            id.clone(),
            200,
        );
        assert_eq!(working.new_files, 1);
        assert_eq!(working.manifest.size, 134);
        assert_eq!(working.manifest.sizedelta, 6);
        assert_eq!(working.manifest.files["a.txt"].size, 6);
    }

    #[test]
    fn deleted_files_simply_drop_out() {
        let prev = previous();
        let id: VersionId = "2026-01-02-000000".parse().unwrap();
        let working = diff_tree(Some(&prev), vec![scan_entry("a.txt", 5, 10.5)], id, 200);
        assert_eq!(working.manifest.files.len(), 1);
        assert_eq!(working.manifest.size, 5);
        assert!(working.is_unchanged());
    }
}
