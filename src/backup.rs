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

//! Build a new version from a source directory and commit it.
//!
//! `build` scans and diffs but touches nothing on disk; `save` appends
//! the new version to the archive. A build that changed nothing is
//! skipped entirely by `save`, leaving the archive byte-identical.

use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::archive::{Archive, INFO_MEMBER};
use crate::bundle::BundleWriter;
use crate::container::ContainerWriter;
use crate::diff::{diff_tree, WorkingVersion};
use crate::errors::{Error, Result};
use crate::manifest::{self, ArchiveInfo};
use crate::scan::Scanner;
use crate::verid::VersionId;

/// Options for the build operation.
#[derive(Debug, Default, Clone)]
pub struct BackupOptions {
    /// Free-form identifier recorded in `info.json` on the first save.
    pub id: Option<String>,
    /// Include patterns; empty means everything.
    pub include: Vec<String>,
    /// Exclude patterns; empty means nothing.
    pub exclude: Vec<String>,
}

/// What `save` did.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct SaveStats {
    /// True when there was nothing to store and the archive was left
    /// untouched.
    pub skipped: bool,
    /// Files changed or added since the previous version.
    pub new_files: usize,
    /// Bytes first introduced by this version.
    pub stored_bytes: u64,
}

fn clock_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64().round() as i64)
        .unwrap_or(0)
}

/// Scan `source` and assemble a new in-memory working version against
/// the archive's newest committed version.
pub fn build(archive: &Archive, source: &Path, options: &BackupOptions) -> Result<WorkingVersion> {
    let mut time = clock_now();
    if let Some(last) = archive.last_version() {
        // Keep build times strictly increasing even when the wall clock
        // has not advanced since the previous version.
        if time <= last.time {
            time = last.time + 1;
        }
    }
    let id = VersionId::from_unix(time)?;

    let scanner = Scanner::new(&options.include, &options.exclude)?;
    debug!("Scanning for files in source directory {:?}", source);
    let scanned = scanner.scan(source)?;
    let working = diff_tree(archive.last_version(), scanned, id, time);
    debug!("{} changed files found", working.new_files);
    Ok(working)
}

/// Commit a working version: append its data bundle and manifest.
///
/// The bundle is written before the manifest, so an interrupted save
/// can leave a dangling bundle but never a manifest pointing at absent
/// bytes. `info.json` is appended only if the archive does not have one
/// yet; pattern changes on later builds are deliberately not recorded.
pub fn save(
    archive: &Archive,
    source: &Path,
    working: &WorkingVersion,
    options: &BackupOptions,
) -> Result<SaveStats> {
    if working.is_unchanged() {
        info!("Skipped backup {:?} (no files to back up)", source);
        return Ok(SaveStats {
            skipped: true,
            ..SaveStats::default()
        });
    }
    info!(
        "Backing up {:?} > {:?}",
        source,
        archive.path().file_name().unwrap_or_default()
    );

    let manifest = &working.manifest;
    let mut bundle = BundleWriter::new();
    for (name, path) in &working.source_paths {
        let entry = &manifest.files[name];
        bundle.add_file(name, path, entry.size, entry.mtime)?;
    }
    let (spool, bundle_len) = bundle.into_spool()?;

    let mut writer = ContainerWriter::append(archive.path())?;
    writer.add_member(&manifest.id.data_member(), spool, bundle_len)?;
    if !writer.has_member(INFO_MEMBER) {
        let info = archive_info(archive, source, options)?;
        writer.add_bytes(INFO_MEMBER, &manifest::encode_info(&info)?)?;
    }
    writer.add_bytes(
        &manifest.id.manifest_member(),
        &manifest::encode_manifest(manifest)?,
    )?;
    writer.finish()?;

    Ok(SaveStats {
        skipped: false,
        new_files: working.new_files,
        stored_bytes: manifest.sizedelta,
    })
}

fn archive_info(archive: &Archive, source: &Path, options: &BackupOptions) -> Result<ArchiveInfo> {
    let src = fs::canonicalize(source).map_err(|source_err| Error::ListSourceTree {
        path: source.to_owned(),
        source: source_err,
    })?;
    // The scanner is also the pattern normalizer; reuse it so the
    // recorded patterns match what the walk actually used.
    let scanner = Scanner::new(&options.include, &options.exclude)?;
    Ok(ArchiveInfo {
        id: options
            .id
            .clone()
            .or_else(|| archive.info().and_then(|i| i.id.clone())),
        src: src.to_string_lossy().into_owned(),
        include: scanner.include_texts(),
        exclude: scanner.exclude_texts(),
    })
}
