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

//! Drop old versions by collapsing them into a pivot.
//!
//! The pivot becomes the new oldest version: its rebuilt data bundle
//! holds every file its manifest names, and surviving newer manifests
//! have any reference to a dropped version rewritten to the pivot.
//! Everything is written to a sibling `.tempfile` and committed with a
//! rename, so a failed trim leaves the original archive untouched.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::archive::{Archive, INFO_MEMBER};
use crate::bundle::BundleWriter;
use crate::container::{replace_atomically, ContainerWriter};
use crate::errors::Result;
use crate::manifest::{encode_manifest, VersionManifest};
use crate::restore::restore_to_bundle;

/// Delete all versions strictly older than `pivot`.
///
/// With `output` set, the trimmed archive is written there and the
/// original is left as it was.
pub fn trim(archive: &Archive, pivot: &VersionManifest, output: Option<&Path>) -> Result<()> {
    let dest = output.unwrap_or_else(|| archive.path());
    let working = PathBuf::from(format!("{}.tempfile", dest.display()));
    let container = archive.open_container()?;
    let mut writer = ContainerWriter::create(&working)?;

    // The pivot's new bundle holds every file it names, wherever the
    // bytes lived before.
    let mut bundle = BundleWriter::new();
    restore_to_bundle(&container, pivot, &mut bundle)?;
    let (spool, bundle_len) = bundle.into_spool()?;
    writer.add_member(&pivot.id.data_member(), spool, bundle_len)?;

    let mut pivot_manifest = pivot.clone();
    pivot_manifest.sizedelta = pivot_manifest.size;
    for entry in pivot_manifest.files.values_mut() {
        entry.location = pivot.id.clone();
    }
    writer.add_bytes(
        &pivot.id.manifest_member(),
        &encode_manifest(&pivot_manifest)?,
    )?;

    writer.add_bytes(INFO_MEMBER, &container.read_member(INFO_MEMBER)?)?;

    for version in archive.versions().filter(|v| v.time > pivot.time) {
        let data_member = version.id.data_member();
        let slice = container.member_slice(&data_member)?;
        let len = slice.len();
        writer.add_member(&data_member, slice, len)?;

        let mut manifest = version.clone();
        for entry in manifest.files.values_mut() {
            // References to versions older than the pivot now point at
            // the pivot, which holds their bytes.
            let location_time = archive
                .version_by_id(&entry.location)
                .map(|v| v.time)
                .unwrap_or(i64::MIN);
            if location_time < pivot.time {
                entry.location = pivot.id.clone();
            }
        }
        writer.add_bytes(&version.id.manifest_member(), &encode_manifest(&manifest)?)?;
    }

    writer.finish()?;
    replace_atomically(&working, dest)?;
    info!(
        "Trimmed backup {:?} to version {}",
        dest.file_name().unwrap_or_default(),
        pivot.id
    );
    Ok(())
}

/// Trim so that only the `keep` most recent versions survive.
///
/// Does nothing when the archive already has that few versions.
pub fn trim_to_count(archive: &Archive, keep: usize, output: Option<&Path>) -> Result<()> {
    // The newest version always survives.
    let keep = keep.max(1);
    let count = archive.version_count();
    if keep >= count {
        info!(
            "Archive has {} version(s), nothing to trim to {}",
            count, keep
        );
        return Ok(());
    }
    let pivot = archive
        .versions()
        .nth(count - keep)
        .expect("pivot index within version count");
    trim(archive, pivot, output)
}
