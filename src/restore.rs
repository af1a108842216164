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

//! Restore a version from the archive.
//!
//! A version's files can be spread over several data bundles: each
//! entry is read from the version named by its `location`. The entries
//! are grouped by location first so that every bundle is opened exactly
//! once.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::info;

use crate::archive::{Archive, VersionSelector};
use crate::bundle::{self, BundleWriter};
use crate::container::ContainerReader;
use crate::errors::Result;
use crate::manifest::VersionManifest;
use crate::verid::VersionId;

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct RestoreStats {
    pub files: usize,
}

/// Materialize the selected version under `destination`, preserving
/// archive-relative paths.
pub fn restore(
    archive: &Archive,
    selector: &VersionSelector,
    destination: &Path,
) -> Result<RestoreStats> {
    let version = archive.resolve(selector)?;
    let container = archive.open_container()?;
    let mut stats = RestoreStats::default();
    for (location, names) in group_by_location(version) {
        let member = location.data_member();
        let slice = container.member_slice(&member)?;
        let mut data = bundle::open_bundle(&member, slice)?;
        for name in names {
            bundle::extract_file(&mut data, &member, name, destination)?;
            stats.files += 1;
        }
    }
    info!(
        "Restored {:?} > {:?}",
        archive.path().file_name().unwrap_or_default(),
        destination
    );
    Ok(stats)
}

/// Copy every file of `version` into an output bundle, reading each
/// entry from the version that stores it. This is how a trim rebuilds
/// the pivot's data bundle.
pub fn restore_to_bundle(
    container: &ContainerReader,
    version: &VersionManifest,
    out: &mut BundleWriter,
) -> Result<()> {
    for (location, names) in group_by_location(version) {
        let member = location.data_member();
        let slice = container.member_slice(&member)?;
        let mut data = bundle::open_bundle(&member, slice)?;
        for name in names {
            bundle::copy_entry(&mut data, &member, name, out)?;
        }
    }
    Ok(())
}

fn group_by_location(version: &VersionManifest) -> BTreeMap<VersionId, Vec<&str>> {
    let mut groups: BTreeMap<VersionId, Vec<&str>> = BTreeMap::new();
    for (name, entry) in &version.files {
        groups
            .entry(entry.location.clone())
            .or_default()
            .push(name.as_str());
    }
    groups
}
