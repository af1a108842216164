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

//! Read and write the JSON records stored inside an archive.
//!
//! There are two schemas: the archive-level `info.json`, written once
//! when the archive is first saved, and one `version.json` manifest per
//! version. Manifests are emitted with sorted keys and 4-space
//! indentation so that the same version always serializes to the same
//! bytes; `info.json` is compact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::verid::VersionId;

/// Archive-level metadata, stored as the `info.json` member.
///
/// Written when the archive is first saved and never rewritten: later
/// builds may scan with different patterns, but the recorded `include`
/// and `exclude` keep their original values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveInfo {
    /// Free-form identifier for the backup, if the user supplied one.
    pub id: Option<String>,
    /// Source directory the backup was built from.
    pub src: String,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
}

/// One file within a version.
//
// Field order is serialization order and must stay alphabetical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    /// Id of the version whose data bundle physically holds this file.
    pub location: VersionId,
    /// Modification time as fractional Unix seconds. Kept as a float so
    /// that sub-second precision survives the manifest round trip.
    #[serde(rename = "mod")]
    pub mtime: f64,
    pub size: u64,
}

/// Manifest of one version, stored as `versions/<id>/version.json`.
//
// Field order is serialization order and must stay alphabetical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionManifest {
    /// Entry names mapped to their metadata, sorted by name.
    pub files: BTreeMap<String, FileEntry>,
    pub id: VersionId,
    /// Total size of all files belonging to this version, reused ones
    /// included.
    pub size: u64,
    /// Total size of the files first introduced by this version.
    pub sizedelta: u64,
    /// Build time in Unix seconds.
    pub time: i64,
}

impl VersionManifest {
    pub fn new(id: VersionId, time: i64) -> VersionManifest {
        VersionManifest {
            files: BTreeMap::new(),
            id,
            size: 0,
            sizedelta: 0,
            time,
        }
    }

    /// Names of the files whose bytes live in this version's own data
    /// bundle, in sorted order.
    pub fn owned_names(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|(_, e)| e.location == self.id)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

pub fn encode_info(info: &ArchiveInfo) -> Result<Vec<u8>> {
    serde_json::to_vec(info).map_err(|source| Error::SerializeManifest { source })
}

pub fn decode_info(member: &str, bytes: &[u8]) -> Result<ArchiveInfo> {
    serde_json::from_slice(bytes).map_err(|source| Error::CorruptManifest {
        member: member.to_owned(),
        source,
    })
}

/// Serialize a version manifest with sorted keys and 4-space indents.
pub fn encode_manifest(manifest: &VersionManifest) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    manifest
        .serialize(&mut ser)
        .map_err(|source| Error::SerializeManifest { source })?;
    Ok(buf)
}

pub fn decode_manifest(member: &str, bytes: &[u8]) -> Result<VersionManifest> {
    let manifest: VersionManifest =
        serde_json::from_slice(bytes).map_err(|source| Error::CorruptManifest {
            member: member.to_owned(),
            source,
        })?;
    for name in manifest.files.keys() {
        if !crate::apath::valid(name) {
            return Err(Error::InvalidApath {
                apath: name.clone(),
            });
        }
    }
    Ok(manifest)
}
