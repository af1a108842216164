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

//! Archives holding backup versions.
//!
//! One archive file holds one backup: an `info.json` record and, per
//! version, a manifest and a data bundle. Opening a path with no file
//! yields an empty archive, so the first build needs no separate init
//! step.
//!
//! Versions are kept in a map ordered by id; because ids are derived
//! from strictly increasing build times, id order is time order and
//! ordinals fall out of the map position.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::container::ContainerReader;
use crate::errors::{Error, Result};
use crate::manifest::{self, ArchiveInfo, VersionManifest};
use crate::verid::VersionId;

pub(crate) const INFO_MEMBER: &str = "info.json";

/// An archive file and its loaded metadata.
#[derive(Debug)]
pub struct Archive {
    path: PathBuf,
    info: Option<ArchiveInfo>,
    versions: BTreeMap<VersionId, VersionManifest>,
}

/// Which committed version an operation should act on.
#[derive(Debug, Clone)]
pub enum VersionSelector {
    Latest,
    /// By id string. Unknown ids fall back to the latest version with a
    /// warning.
    Id(String),
    /// By 1-based ordinal in time order. Unknown ordinals are an error.
    Num(usize),
}

fn is_manifest_member(name: &str) -> bool {
    name.starts_with("versions/") && name.ends_with("/version.json")
}

impl Archive {
    /// Load the archive at `path`, or an empty one if no file exists.
    pub fn open(path: &Path) -> Result<Archive> {
        if !path.is_file() {
            return Ok(Archive {
                path: path.to_owned(),
                info: None,
                versions: BTreeMap::new(),
            });
        }
        let container = ContainerReader::open(path)?;
        let mut versions = BTreeMap::new();
        let manifest_members: Vec<String> = container
            .member_names()
            .filter(|name| is_manifest_member(name))
            .map(str::to_owned)
            .collect();
        for member in manifest_members {
            let bytes = container.read_member(&member)?;
            let version = manifest::decode_manifest(&member, &bytes)?;
            versions.insert(version.id.clone(), version);
        }
        let info = if container.has_member(INFO_MEMBER) {
            Some(manifest::decode_info(
                INFO_MEMBER,
                &container.read_member(INFO_MEMBER)?,
            )?)
        } else if versions.is_empty() {
            None
        } else {
            return Err(Error::MissingMember {
                member: INFO_MEMBER.to_owned(),
            });
        };
        // Every location must name a version present in this archive.
        for version in versions.values() {
            for (apath, entry) in &version.files {
                if !versions.contains_key(&entry.location) {
                    return Err(Error::OrphanLocation {
                        apath: apath.clone(),
                        location: entry.location.clone(),
                    });
                }
            }
        }
        Ok(Archive {
            path: path.to_owned(),
            info,
            versions,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> Option<&ArchiveInfo> {
        self.info.as_ref()
    }

    /// Open the underlying container for member reads.
    pub fn open_container(&self) -> Result<ContainerReader> {
        ContainerReader::open(&self.path)
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Versions in ascending time order.
    pub fn versions(&self) -> impl Iterator<Item = &VersionManifest> {
        self.versions.values()
    }

    pub fn last_version(&self) -> Option<&VersionManifest> {
        self.versions.values().next_back()
    }

    pub fn version_by_id(&self, id: &VersionId) -> Option<&VersionManifest> {
        self.versions.get(id)
    }

    /// 1-based ordinal of a version, counting from the oldest.
    pub fn num_of(&self, id: &VersionId) -> Option<usize> {
        self.versions.keys().position(|k| k == id).map(|p| p + 1)
    }

    pub fn version_by_num(&self, num: usize) -> Option<&VersionManifest> {
        if num == 0 {
            return None;
        }
        self.versions.values().nth(num - 1)
    }

    /// Resolve a selector against the committed versions.
    pub fn resolve(&self, selector: &VersionSelector) -> Result<&VersionManifest> {
        match selector {
            VersionSelector::Latest => self.last_version().ok_or(Error::ArchiveEmpty),
            VersionSelector::Id(id) => {
                let found = id
                    .parse::<VersionId>()
                    .ok()
                    .and_then(|id| self.version_by_id(&id));
                match found {
                    Some(version) => Ok(version),
                    None => {
                        warn!(
                            "Version {} does not exist, restoring latest version instead",
                            id
                        );
                        self.last_version().ok_or(Error::ArchiveEmpty)
                    }
                }
            }
            VersionSelector::Num(num) => self
                .version_by_num(*num)
                .ok_or(Error::VersionNotFound { num: *num }),
        }
    }
}
