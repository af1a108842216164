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

//! Strata error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::verid::VersionId;

/// A failure from any Strata operation.
///
/// Archive-shape problems (missing members, truncated members, bad
/// manifests, dangling locations) are distinct variants so that callers
/// can tell a corrupt archive apart from plain I/O trouble.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to open archive {path:?}")]
    OpenArchive { path: PathBuf, source: io::Error },

    #[error("Failed to read archive {path:?}")]
    ReadArchive { path: PathBuf, source: io::Error },

    #[error("Failed to write archive {path:?}")]
    WriteArchive { path: PathBuf, source: io::Error },

    #[error("Archive member {member:?} not found")]
    MissingMember { member: String },

    #[error("Archive member {member:?} is truncated")]
    ShortRead { member: String },

    #[error("Failed to serialize manifest")]
    SerializeManifest { source: serde_json::Error },

    #[error("Malformed JSON in archive member {member:?}")]
    CorruptManifest {
        member: String,
        source: serde_json::Error,
    },

    #[error("Entry {apath:?} references version {location} which is not in the archive")]
    OrphanLocation { apath: String, location: VersionId },

    #[error("Bad entry name {apath:?} in manifest")]
    InvalidApath { apath: String },

    #[error("Data bundle {member:?} is unreadable")]
    CorruptBundle {
        member: String,
        source: zip::result::ZipError,
    },

    #[error("Failed to finalize data bundle")]
    FinishBundle { source: zip::result::ZipError },

    #[error("Failed to compress {apath:?} into data bundle")]
    CompressFile {
        apath: String,
        source: zip::result::ZipError,
    },

    #[error("Archive has no versions")]
    ArchiveEmpty,

    #[error("No version numbered {num}")]
    VersionNotFound { num: usize },

    #[error("Unparseable version id {id:?}")]
    InvalidVersionId { id: String },

    #[error("Failed to list source directory {path:?}")]
    ListSourceTree { path: PathBuf, source: io::Error },

    #[error("Failed to read source file {path:?}")]
    ReadSourceFile { path: PathBuf, source: io::Error },

    #[error("Invalid glob pattern {pattern:?}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },

    #[error("Failed to restore {path:?}")]
    Restore { path: PathBuf, source: io::Error },

    #[error("Failed to create temporary file in {path:?}")]
    TempFile { path: PathBuf, source: io::Error },

    #[error("Build time {time} is out of range for the local calendar")]
    TimeOutOfRange { time: i64 },
}

pub type Result<T> = std::result::Result<T, Error>;
