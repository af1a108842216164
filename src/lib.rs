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

//! Strata: incremental directory backups in a single archive file.
//!
//! An archive is a tar file holding one JSON info record plus, per
//! version, a JSON manifest and a zip data bundle with the bytes that
//! version introduced. Unchanged files are not stored again; their
//! manifest entries point back at the version that already holds them.
//! Old versions can be trimmed away by collapsing their bytes into a
//! pivot version without disturbing anything newer.

pub mod apath;
pub mod archive;
pub mod backup;
pub mod bundle;
pub mod container;
pub mod diff;
pub mod errors;
pub mod manifest;
pub mod restore;
pub mod scan;
pub mod test_fixtures;
pub mod trim;
pub mod verid;

pub use archive::{Archive, VersionSelector};
pub use backup::{build, save, BackupOptions, SaveStats};
pub use bundle::{open_bundle, BundleWriter};
pub use container::{replace_atomically, ContainerReader, ContainerWriter, MemberSlice};
pub use diff::{diff_tree, WorkingVersion};
pub use errors::{Error, Result};
pub use manifest::{ArchiveInfo, FileEntry, VersionManifest};
pub use restore::{restore, restore_to_bundle, RestoreStats};
pub use scan::{PatternSet, ScanEntry, Scanner};
pub use trim::{trim, trim_to_count};
pub use verid::VersionId;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for streaming copies in and out of archives.
pub const COPY_BUF_SIZE: usize = 4 << 20;

/// In-memory ceiling for bundle assembly before spilling to disk.
pub const SPOOL_THRESHOLD: usize = 256_000_000;

/// Bundle-to-bundle copies of entries above this size stage through a
/// temporary directory instead of memory.
pub const BUNDLE_SPILL_SIZE: u64 = 50_000_000;
