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

//! Per-version data bundles.
//!
//! A bundle is a zip archive holding the bytes a version owns. Entries
//! are deflated, except for extensions that are already compressed
//! (png, jpg, zip), which are stored as-is. Bundles are assembled in a
//! spooled temporary buffer that spills to disk past the in-memory
//! ceiling, then appended to the outer container in one pass.
//!
//! Entry timestamps mirror the source files' modification times, and are
//! preserved when entries are copied bundle-to-bundle, so rebuilding a
//! bundle from unchanged inputs reproduces the same bytes.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tempfile::SpooledTempFile;
use time::OffsetDateTime;
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::container::copy_stream;
use crate::errors::{Error, Result};
use crate::verid::local_offset;
use crate::{BUNDLE_SPILL_SIZE, SPOOL_THRESHOLD};

/// Extensions left uncompressed inside bundles.
const STORED_EXTENSIONS: &[&str] = &["png", "jpg", "zip"];

/// True if entries with this name are stored rather than deflated.
pub fn stored_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| STORED_EXTENSIONS.contains(&ext))
}

fn entry_options(name: &str, size: u64, modified: zip::DateTime) -> FileOptions {
    let method = if stored_extension(name) {
        CompressionMethod::Stored
    } else {
        CompressionMethod::Deflated
    };
    let mut options = FileOptions::default()
        .compression_method(method)
        .unix_permissions(0o644)
        .last_modified_time(modified);
    if size >= u32::MAX as u64 {
        options = options.large_file(true);
    }
    options
}

fn zip_datetime_from_unix(mtime: f64) -> zip::DateTime {
    OffsetDateTime::from_unix_timestamp(mtime as i64)
        .map(|odt| odt.to_offset(local_offset()))
        .ok()
        .and_then(|odt| zip::DateTime::try_from(odt).ok())
        .unwrap_or_default()
}

/// Writes a new data bundle into a spooled temporary buffer.
pub struct BundleWriter {
    zip: ZipWriter<SpooledTempFile>,
}

impl BundleWriter {
    pub fn new() -> BundleWriter {
        BundleWriter {
            zip: ZipWriter::new(tempfile::spooled_tempfile(SPOOL_THRESHOLD)),
        }
    }

    /// Add one source file under its archive name.
    pub fn add_file(&mut self, name: &str, path: &Path, size: u64, mtime: f64) -> Result<()> {
        let options = entry_options(name, size, zip_datetime_from_unix(mtime));
        self.zip
            .start_file(name, options)
            .map_err(|source| Error::CompressFile {
                apath: name.to_owned(),
                source,
            })?;
        let mut file = File::open(path).map_err(|source| Error::ReadSourceFile {
            path: path.to_owned(),
            source,
        })?;
        copy_stream(&mut file, &mut self.zip).map_err(|source| Error::CompressFile {
            apath: name.to_owned(),
            source: ZipError::Io(source),
        })?;
        Ok(())
    }

    /// Add an entry from an in-memory buffer or staged file.
    fn add_from_reader<R: Read>(
        &mut self,
        name: &str,
        options: FileOptions,
        data: &mut R,
    ) -> Result<()> {
        self.zip
            .start_file(name, options)
            .map_err(|source| Error::CompressFile {
                apath: name.to_owned(),
                source,
            })?;
        copy_stream(data, &mut self.zip).map_err(|source| Error::CompressFile {
            apath: name.to_owned(),
            source: ZipError::Io(source),
        })?;
        Ok(())
    }

    /// Finalize and rewind the bundle, returning it with its byte length.
    pub fn into_spool(mut self) -> Result<(SpooledTempFile, u64)> {
        let mut spool = self
            .zip
            .finish()
            .map_err(|source| Error::FinishBundle { source })?;
        let len = spool
            .seek(SeekFrom::End(0))
            .and_then(|len| spool.seek(SeekFrom::Start(0)).map(|_| len))
            .map_err(|source| Error::TempFile {
                path: std::env::temp_dir(),
                source,
            })?;
        Ok((spool, len))
    }
}

impl Default for BundleWriter {
    fn default() -> Self {
        BundleWriter::new()
    }
}

/// Open a bundle read from the outer container (or any seekable stream).
pub fn open_bundle<R: Read + Seek>(member: &str, reader: R) -> Result<ZipArchive<R>> {
    ZipArchive::new(reader).map_err(|source| Error::CorruptBundle {
        member: member.to_owned(),
        source,
    })
}

/// Extract one entry beneath `dest_root`, creating parent directories.
///
/// `name` must be a validated apath; it is joined as a relative path.
pub fn extract_file<R: Read + Seek>(
    bundle: &mut ZipArchive<R>,
    member: &str,
    name: &str,
    dest_root: &Path,
) -> Result<()> {
    let mut entry = bundle
        .by_name(name)
        .map_err(|source| Error::CorruptBundle {
            member: member.to_owned(),
            source,
        })?;
    let dest = dest_root.join(name);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::Restore {
            path: parent.to_owned(),
            source,
        })?;
    }
    let mut out = File::create(&dest).map_err(|source| Error::Restore {
        path: dest.clone(),
        source,
    })?;
    copy_stream(&mut entry, &mut out).map_err(|source| Error::Restore { path: dest, source })?;
    Ok(())
}

/// Copy one entry into another bundle, preserving its stored timestamp.
///
/// Small entries go through memory; entries larger than the spill
/// threshold are staged in a temporary directory first.
pub fn copy_entry<R: Read + Seek>(
    bundle: &mut ZipArchive<R>,
    member: &str,
    name: &str,
    out: &mut BundleWriter,
) -> Result<()> {
    let mut entry = bundle
        .by_name(name)
        .map_err(|source| Error::CorruptBundle {
            member: member.to_owned(),
            source,
        })?;
    let size = entry.size();
    let options = entry_options(name, size, entry.last_modified());
    if size > BUNDLE_SPILL_SIZE {
        let staging = tempfile::tempdir().map_err(|source| Error::TempFile {
            path: std::env::temp_dir(),
            source,
        })?;
        let staged_path = staging.path().join("entry");
        let mut staged = File::create(&staged_path).map_err(|source| Error::TempFile {
            path: staged_path.clone(),
            source,
        })?;
        copy_stream(&mut entry, &mut staged).map_err(|_| Error::ShortRead {
            member: member.to_owned(),
        })?;
        drop(entry);
        drop(staged);
        let mut staged = File::open(&staged_path).map_err(|source| Error::TempFile {
            path: staged_path,
            source,
        })?;
        out.add_from_reader(name, options, &mut staged)
    } else {
        let mut buf = Vec::with_capacity(size as usize);
        entry.read_to_end(&mut buf).map_err(|_| Error::ShortRead {
            member: member.to_owned(),
        })?;
        drop(entry);
        out.add_from_reader(name, options, &mut buf.as_slice())
    }
}
