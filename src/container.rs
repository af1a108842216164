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

//! The outer archive container: an append-only tar file of named members.
//!
//! The container knows nothing about versions. It offers three things to
//! the layers above: a member listing with whole-member reads, a seekable
//! view of a single member (the data bundles nested inside are
//! random-access archives and need `Read + Seek`), and an appending
//! writer that treats a missing file and an existing archive alike.
//!
//! Members are never rewritten in place; `trim` builds a sibling file and
//! commits it with [`replace_atomically`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{Error, Result};
use crate::COPY_BUF_SIZE;

const TAR_BLOCK: u64 = 512;

#[derive(Debug, Clone, Copy)]
struct MemberInfo {
    /// Byte offset of the member's data within the archive file.
    offset: u64,
    size: u64,
}

/// Read access to an existing archive container.
///
/// The member table is scanned once on open; individual reads then seek
/// straight to the member's bytes.
#[derive(Debug)]
pub struct ContainerReader {
    path: PathBuf,
    members: BTreeMap<String, MemberInfo>,
}

impl ContainerReader {
    pub fn open(path: &Path) -> Result<ContainerReader> {
        let file = File::open(path).map_err(|source| Error::OpenArchive {
            path: path.to_owned(),
            source,
        })?;
        let file_len = file
            .metadata()
            .map_err(|source| Error::OpenArchive {
                path: path.to_owned(),
                source,
            })?
            .len();
        let mut members = BTreeMap::new();
        let mut archive = tar::Archive::new(file);
        let entries = archive.entries().map_err(|source| Error::ReadArchive {
            path: path.to_owned(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| Error::ReadArchive {
                path: path.to_owned(),
                source,
            })?;
            let name = entry
                .path()
                .map_err(|source| Error::ReadArchive {
                    path: path.to_owned(),
                    source,
                })?
                .to_string_lossy()
                .into_owned();
            let info = MemberInfo {
                offset: entry.raw_file_position(),
                size: entry.size(),
            };
            if info.offset + info.size > file_len {
                return Err(Error::ShortRead { member: name });
            }
            members.insert(name, info);
        }
        Ok(ContainerReader {
            path: path.to_owned(),
            members,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Member names in sorted order.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn member_size(&self, name: &str) -> Result<u64> {
        self.members
            .get(name)
            .map(|info| info.size)
            .ok_or_else(|| Error::MissingMember {
                member: name.to_owned(),
            })
    }

    /// Read a whole member into memory. Intended for the small JSON
    /// members; bundles go through [`ContainerReader::member_slice`].
    pub fn read_member(&self, name: &str) -> Result<Vec<u8>> {
        let info = *self.members.get(name).ok_or_else(|| Error::MissingMember {
            member: name.to_owned(),
        })?;
        let mut file = File::open(&self.path).map_err(|source| Error::OpenArchive {
            path: self.path.clone(),
            source,
        })?;
        file.seek(SeekFrom::Start(info.offset))
            .map_err(|source| Error::ReadArchive {
                path: self.path.clone(),
                source,
            })?;
        let mut buf = vec![0u8; info.size as usize];
        file.read_exact(&mut buf).map_err(|_| Error::ShortRead {
            member: name.to_owned(),
        })?;
        Ok(buf)
    }

    /// Open a member as an independently seekable stream over its own
    /// file handle.
    pub fn member_slice(&self, name: &str) -> Result<MemberSlice> {
        let info = *self.members.get(name).ok_or_else(|| Error::MissingMember {
            member: name.to_owned(),
        })?;
        let file = File::open(&self.path).map_err(|source| Error::OpenArchive {
            path: self.path.clone(),
            source,
        })?;
        let file_len = file
            .metadata()
            .map_err(|source| Error::ReadArchive {
                path: self.path.clone(),
                source,
            })?
            .len();
        if info.offset + info.size > file_len {
            return Err(Error::ShortRead {
                member: name.to_owned(),
            });
        }
        Ok(MemberSlice {
            file,
            start: info.offset,
            len: info.size,
            pos: 0,
        })
    }
}

/// A `Read + Seek` window onto one member of the container.
#[derive(Debug)]
pub struct MemberSlice {
    file: File,
    start: u64,
    len: u64,
    pos: u64,
}

impl MemberSlice {
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Read for MemberSlice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len {
            return Ok(0);
        }
        let want = buf.len().min((self.len - self.pos) as usize);
        self.file.seek(SeekFrom::Start(self.start + self.pos))?;
        let n = self.file.read(&mut buf[..want])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemberSlice {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => n as i128,
            SeekFrom::End(n) => self.len as i128 + n as i128,
            SeekFrom::Current(n) => self.pos as i128 + n as i128,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of member",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Appending writer over the container.
///
/// Opening a path with no file and opening an existing archive behave
/// the same apart from the starting member set.
pub struct ContainerWriter {
    path: PathBuf,
    builder: tar::Builder<File>,
    existing: BTreeSet<String>,
}

impl ContainerWriter {
    /// Start a fresh archive, truncating anything already at `path`.
    pub fn create(path: &Path) -> Result<ContainerWriter> {
        let file = File::create(path).map_err(|source| Error::WriteArchive {
            path: path.to_owned(),
            source,
        })?;
        Ok(ContainerWriter {
            path: path.to_owned(),
            builder: tar::Builder::new(file),
            existing: BTreeSet::new(),
        })
    }

    /// Open `path` for appending, creating a fresh archive if absent.
    pub fn append(path: &Path) -> Result<ContainerWriter> {
        if !path.is_file() {
            return ContainerWriter::create(path);
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::OpenArchive {
                path: path.to_owned(),
                source,
            })?;
        let mut existing = BTreeSet::new();
        let mut data_end = 0;
        {
            let mut archive = tar::Archive::new(&mut file);
            let entries = archive.entries().map_err(|source| Error::ReadArchive {
                path: path.to_owned(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| Error::ReadArchive {
                    path: path.to_owned(),
                    source,
                })?;
                existing.insert(
                    entry
                        .path()
                        .map_err(|source| Error::ReadArchive {
                            path: path.to_owned(),
                            source,
                        })?
                        .to_string_lossy()
                        .into_owned(),
                );
                let end = entry.raw_file_position() + entry.size();
                data_end = (end + TAR_BLOCK - 1) & !(TAR_BLOCK - 1);
            }
        }
        // Cut off the old end-of-archive marker; new members continue
        // from the end of the last one.
        file.set_len(data_end)
            .map_err(|source| Error::WriteArchive {
                path: path.to_owned(),
                source,
            })?;
        file.seek(SeekFrom::Start(data_end))
            .map_err(|source| Error::WriteArchive {
                path: path.to_owned(),
                source,
            })?;
        Ok(ContainerWriter {
            path: path.to_owned(),
            builder: tar::Builder::new(file),
            existing,
        })
    }

    /// True if the archive already held this member when the writer was
    /// opened.
    pub fn has_member(&self, name: &str) -> bool {
        self.existing.contains(name)
    }

    /// Append a member of known size from a stream.
    pub fn add_member<R: Read>(&mut self, name: &str, data: R, size: u64) -> Result<()> {
        let mut header = tar::Header::new_gnu();
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(unix_now());
        self.builder
            .append_data(
                &mut header,
                name,
                BufReader::with_capacity(COPY_BUF_SIZE, data.take(size)),
            )
            .map_err(|source| Error::WriteArchive {
                path: self.path.clone(),
                source,
            })?;
        Ok(())
    }

    pub fn add_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.add_member(name, bytes, bytes.len() as u64)
    }

    /// Write the end-of-archive marker and flush.
    pub fn finish(self) -> Result<()> {
        let mut file = self
            .builder
            .into_inner()
            .map_err(|source| Error::WriteArchive {
                path: self.path.clone(),
                source,
            })?;
        file.flush().map_err(|source| Error::WriteArchive {
            path: self.path,
            source,
        })?;
        Ok(())
    }
}

/// Move a finished temporary archive onto `dst`, dropping any file
/// already there.
pub fn replace_atomically(working: &Path, dst: &Path) -> Result<()> {
    if dst.is_file() {
        fs::remove_file(dst).map_err(|source| Error::WriteArchive {
            path: dst.to_owned(),
            source,
        })?;
    }
    fs::rename(working, dst).map_err(|source| Error::WriteArchive {
        path: dst.to_owned(),
        source,
    })
}

/// Streaming copy with a large buffer, as used for bundle extraction.
pub(crate) fn copy_stream<R: Read + ?Sized, W: Write + ?Sized>(
    from: &mut R,
    to: &mut W,
) -> io::Result<u64> {
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut written = 0;
    loop {
        let n = from.read(&mut buf)?;
        if n == 0 {
            return Ok(written);
        }
        to.write_all(&buf[..n])?;
        written += n as u64;
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
