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

//! Versions are identified by a string like `2026-08-01-153012`, derived
//! from the local wall-clock time of the build that created them.
//!
//! Because build times within one archive are strictly increasing, the
//! lexicographic order of ids matches their chronological order, and
//! `VersionId` implements a total ordering `std::cmp::Ord` on that basis.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::errors::{Error, Result};

const ID_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]-[hour][minute][second]");

/// The UTC offset used for id formatting and display.
///
/// Looking up the local offset can fail on platforms where it is unsound
/// to read the environment from a threaded process; UTC is used then.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Identifier for a version within an archive, eg '2026-08-01-153012'.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionId(String);

impl VersionId {
    /// Make the id for a version built at `time` (Unix seconds), using
    /// the local calendar.
    pub fn from_unix(time: i64) -> Result<VersionId> {
        let when = OffsetDateTime::from_unix_timestamp(time)
            .map_err(|_| Error::TimeOutOfRange { time })?
            .to_offset(local_offset());
        let string_form = when
            .format(ID_FORMAT)
            .map_err(|_| Error::TimeOutOfRange { time })?;
        Ok(VersionId(string_form))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Archive member name of this version's manifest.
    pub fn manifest_member(&self) -> String {
        format!("versions/{}/version.json", self.0)
    }

    /// Archive member name of this version's data bundle.
    pub fn data_member(&self) -> String {
        format!("versions/{}/data.zip", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VersionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<VersionId> {
        // Round-tripping through the calendar rejects anything that is
        // not a well-formed YYYY-MM-DD-HHMMSS stamp.
        PrimitiveDateTime::parse(s, ID_FORMAT)
            .map_err(|_| Error::InvalidVersionId { id: s.to_owned() })?;
        Ok(VersionId(s.to_owned()))
    }
}

impl TryFrom<String> for VersionId {
    type Error = Error;

    fn try_from(s: String) -> Result<VersionId> {
        s.parse()
    }
}

impl From<VersionId> for String {
    fn from(id: VersionId) -> String {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::VersionId;

    #[test]
    fn format_and_parse_round_trip() {
        let id = VersionId::from_unix(1_700_000_000).unwrap();
        assert_eq!(id.as_str().len(), "2023-11-14-221320".len());
        let reparsed: VersionId = id.as_str().parse().unwrap();
        assert_eq!(reparsed, id);
    }

    #[test]
    fn member_names() {
        let id: VersionId = "2026-08-01-120000".parse().unwrap();
        assert_eq!(id.manifest_member(), "versions/2026-08-01-120000/version.json");
        assert_eq!(id.data_member(), "versions/2026-08-01-120000/data.zip");
    }

    #[test]
    fn id_order_matches_time_order() {
        let earlier = VersionId::from_unix(1_700_000_000).unwrap();
        let later = VersionId::from_unix(1_700_000_001).unwrap();
        let much_later = VersionId::from_unix(1_700_086_400).unwrap();
        assert!(earlier < later);
        assert!(later < much_later);
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "b0001", "2026-08-01", "2026-08-01-256161", "20260801-120000"] {
            assert!(bad.parse::<VersionId>().is_err(), "{bad:?} should not parse");
        }
    }
}
