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

//! Text output for the `info` command.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

use strata::verid::local_offset;
use strata::{Archive, Error, Result};

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second]");

const COLUMN_GAP: usize = 2;

/// Print the version table: ordinal, local build time, file count, and
/// size in decimal kilobytes.
pub fn show_info(archive: &Archive) -> Result<()> {
    // An archive that has never been saved records no source.
    let src = archive.info().map(|info| info.src.as_str()).unwrap_or("-");
    println!("Source: {src}");
    println!();

    let headers = ["No.", "Time", "Files", "Size"];
    let mut rows: Vec<[String; 4]> = Vec::new();
    for (index, version) in archive.versions().enumerate() {
        let when = OffsetDateTime::from_unix_timestamp(version.time)
            .map_err(|_| Error::TimeOutOfRange { time: version.time })?
            .to_offset(local_offset());
        let time_str = when
            .format(TIMESTAMP_FORMAT)
            .map_err(|_| Error::TimeOutOfRange { time: version.time })?;
        rows.push([
            (index + 1).to_string(),
            time_str,
            version.files.len().to_string(),
            kilobytes(version.size).to_string(),
        ]);
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.len());
        }
    }

    println!(
        "{}",
        headers
            .iter()
            .zip(&widths)
            .map(|(h, &w)| format!("{h:<w$}"))
            .collect::<Vec<_>>()
            .join(&" ".repeat(COLUMN_GAP))
    );
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join(&" ".repeat(COLUMN_GAP))
    );
    for row in &rows {
        println!(
            "{}",
            row.iter()
                .zip(&widths)
                .map(|(cell, &w)| format!("{cell:<w$}"))
                .collect::<Vec<_>>()
                .join(&" ".repeat(COLUMN_GAP))
        );
    }
    Ok(())
}

/// Decimal kilobytes, rounded to nearest.
fn kilobytes(bytes: u64) -> u64 {
    (bytes as f64 / 1000.0).round() as u64
}

#[cfg(test)]
mod tests {
    use super::kilobytes;

    #[test]
    fn kilobyte_rounding_is_decimal() {
        assert_eq!(kilobytes(0), 0);
        assert_eq!(kilobytes(499), 0);
        assert_eq!(kilobytes(500), 1);
        assert_eq!(kilobytes(133), 0);
        assert_eq!(kilobytes(1_500), 2);
        assert_eq!(kilobytes(123_456), 123);
    }
}
