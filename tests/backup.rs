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

//! Tests focussed on build and save behavior.

use std::fs;

use pretty_assertions::assert_eq;

use strata::test_fixtures::{ScratchArchive, TreeFixture};
use strata::*;

fn build_and_save(af: &ScratchArchive, tree: &TreeFixture, options: &BackupOptions) -> SaveStats {
    let archive = Archive::open(af.path()).unwrap();
    let working = build(&archive, tree.path(), options).unwrap();
    save(&archive, tree.path(), &working, options).unwrap()
}

/// `a.txt` ("hello") and `sub/b.png` (128 bytes) with pinned mtimes.
fn small_source() -> TreeFixture {
    let tree = TreeFixture::new();
    tree.create_file_with_contents("a.txt", b"hello");
    tree.create_dir("sub");
    tree.create_file_with_contents("sub/b.png", &[42u8; 128]);
    tree.set_mtime("a.txt", 1_700_000_000, 250_000_000);
    tree.set_mtime("sub/b.png", 1_700_000_000, 0);
    tree
}

#[test]
fn first_build_stores_everything() {
    let af = ScratchArchive::new();
    let tree = small_source();
    let stats = build_and_save(&af, &tree, &BackupOptions::default());
    assert!(!stats.skipped);
    assert_eq!(stats.new_files, 2);
    assert_eq!(stats.stored_bytes, 133);

    let archive = Archive::open(af.path()).unwrap();
    assert_eq!(archive.version_count(), 1);
    let v1 = archive.last_version().unwrap();
    assert_eq!(v1.size, 133);
    assert_eq!(v1.sizedelta, 133);
    assert_eq!(v1.files.len(), 2);
    assert!(v1.files.values().all(|e| e.location == v1.id));
    // Fractional mtimes survive the manifest round trip.
    assert_eq!(v1.files["a.txt"].mtime, 1_700_000_000.25);

    let container = archive.open_container().unwrap();
    assert!(container.has_member("info.json"));
    assert!(container.has_member(&v1.id.manifest_member()));
    let member = v1.id.data_member();
    let mut data = open_bundle(&member, container.member_slice(&member).unwrap()).unwrap();
    assert_eq!(data.len(), 2);
    {
        let entry = data.by_name("a.txt").unwrap();
        assert_eq!(entry.compression(), zip::CompressionMethod::Deflated);
        assert_eq!(entry.size(), 5);
    }
    {
        let entry = data.by_name("sub/b.png").unwrap();
        assert_eq!(entry.compression(), zip::CompressionMethod::Stored);
        assert_eq!(entry.size(), 128);
    }
}

#[test]
fn unchanged_rebuild_is_skipped_and_archive_untouched() {
    let af = ScratchArchive::new();
    let tree = small_source();
    build_and_save(&af, &tree, &BackupOptions::default());
    let before = fs::read(af.path()).unwrap();

    let stats = build_and_save(&af, &tree, &BackupOptions::default());
    assert!(stats.skipped);
    assert_eq!(stats.new_files, 0);
    let after = fs::read(af.path()).unwrap();
    assert_eq!(before, after);

    let archive = Archive::open(af.path()).unwrap();
    assert_eq!(archive.version_count(), 1);
}

#[test]
fn changed_file_creates_incremental_version() {
    let af = ScratchArchive::new();
    let tree = small_source();
    build_and_save(&af, &tree, &BackupOptions::default());

    tree.create_file_with_contents("a.txt", b"hello!");
    tree.set_mtime("a.txt", 1_700_000_100, 0);
    let stats = build_and_save(&af, &tree, &BackupOptions::default());
    assert!(!stats.skipped);
    assert_eq!(stats.new_files, 1);
    assert_eq!(stats.stored_bytes, 6);

    let archive = Archive::open(af.path()).unwrap();
    assert_eq!(archive.version_count(), 2);
    let v1 = archive.version_by_num(1).unwrap();
    let v2 = archive.version_by_num(2).unwrap();
    assert_eq!(v2.files["a.txt"].location, v2.id);
    assert_eq!(v2.files["sub/b.png"].location, v1.id);
    assert_eq!(v2.sizedelta, 6);
    assert_eq!(v2.size, 134);

    // The new bundle owns exactly the changed file.
    let container = archive.open_container().unwrap();
    let member = v2.id.data_member();
    let mut data = open_bundle(&member, container.member_slice(&member).unwrap()).unwrap();
    assert_eq!(data.len(), 1);
    assert!(data.by_name("a.txt").is_ok());
}

#[test]
fn times_and_ids_stay_strictly_increasing() {
    let af = ScratchArchive::new();
    let tree = small_source();
    build_and_save(&af, &tree, &BackupOptions::default());

    // Rebuild within the same wall-clock second; the new version bumps
    // its time by one second rather than colliding.
    tree.create_file_with_contents("a.txt", b"hello again");
    tree.set_mtime("a.txt", 1_700_000_200, 0);
    build_and_save(&af, &tree, &BackupOptions::default());

    let archive = Archive::open(af.path()).unwrap();
    let times: Vec<i64> = archive.versions().map(|v| v.time).collect();
    assert!(times.windows(2).all(|w| w[0] < w[1]));
    let ids: Vec<&str> = archive.versions().map(|v| v.id.as_str()).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);
}

#[test]
fn size_accounting_holds_for_every_version() {
    let af = ScratchArchive::new();
    let tree = small_source();
    build_and_save(&af, &tree, &BackupOptions::default());
    tree.create_file_with_contents("c.txt", b"more data");
    tree.set_mtime("c.txt", 1_700_000_300, 0);
    build_and_save(&af, &tree, &BackupOptions::default());

    let archive = Archive::open(af.path()).unwrap();
    for version in archive.versions() {
        let total: u64 = version.files.values().map(|e| e.size).sum();
        let owned: u64 = version
            .files
            .values()
            .filter(|e| e.location == version.id)
            .map(|e| e.size)
            .sum();
        assert_eq!(version.size, total);
        assert_eq!(version.sizedelta, owned);
    }
}

#[test]
fn info_json_is_written_once_and_never_rewritten() {
    let af = ScratchArchive::new();
    let tree = small_source();
    let first = BackupOptions {
        id: Some("homedir".to_owned()),
        include: vec!["*.txt".to_owned(), "*.png".to_owned()],
        ..BackupOptions::default()
    };
    build_and_save(&af, &tree, &first);

    let archive = Archive::open(af.path()).unwrap();
    let info = archive.info().unwrap();
    assert_eq!(info.id.as_deref(), Some("homedir"));
    assert_eq!(
        info.include.as_deref(),
        Some(&["*.txt".to_owned(), "*.png".to_owned()][..])
    );
    assert_eq!(info.exclude, None);

    // A later build with different patterns scans differently but the
    // recorded info keeps its original values.
    tree.create_file_with_contents("a.txt", b"changed");
    tree.set_mtime("a.txt", 1_700_000_400, 0);
    let second = BackupOptions {
        exclude: vec!["*.png".to_owned()],
        ..BackupOptions::default()
    };
    build_and_save(&af, &tree, &second);

    let archive = Archive::open(af.path()).unwrap();
    let info = archive.info().unwrap();
    assert_eq!(info.id.as_deref(), Some("homedir"));
    assert_eq!(
        info.include.as_deref(),
        Some(&["*.txt".to_owned(), "*.png".to_owned()][..])
    );
    assert_eq!(info.exclude, None);
}

#[test]
fn excluded_files_are_not_scanned_into_the_version() {
    let af = ScratchArchive::new();
    let tree = small_source();
    let options = BackupOptions {
        exclude: vec!["sub".to_owned()],
        ..BackupOptions::default()
    };
    build_and_save(&af, &tree, &options);

    let archive = Archive::open(af.path()).unwrap();
    let v1 = archive.last_version().unwrap();
    assert_eq!(v1.files.len(), 1);
    assert!(v1.files.contains_key("a.txt"));
    assert_eq!(v1.size, 5);
}
