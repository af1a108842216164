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

//! Walk a source tree and select the files to consider for a version.
//!
//! Patterns are shell-style globs (`*`, `?`, `[...]`) matched against
//! `/`-separated paths relative to the source root, with `/` treated as
//! an ordinary character. Include patterns additionally keep ancestor
//! directories of their targets alive so that the walk can reach them;
//! exclude patterns prune whole directories before descent.
//!
//! Unreadable entries below the root are logged and skipped; an
//! unreadable root is fatal.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use globset::{Glob, GlobMatcher};
use tracing::warn;

use crate::apath;
use crate::errors::{Error, Result};

/// One candidate file found in the source tree.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    /// `/`-separated path relative to the source root.
    pub apath: String,
    /// Absolute path on the host filesystem.
    pub path: PathBuf,
    pub size: u64,
    /// Modification time as fractional Unix seconds.
    pub mtime: f64,
}

#[derive(Debug)]
struct Pattern {
    text: String,
    matcher: GlobMatcher,
    /// Matches anything under the pattern's parent directory; used by
    /// the directory-keep rule for includes.
    parent_matcher: GlobMatcher,
}

/// A list of glob patterns, matched one by one.
#[derive(Debug)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

fn normalize(pattern: &str) -> String {
    let mut text = pattern.replace('\\', "/");
    while let Some(stripped) = text.strip_prefix("./") {
        text = stripped.to_owned();
    }
    while text.len() > 1 && text.ends_with('/') {
        text.pop();
    }
    text
}

fn compile(pattern: &str) -> Result<GlobMatcher> {
    Ok(Glob::new(pattern)
        .map_err(|source| Error::InvalidGlob {
            pattern: pattern.to_owned(),
            source,
        })?
        .compile_matcher())
}

impl PatternSet {
    pub fn from_strings(patterns: &[String]) -> Result<PatternSet> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let text = normalize(raw);
            let matcher = compile(&text)?;
            let parent = match text.rfind('/') {
                Some(idx) => format!("{}/*", &text[..idx]),
                None => "*".to_owned(),
            };
            let parent_matcher = compile(&parent)?;
            compiled.push(Pattern {
                text,
                matcher,
                parent_matcher,
            });
        }
        Ok(PatternSet { patterns: compiled })
    }

    /// The normalized pattern strings, as persisted in `info.json`.
    pub fn texts(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.text.clone()).collect()
    }

    pub fn matches(&self, rel: &str) -> bool {
        self.patterns.iter().any(|p| p.matcher.is_match(rel))
    }

    /// True if the walk should descend into `drel` on the way to some
    /// pattern's targets: the pattern leads below this directory, the
    /// directory sits under the pattern's parent, or the pattern is a
    /// bare name that can match at any depth.
    fn keeps_dir(&self, drel: &str) -> bool {
        self.patterns.iter().any(|p| {
            p.text.starts_with(drel) || p.parent_matcher.is_match(drel) || !p.text.contains('/')
        })
    }
}

/// Walks a source tree applying include and exclude patterns.
#[derive(Debug)]
pub struct Scanner {
    include: Option<PatternSet>,
    exclude: Option<PatternSet>,
}

impl Scanner {
    /// Empty pattern lists mean "no filter on that side".
    pub fn new(include: &[String], exclude: &[String]) -> Result<Scanner> {
        let include = if include.is_empty() {
            None
        } else {
            Some(PatternSet::from_strings(include)?)
        };
        let exclude = if exclude.is_empty() {
            None
        } else {
            Some(PatternSet::from_strings(exclude)?)
        };
        Ok(Scanner { include, exclude })
    }

    pub fn include_texts(&self) -> Option<Vec<String>> {
        self.include.as_ref().map(PatternSet::texts)
    }

    pub fn exclude_texts(&self) -> Option<Vec<String>> {
        self.exclude.as_ref().map(PatternSet::texts)
    }

    /// Walk `source` depth-first and return the selected files.
    pub fn scan(&self, source: &Path) -> Result<Vec<ScanEntry>> {
        let mut entries = Vec::new();
        self.walk(source, "", &mut entries)?;
        Ok(entries)
    }

    fn prunes_dir(&self, drel: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.keeps_dir(drel) {
                return true;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.matches(drel) {
                return true;
            }
        }
        false
    }

    fn selects_file(&self, frel: &str) -> bool {
        if let Some(include) = &self.include {
            if !include.matches(frel) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.matches(frel) {
                return false;
            }
        }
        true
    }

    fn walk(&self, dir: &Path, rel: &str, out: &mut Vec<ScanEntry>) -> Result<()> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(source) if rel.is_empty() => {
                return Err(Error::ListSourceTree {
                    path: dir.to_owned(),
                    source,
                })
            }
            Err(source) => {
                warn!("Skipping unreadable directory {:?}: {}", dir, source);
                return Ok(());
            }
        };

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for de in read {
            let de = match de {
                Ok(de) => de,
                Err(source) => {
                    warn!("Skipping unreadable entry in {:?}: {}", dir, source);
                    continue;
                }
            };
            let name = match de.file_name().into_string() {
                Ok(name) => name,
                Err(name) => {
                    warn!("Skipping non-UTF-8 name {:?} in {:?}", name, dir);
                    continue;
                }
            };
            if name.contains('\\') {
                // Archive names use backslash-free apaths.
                warn!("Skipping name with backslash {:?} in {:?}", name, dir);
                continue;
            }
            // Symlinks are followed for files and never descended into.
            let is_dir = match de.file_type() {
                Ok(t) if t.is_dir() => true,
                Ok(t) if t.is_file() => false,
                Ok(t) if t.is_symlink() => match fs::metadata(de.path()) {
                    Ok(m) if m.is_file() => false,
                    _ => continue,
                },
                Ok(_) => continue,
                Err(source) => {
                    warn!("Skipping unreadable entry {:?}: {}", de.path(), source);
                    continue;
                }
            };
            if is_dir {
                dirs.push(name);
            } else {
                files.push(name);
            }
        }
        files.sort_unstable();
        dirs.sort_unstable();

        // Collect the prune set first, then subtract it.
        let pruned: Vec<String> = dirs
            .iter()
            .filter(|name| self.prunes_dir(&apath::join(rel, name)))
            .cloned()
            .collect();
        dirs.retain(|name| !pruned.contains(name));

        for name in files {
            let frel = apath::join(rel, &name);
            if !self.selects_file(&frel) {
                continue;
            }
            let path = dir.join(&name);
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(source) => {
                    warn!("Skipping unreadable file {:?}: {}", path, source);
                    continue;
                }
            };
            let mtime = match metadata.modified().map(|m| m.duration_since(UNIX_EPOCH)) {
                Ok(Ok(after)) => after.as_secs_f64(),
                Ok(Err(before)) => -before.duration().as_secs_f64(),
                Err(source) => {
                    warn!("Skipping file without mtime {:?}: {}", path, source);
                    continue;
                }
            };
            out.push(ScanEntry {
                apath: frel,
                path,
                size: metadata.len(),
                mtime,
            });
        }

        for name in dirs {
            let drel = apath::join(rel, &name);
            self.walk(&dir.join(&name), &drel, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TreeFixture;

    fn names(entries: &[ScanEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.apath.as_str()).collect()
    }

    #[test]
    fn scans_everything_without_patterns() {
        let tree = TreeFixture::new();
        tree.create_file_with_contents("a.txt", b"hello");
        tree.create_dir("sub");
        tree.create_file_with_contents("sub/b.png", &[0u8; 128]);

        let scanner = Scanner::new(&[], &[]).unwrap();
        let entries = scanner.scan(tree.path()).unwrap();
        assert_eq!(names(&entries), ["a.txt", "sub/b.png"]);
        assert_eq!(entries[0].size, 5);
        assert!(entries[0].mtime > 0.0);
    }

    #[test]
    fn exclude_prunes_directories_before_descent() {
        let tree = TreeFixture::new();
        tree.create_dir("keep");
        tree.create_dir("drop");
        tree.create_file_with_contents("keep/one", b"1");
        tree.create_file_with_contents("drop/two", b"2");
        tree.create_file_with_contents("drop.txt", b"3");

        let scanner = Scanner::new(&[], &["drop".to_owned()]).unwrap();
        let entries = scanner.scan(tree.path()).unwrap();
        assert_eq!(names(&entries), ["drop.txt", "keep/one"]);
    }

    #[test]
    fn exclude_filters_files_by_glob() {
        let tree = TreeFixture::new();
        tree.create_file_with_contents("notes.txt", b"n");
        tree.create_file_with_contents("notes.bak", b"n");
        tree.create_dir("sub");
        tree.create_file_with_contents("sub/more.bak", b"n");

        let scanner = Scanner::new(&[], &["*.bak".to_owned()]).unwrap();
        let entries = scanner.scan(tree.path()).unwrap();
        // `*` crosses `/`, so the exclusion reaches nested files too.
        assert_eq!(names(&entries), ["notes.txt"]);
    }

    #[test]
    fn include_with_directory_pattern_keeps_its_subtree_only() {
        let tree = TreeFixture::new();
        tree.create_dir("docs");
        tree.create_dir("srcdir");
        tree.create_file_with_contents("docs/guide.md", b"g");
        tree.create_file_with_contents("docs/guide.rst", b"g");
        tree.create_file_with_contents("srcdir/main.c", b"m");
        tree.create_file_with_contents("top.md", b"t");

        let scanner = Scanner::new(&["docs/*.md".to_owned()], &[]).unwrap();
        let entries = scanner.scan(tree.path()).unwrap();
        assert_eq!(names(&entries), ["docs/guide.md"]);
    }

    #[test]
    fn bare_name_include_matches_at_any_depth() {
        let tree = TreeFixture::new();
        tree.create_dir("a");
        tree.create_dir("a/b");
        tree.create_file_with_contents("a/b/wanted.txt", b"w");
        tree.create_file_with_contents("a/other.log", b"o");

        let scanner = Scanner::new(&["*.txt".to_owned()], &[]).unwrap();
        let entries = scanner.scan(tree.path()).unwrap();
        assert_eq!(names(&entries), ["a/b/wanted.txt"]);
    }

    #[test]
    fn include_and_exclude_compose() {
        let tree = TreeFixture::new();
        tree.create_dir("docs");
        tree.create_file_with_contents("docs/keep.md", b"k");
        tree.create_file_with_contents("docs/skip.md", b"s");

        let scanner =
            Scanner::new(&["docs/*".to_owned()], &["docs/skip*".to_owned()]).unwrap();
        let entries = scanner.scan(tree.path()).unwrap();
        assert_eq!(names(&entries), ["docs/keep.md"]);
    }

    #[test]
    fn unreadable_root_is_fatal() {
        let tree = TreeFixture::new();
        let missing = tree.path().join("nonexistent");
        let scanner = Scanner::new(&[], &[]).unwrap();
        assert!(matches!(
            scanner.scan(&missing),
            Err(Error::ListSourceTree { .. })
        ));
    }

    #[test]
    fn pattern_normalization() {
        let set = PatternSet::from_strings(&["./docs/".to_owned(), "a\\b".to_owned()]).unwrap();
        assert_eq!(set.texts(), ["docs", "a/b"]);
    }
}
