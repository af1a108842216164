// Strata backup system.
// Copyright 2024, 2025 Strata authors.

//! "Apaths" (archive paths) are platform-independent relative file paths
//! used as entry names inside archive versions.
//!
//! Archive paths are:
//!
//!  * Case-sensitive.
//!  * Components are separated by `/`, never `\`.
//!  * UTF-8, without consideration of normalization.
//!  * Do not contain `.`, `..`, or empty components.
//!  * Implicitly relative to the base of the backed-up directory.
//!
//! Apaths in memory are simply strings.

/// True if this apath is well-formed.
///
/// Rust strings are by contract always valid UTF-8, so to meet that
/// requirement for apaths it's enough to use a checked conversion from
/// bytes or an OsString.
pub fn valid(a: &str) -> bool {
    if a.contains('\\') {
        return false;
    }
    for part in a.split('/') {
        if part.is_empty() {
            // Repeated slash or slash at start of string.
            return false;
        } else if part == "." || part == ".." {
            return false;
        } else if part.contains('\0') {
            return false;
        }
    }
    true
}

/// Join a parent apath and a child name, treating the empty string as
/// the tree root.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::{join, valid};

    #[test]
    fn valid_cases() {
        let cases = [
            "a",
            "a/b",
            "a/b/c",
            "a/.config",
            "a/..obscure",
            "a/...",
            "kleine Katze Fuß",
        ];
        for v in cases {
            assert!(valid(v), "{v:?} incorrectly marked invalid");
        }
    }

    #[test]
    fn invalid_cases() {
        let cases = [
            "/",
            "/a",
            "a//b",
            "a/",
            "a//",
            "./a/b",
            "a/b/.",
            "a/./b",
            "a/b/../c",
            "../a",
            "a\\b",
            "hello\0",
        ];
        for v in cases {
            assert!(!valid(v), "{v:?} incorrectly marked valid");
        }
    }

    #[test]
    fn join_root() {
        assert_eq!(join("", "a.txt"), "a.txt");
        assert_eq!(join("sub", "b.png"), "sub/b.png");
        assert_eq!(join("a/b", "c"), "a/b/c");
    }
}
