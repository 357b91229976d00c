use crate::error::Result;
use crate::game::maven::{join_relative, Coordinate};
use crate::utils::hash::file_matches_sha1;
use std::path::{Path, PathBuf};

/// The shared, append-only library directory keyed by coordinate paths.
///
/// Passed explicitly to every component that reads or writes libraries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryStore {
    root: PathBuf,
}

impl LibraryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a parsed coordinate.
    pub fn path_of(&self, coordinate: &Coordinate) -> PathBuf {
        coordinate.path_in(&self.root)
    }

    /// Parse `raw` (plain or `[bracketed]`) and return its absolute path.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf> {
        Ok(self.path_of(&Coordinate::parse(raw)?))
    }

    /// Absolute path of a store-relative `/`-separated path.
    pub fn join(&self, relative: &str) -> PathBuf {
        join_relative(&self.root, relative)
    }

    /// A file is satisfied when it exists and, if a checksum is known, matches it.
    pub fn is_satisfied(path: &Path, checksum: Option<&str>) -> bool {
        if !path.is_file() {
            return false;
        }
        match checksum {
            Some(expected) if !expected.is_empty() => file_matches_sha1(path, expected),
            _ => true,
        }
    }
}
