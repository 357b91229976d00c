//! Classpath construction for launching a resolved profile

use crate::game::installer::types::OsType;
use crate::game::store::LibraryStore;
use crate::game::version::{VersionProfile, VersionStore};
use std::collections::HashSet;
use std::path::PathBuf;

/// Absolute classpath entries: required non-native libraries in profile
/// order, then the game jar.
pub fn classpath_entries(
    profile: &VersionProfile,
    store: &LibraryStore,
    versions: &VersionStore,
) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for library in &profile.libraries {
        if library.is_native || !library.required {
            continue;
        }
        if !seen.insert(library.path.clone()) {
            continue;
        }

        let full_path = store.join(&library.path);
        if !full_path.exists() {
            log::warn!("Library not found on disk: {:?}", full_path);
        }
        entries.push(full_path);
    }

    let game_jar = versions.jar_path(&profile.jar);
    if !game_jar.exists() {
        log::warn!("Game jar not found: {:?}", game_jar);
    }
    entries.push(game_jar);
    entries
}

/// Join entries with the OS classpath separator.
pub fn build_classpath(entries: &[PathBuf], os: OsType) -> String {
    entries
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(os.classpath_separator())
}
