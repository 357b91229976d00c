//! Sequential scan of an installer archive into a staging directory.

use super::config::{INSTALL_PROFILE_ENTRY, VERSION_ENTRY};
use crate::error::{IoResultExt, Result};
use std::io::{Read, Seek};
use std::path::Path;

/// What the scan captured in memory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractedDocuments {
    pub install_profile: Option<String>,
    pub version_json: Option<String>,
    /// Number of plain files written to staging
    pub files_written: usize,
}

/// Visit every entry in archive order. The two reserved manifest entries are
/// kept in memory, every other file entry is written under `staging`.
pub fn extract_installer<R: Read + Seek>(reader: R, staging: &Path) -> Result<ExtractedDocuments> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut docs = ExtractedDocuments::default();

    std::fs::create_dir_all(staging).at(staging)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();

        if name.is_empty() || entry.is_dir() {
            continue;
        }

        if name == INSTALL_PROFILE_ENTRY || name == VERSION_ENTRY {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| crate::Error::format(format!("{} is not UTF-8 text: {}", name, e)))?;
            if name == INSTALL_PROFILE_ENTRY {
                docs.install_profile = Some(text);
            } else {
                docs.version_json = Some(text);
            }
            continue;
        }

        let relative = match entry.enclosed_name() {
            Some(p) => p,
            None => {
                log::warn!("Skipping installer entry outside staging root: {}", name);
                continue;
            }
        };

        let dest = staging.join(relative);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        let mut out = std::fs::File::create(&dest).at(&dest)?;
        std::io::copy(&mut entry, &mut out).at(&dest)?;
        docs.files_written += 1;
        log::debug!("Extracted installer entry {} -> {:?}", name, dest);
    }

    log::info!(
        "Extracted {} installer entries (install profile: {}, version document: {})",
        docs.files_written,
        docs.install_profile.is_some(),
        docs.version_json.is_some()
    );

    Ok(docs)
}
