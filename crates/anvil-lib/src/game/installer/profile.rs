//! Install profile documents in both historical shapes, normalized into one.

use super::extractor::ExtractedDocuments;
use crate::error::{Error, Result};
use crate::game::version::{resolve_libraries, Library, LibraryEntry, RuleContext, VersionDocument};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-side data value (`data` table of an install profile).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidedDataEntry {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub server: String,
}

/// One post-install processing step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStep {
    /// Coordinate of the jar to execute
    pub jar: String,
    #[serde(default)]
    pub classpath: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    /// Output path template to expected SHA-1 template. Absent means the
    /// step always runs; present and empty means it never needs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sides: Option<Vec<String>>,
}

impl ProcessorStep {
    /// Steps without a side list run everywhere; otherwise they must name
    /// `client` or `extract`.
    pub fn runs_on_client(&self) -> bool {
        match &self.sides {
            Some(sides) => sides.iter().any(|s| s == "client" || s == "extract"),
            None => true,
        }
    }
}

/// Installer fields shared by both shapes. In the legacy shape they live
/// under `install`, in the modern shape at the document root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstallSection {
    /// Staging-relative path of the universal jar (legacy)
    #[serde(default, alias = "universalPath")]
    file_path: Option<String>,

    /// Store coordinate the universal jar is copied to (legacy)
    #[serde(default, alias = "destinationName")]
    path: Option<String>,

    #[serde(default)]
    target: Option<String>,

    #[serde(default)]
    version: Option<String>,

    #[serde(default)]
    minecraft: Option<String>,

    #[serde(default)]
    libraries: Vec<Library>,

    #[serde(default)]
    data: HashMap<String, SidedDataEntry>,

    #[serde(default)]
    processors: Vec<ProcessorStep>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstallProfileDocument {
    Legacy {
        install: InstallSection,
        #[serde(rename = "versionInfo")]
        version_info: serde_json::Value,
    },
    Modern(InstallSection),
}

/// Which shape the install profile had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileShape {
    Legacy,
    Modern,
}

/// Installer-side data needed to materialize libraries and run processors.
#[derive(Debug, Clone)]
pub struct InstallerMetadata {
    pub shape: ProfileShape,
    pub libraries: Vec<Library>,
    pub data: HashMap<String, SidedDataEntry>,
    pub processors: Vec<ProcessorStep>,
    pub legacy_universal_path: Option<String>,
    pub legacy_destination: Option<String>,
    pub target: Option<String>,
    pub version: Option<String>,
    pub minecraft: Option<String>,
}

impl InstallerMetadata {
    pub fn library_entries(&self, ctx: &RuleContext) -> Result<Vec<LibraryEntry>> {
        resolve_libraries(&self.libraries, ctx)
    }

    /// `target`, then `version`, then the supplied fallback.
    pub fn version_name(&self, fallback: impl FnOnce() -> String) -> String {
        let pick = |v: &Option<String>| v.as_ref().filter(|s| !s.trim().is_empty()).cloned();
        pick(&self.target)
            .or_else(|| pick(&self.version))
            .unwrap_or_else(fallback)
    }

    fn from_section(section: InstallSection, shape: ProfileShape) -> Self {
        Self {
            shape,
            libraries: section.libraries,
            data: section.data,
            processors: section.processors,
            legacy_universal_path: section.file_path,
            legacy_destination: section.path,
            target: section.target,
            version: section.version,
            minecraft: section.minecraft,
        }
    }
}

/// Parse the captured manifest texts into a version document and installer metadata.
pub fn normalize(docs: &ExtractedDocuments) -> Result<(VersionDocument, InstallerMetadata)> {
    let profile_text = docs
        .install_profile
        .as_deref()
        .ok_or_else(|| Error::format("install_profile.json not found in installer archive"))?;

    let profile: InstallProfileDocument = serde_json::from_str(profile_text)
        .map_err(|e| Error::format(format!("failed to parse install_profile.json: {}", e)))?;

    match profile {
        InstallProfileDocument::Legacy { install, version_info } => {
            log::info!("Found legacy install profile");
            let version: VersionDocument = serde_json::from_value(version_info)
                .map_err(|e| Error::format(format!("failed to parse versionInfo: {}", e)))?;
            Ok((
                version,
                InstallerMetadata::from_section(install, ProfileShape::Legacy),
            ))
        }
        InstallProfileDocument::Modern(section) => {
            let text = docs.version_json.as_deref().ok_or_else(|| {
                Error::format("installer has neither version.json nor a legacy versionInfo")
            })?;
            let version = VersionDocument::from_json(text)
                .map_err(|e| Error::format(format!("failed to parse version.json: {}", e)))?;
            log::debug!(
                "Parsed modern install profile: {} libraries, {} processors",
                section.libraries.len(),
                section.processors.len()
            );
            Ok((
                version,
                InstallerMetadata::from_section(section, ProfileShape::Modern),
            ))
        }
    }
}
