//! Maven-style coordinates and their deterministic store paths.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// `group:artifact:version[:classifier][@extension]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
    pub extension: String,
}

impl Coordinate {
    /// Parse a coordinate. A surrounding `[...]` reference form is accepted.
    ///
    /// Segments past the fourth are folded into the classifier with `-`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let text = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);

        let (body, extension) = match text.rsplit_once('@') {
            Some((body, ext)) if !ext.is_empty() && !ext.contains(':') => (body, ext),
            _ => (text, "jar"),
        };

        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() < 3 || parts[..3].iter().any(|p| p.is_empty()) {
            return Err(Error::format(format!("invalid maven coordinate: {}", raw)));
        }

        let classifier = if parts.len() > 3 {
            let joined = parts[3..].join("-");
            (!joined.is_empty()).then_some(joined)
        } else {
            None
        };

        Ok(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier,
            extension: extension.to_string(),
        })
    }

    /// Whether `raw` is a bracketed `[coordinate]` reference.
    pub fn is_reference(raw: &str) -> bool {
        raw.len() > 2 && raw.starts_with('[') && raw.ends_with(']')
    }

    /// Directory part: group dots become separators, then artifact and version.
    pub fn directory(&self) -> String {
        format!(
            "{}/{}/{}",
            self.group.replace('.', "/"),
            self.artifact,
            self.version
        )
    }

    /// `artifact-version[-classifier].ext`
    pub fn file_name(&self, classifier: Option<&str>, extension: &str) -> String {
        match classifier {
            Some(c) if !c.is_empty() => {
                format!("{}-{}-{}.{}", self.artifact, self.version, c, extension)
            }
            _ => format!("{}-{}.{}", self.artifact, self.version, extension),
        }
    }

    /// Store-relative path using this coordinate's own classifier and extension.
    pub fn relative_path(&self) -> String {
        self.relative_path_with(self.classifier.as_deref(), &self.extension)
    }

    /// Store-relative path with an explicit classifier and extension.
    pub fn relative_path_with(&self, classifier: Option<&str>, extension: &str) -> String {
        format!("{}/{}", self.directory(), self.file_name(classifier, extension))
    }

    /// Absolute path of this coordinate under `root`.
    pub fn path_in(&self, root: &Path) -> PathBuf {
        join_relative(root, &self.relative_path())
    }
}

/// Join a `/`-separated relative path onto `root` component by component.
pub fn join_relative(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|c| !c.is_empty())
        .fold(root.to_path_buf(), |acc, c| acc.join(c))
}

impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Coordinate::parse(s)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        if self.extension != "jar" {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forge_coordinate_path() {
        let coord = Coordinate::parse("net.minecraftforge:forge:1.12.2-14.23.5.2854").unwrap();
        assert_eq!(coord.directory(), "net/minecraftforge/forge/1.12.2-14.23.5.2854");
        assert_eq!(
            coord.file_name(None, "jar"),
            "forge-1.12.2-14.23.5.2854.jar"
        );
        assert_eq!(
            coord.relative_path(),
            "net/minecraftforge/forge/1.12.2-14.23.5.2854/forge-1.12.2-14.23.5.2854.jar"
        );
    }

    #[test]
    fn classifier_and_extension() {
        let coord =
            Coordinate::parse("net.minecraft:client:1.16.5-20210115.111550:srg@txt").unwrap();
        assert_eq!(coord.classifier.as_deref(), Some("srg"));
        assert_eq!(coord.extension, "txt");
        assert_eq!(
            coord.relative_path(),
            "net/minecraft/client/1.16.5-20210115.111550/client-1.16.5-20210115.111550-srg.txt"
        );
    }

    #[test]
    fn extension_without_classifier() {
        let coord =
            Coordinate::parse("[de.oceanlabs.mcp:mcp_config:1.16.2-20200812.004259@zip]").unwrap();
        assert_eq!(coord.classifier, None);
        assert_eq!(
            coord.relative_path(),
            "de/oceanlabs/mcp/mcp_config/1.16.2-20200812.004259/mcp_config-1.16.2-20200812.004259.zip"
        );
    }

    #[test]
    fn extra_segments_join_into_classifier() {
        let coord = Coordinate::parse("org.lwjgl:lwjgl:3.3.1:natives:windows").unwrap();
        assert_eq!(coord.file_name(coord.classifier.as_deref(), "jar"), "lwjgl-3.3.1-natives-windows.jar");
    }

    #[test]
    fn too_few_segments_is_format_error() {
        assert!(matches!(
            Coordinate::parse("net.minecraftforge:forge"),
            Err(Error::Format(_))
        ));
        assert!(matches!(Coordinate::parse("a::c"), Err(Error::Format(_))));
    }

    #[test]
    fn path_is_stable_across_parses() {
        let raw = "com.mojang:patchy:1.3.9";
        let first = Coordinate::parse(raw).unwrap().relative_path();
        let second = Coordinate::parse(&Coordinate::parse(raw).unwrap().to_string())
            .unwrap()
            .relative_path();
        assert_eq!(first, second);
    }

    #[test]
    fn path_in_joins_components() {
        let root = Path::new("libs");
        let coord = Coordinate::parse("a.b:c:1").unwrap();
        assert_eq!(
            coord.path_in(root),
            Path::new("libs").join("a").join("b").join("c").join("1").join("c-1.jar")
        );
    }
}
