//! Version profile documents, rule evaluation and the on-disk version store.

use crate::error::{Error, IoResultExt, Result};
use crate::game::installer::config::MINECRAFT_LIBRARIES_URL;
use crate::game::installer::types::OsType;
use crate::game::maven::Coordinate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A version document as it appears on disk and inside installer archives.
///
/// Unknown fields are retained in `extra` so a document survives a
/// load/save cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDocument {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,

    /// Version whose `<jar>.jar` is the game jar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,

    /// Pre-1.13 space separated game arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,

    #[serde(default)]
    pub libraries: Vec<Library>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndex>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub version_type: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,

    #[serde(default)]
    pub jvm: Vec<Argument>,
}

/// Argument that can be simple or conditional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Simple(String),
    Conditional { rules: Vec<Rule>, value: ArgumentValue },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ArgumentValue {
    fn values(&self) -> Vec<String> {
        match self {
            ArgumentValue::Single(s) => vec![s.clone()],
            ArgumentValue::Multiple(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: RuleAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// Library declaration inside a version document or installer profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,

    /// Repository base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    /// OS name to native classifier, may contain `${arch}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clientreq: Option<bool>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, Artifact>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndex {
    pub id: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Host facts that conditional rules are evaluated against.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub os: OsType,
    pub arch: String,
    pub os_version: String,
    pub features: HashMap<String, bool>,
}

impl RuleContext {
    /// Context describing the current machine with no features enabled.
    pub fn host() -> Self {
        Self {
            os: OsType::current(),
            arch: std::env::consts::ARCH.to_string(),
            os_version: sysinfo::System::long_os_version().unwrap_or_default(),
            features: HashMap::new(),
        }
    }

    pub fn for_os(os: OsType) -> Self {
        Self {
            os,
            arch: std::env::consts::ARCH.to_string(),
            os_version: String::new(),
            features: HashMap::new(),
        }
    }

    pub fn with_feature(mut self, name: &str, enabled: bool) -> Self {
        self.features.insert(name.to_string(), enabled);
        self
    }

    /// Evaluate an ordered rule list. The last matching rule decides; an
    /// empty list allows.
    pub fn allows(&self, rules: &[Rule]) -> bool {
        if rules.is_empty() {
            return true;
        }

        let mut allow = false;
        for rule in rules {
            if self.matches(rule) {
                allow = rule.action == RuleAction::Allow;
            }
        }
        allow
    }

    fn matches(&self, rule: &Rule) -> bool {
        if let Some(os_rule) = &rule.os {
            if let Some(name) = &os_rule.name {
                if name != self.os.as_str() {
                    return false;
                }
            }
            if let Some(arch) = &os_rule.arch {
                if arch != &self.arch {
                    return false;
                }
            }
            if let Some(expr) = &os_rule.version {
                // Unparsable patterns never match
                match Regex::new(expr) {
                    Ok(re) if re.is_match(&self.os_version) => {}
                    _ => return false,
                }
            }
        }

        if let Some(features) = &rule.features {
            for (key, expected) in features {
                let actual = self.features.get(key).copied().unwrap_or(false);
                if actual != *expected {
                    return false;
                }
            }
        }

        true
    }

    fn arch_bits(&self) -> &'static str {
        if self.arch.contains("64") {
            "64"
        } else {
            "32"
        }
    }
}

/// A library resolved against a rule context.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    pub coordinate: Coordinate,
    /// Store-relative `/`-separated path
    pub path: String,
    /// Rules permit the library on the context OS
    pub allowed: bool,
    /// Allowed and not marked `clientreq: false`
    pub required: bool,
    pub is_native: bool,
    pub download_url: Option<String>,
    pub checksum: Option<String>,
    pub extract_exclude: Vec<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

impl Library {
    /// Resolve into zero, one or two entries: the main artifact and, when the
    /// library declares natives for the context OS, the native classifier.
    pub fn resolve(&self, ctx: &RuleContext) -> Result<Vec<LibraryEntry>> {
        let coordinate = Coordinate::parse(&self.name)?;
        let allowed = self
            .rules
            .as_deref()
            .map(|rules| ctx.allows(rules))
            .unwrap_or(true);
        let required = allowed && self.clientreq != Some(false);
        let exclude = self
            .extract
            .as_ref()
            .map(|e| e.exclude.clone())
            .unwrap_or_default();

        let artifact = self.downloads.as_ref().and_then(|d| d.artifact.as_ref());
        let mut entries = Vec::new();

        if self.natives.is_none() || artifact.is_some() {
            let path = artifact
                .and_then(|a| non_empty(&a.path))
                .unwrap_or_else(|| coordinate.relative_path());
            let download_url = match artifact {
                Some(a) => non_empty(&a.url),
                None if self.downloads.is_none() => Some(join_url(
                    non_empty(&self.url)
                        .as_deref()
                        .unwrap_or(MINECRAFT_LIBRARIES_URL),
                    &path,
                )),
                None => None,
            };
            entries.push(LibraryEntry {
                coordinate: coordinate.clone(),
                path,
                allowed,
                required,
                is_native: false,
                download_url,
                checksum: artifact.and_then(|a| non_empty(&a.sha1)),
                extract_exclude: Vec::new(),
            });
        }

        if let Some(classifier) = self
            .natives
            .as_ref()
            .and_then(|n| n.get(ctx.os.as_str()))
            .map(|c| c.replace("${arch}", ctx.arch_bits()))
        {
            let declared = self
                .downloads
                .as_ref()
                .and_then(|d| d.classifiers.as_ref())
                .and_then(|c| c.get(&classifier));
            let path = declared
                .and_then(|a| non_empty(&a.path))
                .unwrap_or_else(|| {
                    coordinate.relative_path_with(Some(&classifier), &coordinate.extension)
                });
            let download_url = match declared {
                Some(a) => non_empty(&a.url),
                None => Some(join_url(
                    non_empty(&self.url)
                        .as_deref()
                        .unwrap_or(MINECRAFT_LIBRARIES_URL),
                    &path,
                )),
            };
            entries.push(LibraryEntry {
                coordinate,
                path,
                allowed,
                required,
                is_native: true,
                download_url,
                checksum: declared.and_then(|a| non_empty(&a.sha1)),
                extract_exclude: exclude,
            });
        }

        Ok(entries)
    }
}

/// Resolve every library, keeping declaration order.
pub fn resolve_libraries(libraries: &[Library], ctx: &RuleContext) -> Result<Vec<LibraryEntry>> {
    let mut out = Vec::new();
    for library in libraries {
        out.extend(library.resolve(ctx)?);
    }
    Ok(out)
}

/// Game arguments in one of the two historical shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum GameArguments {
    Template(Vec<String>),
    Legacy(String),
}

/// The canonical, rule-resolved view of a version used for launching.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionProfile {
    pub id: String,
    pub main_class: String,
    pub inherits_from: Option<String>,
    /// Version id whose `versions/<jar>/<jar>.jar` is the game jar
    pub jar: String,
    pub libraries: Vec<LibraryEntry>,
    pub jvm_arguments: Option<Vec<String>>,
    pub game_arguments: Option<GameArguments>,
    pub asset_index_id: Option<String>,
    pub version_type: Option<String>,
}

fn resolve_arguments(args: &[Argument], ctx: &RuleContext) -> Vec<String> {
    let mut out = Vec::new();
    for arg in args {
        match arg {
            Argument::Simple(s) => out.push(s.clone()),
            Argument::Conditional { rules, value } => {
                if ctx.allows(rules) {
                    out.extend(value.values());
                }
            }
        }
    }
    out
}

impl VersionDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Resolve this document (already merged with its parents, if any).
    pub fn to_profile(&self, ctx: &RuleContext) -> Result<VersionProfile> {
        let main_class = non_empty(&self.main_class)
            .ok_or_else(|| Error::format(format!("version {} has no main class", self.id)))?;

        let jvm_arguments = self
            .arguments
            .as_ref()
            .filter(|a| !a.jvm.is_empty())
            .map(|a| resolve_arguments(&a.jvm, ctx));

        let game_arguments = match (&self.arguments, non_empty(&self.minecraft_arguments)) {
            (Some(a), _) if !a.game.is_empty() => {
                Some(GameArguments::Template(resolve_arguments(&a.game, ctx)))
            }
            (_, Some(legacy)) => Some(GameArguments::Legacy(legacy)),
            _ => None,
        };

        Ok(VersionProfile {
            id: self.id.clone(),
            main_class,
            inherits_from: self.inherits_from.clone(),
            jar: non_empty(&self.jar).unwrap_or_else(|| self.id.clone()),
            libraries: resolve_libraries(&self.libraries, ctx)?,
            jvm_arguments,
            game_arguments,
            asset_index_id: self
                .asset_index
                .as_ref()
                .map(|a| a.id.clone())
                .or_else(|| self.assets.clone()),
            version_type: self.version_type.clone(),
        })
    }

    /// Merge `self` (a child) over `parent`.
    pub fn merged_over(&self, parent: &VersionDocument) -> VersionDocument {
        // Key on group:artifact[:classifier] so the child's version of a library wins
        let key = |lib: &Library| match Coordinate::parse(&lib.name) {
            Ok(c) => format!("{}:{}:{:?}", c.group, c.artifact, c.classifier),
            Err(_) => lib.name.clone(),
        };
        let mut seen = HashSet::new();
        let mut libraries = Vec::new();
        for lib in self.libraries.iter().chain(parent.libraries.iter()) {
            if seen.insert(key(lib)) {
                libraries.push(lib.clone());
            }
        }

        let arguments = match (&parent.arguments, &self.arguments) {
            (None, None) => None,
            (p, c) => {
                let mut merged = p.clone().unwrap_or_default();
                if let Some(c) = c {
                    merged.game.extend(c.game.iter().cloned());
                    merged.jvm.extend(c.jvm.iter().cloned());
                }
                Some(merged)
            }
        };

        let mut extra = parent.extra.clone();
        extra.extend(self.extra.clone());

        VersionDocument {
            id: self.id.clone(),
            main_class: non_empty(&self.main_class).or_else(|| parent.main_class.clone()),
            inherits_from: self.inherits_from.clone(),
            jar: non_empty(&self.jar)
                .or_else(|| non_empty(&parent.jar))
                .or_else(|| Some(parent.id.clone())),
            arguments,
            minecraft_arguments: non_empty(&self.minecraft_arguments)
                .or_else(|| parent.minecraft_arguments.clone()),
            libraries,
            asset_index: self
                .asset_index
                .clone()
                .or_else(|| parent.asset_index.clone()),
            assets: self.assets.clone().or_else(|| parent.assets.clone()),
            version_type: self
                .version_type
                .clone()
                .or_else(|| parent.version_type.clone()),
            extra,
        }
    }
}

/// The `versions/` directory: `versions/<name>/<name>.json` plus the game jar.
#[derive(Debug, Clone)]
pub struct VersionStore {
    root: PathBuf,
}

impl VersionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn json_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(format!("{}.json", name))
    }

    pub fn jar_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(format!("{}.jar", name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.json_path(name).is_file()
    }

    /// Write (or overwrite) the document for `name`.
    pub fn save(&self, name: &str, document: &VersionDocument) -> Result<PathBuf> {
        let path = self.json_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        let json = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, json).at(&path)?;
        log::info!("Saved version profile {} to {:?}", name, path);
        Ok(path)
    }

    pub fn load(&self, name: &str) -> Result<VersionDocument> {
        let path = self.json_path(name);
        let text = std::fs::read_to_string(&path).at(&path)?;
        VersionDocument::from_json(&text)
            .map_err(|e| Error::format(format!("{} ({:?})", e, path)))
    }

    /// Names of every locally installed version, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.root, e)),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|name| self.contains(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Load `name` and every ancestor, merging child over parent.
    pub fn load_merged(&self, name: &str) -> Result<VersionDocument> {
        let mut chain = vec![self.load(name)?];
        let mut seen: HashSet<String> = HashSet::from([name.to_string()]);

        while let Some(parent) = chain.last().and_then(|d| non_empty(&d.inherits_from)) {
            if !seen.insert(parent.clone()) {
                return Err(Error::format(format!(
                    "version inheritance cycle through {}",
                    parent
                )));
            }
            log::debug!("Version {} inherits from {}", name, parent);
            chain.push(self.load(&parent)?);
        }

        let mut merged = chain.pop().ok_or_else(|| Error::format("empty version chain"))?;
        while let Some(child) = chain.pop() {
            merged = child.merged_over(&merged);
        }
        Ok(merged)
    }

    /// Load, merge and resolve `name` into a launchable profile.
    pub fn resolve(&self, name: &str, ctx: &RuleContext) -> Result<VersionProfile> {
        self.load_merged(name)?.to_profile(ctx)
    }
}
