use std::path::{Path, PathBuf};

/// Progress reporter trait for installer operations
/// Implementations forward updates to whatever UI drives the install
pub trait ProgressReporter: Send + Sync {
    /// Start a new step with optional total steps
    fn start_step(&self, name: &str, total_steps: Option<u32>);

    /// Set a short status message
    fn set_message(&self, message: &str);

    /// Set a numeric step count for the current step (e.g. "3/12").
    /// `total` may be None when unknown.
    fn set_step_count(&self, current: u32, total: Option<u32>);

    /// Mark operation as complete
    fn done(&self, success: bool, message: Option<&str>);
}

/// A progress reporter that does nothing (silent).
/// Useful for background verification or tests.
pub struct SilentProgressReporter;

impl ProgressReporter for SilentProgressReporter {
    fn start_step(&self, _name: &str, _total_steps: Option<u32>) {}
    fn set_message(&self, _message: &str) {}
    fn set_step_count(&self, _current: u32, _total: Option<u32>) {}
    fn done(&self, _success: bool, _message: Option<&str>) {}
}

/// Directory layout under a game root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePaths {
    root: PathBuf,
}

impl GamePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path to the libraries directory
    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    /// Get the path to the versions directory
    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    /// Virtual asset tree read by pre-1.6 clients
    pub fn legacy_assets_dir(&self) -> PathBuf {
        self.assets_dir().join("virtual").join("legacy")
    }

    /// Get the path to the natives directory for a version
    pub fn natives_dir(&self, version: &str) -> PathBuf {
        self.root.join("natives").join(version)
    }

    /// Downloaded installer archives
    pub fn installers_dir(&self) -> PathBuf {
        self.root.join("cache").join("installers")
    }
}

/// Installation specification for a Forge install
#[derive(Debug, Clone)]
pub struct InstallSpec {
    /// Base game version the loader targets (e.g., "1.20.1")
    pub minecraft_version: String,

    /// Loader version (e.g., "47.2.0")
    pub forge_version: String,

    /// Game root directory
    pub paths: GamePaths,

    /// Local installer archive. Downloaded into the cache when absent.
    pub installer_path: Option<PathBuf>,

    /// Java executable used for processors (if already known)
    pub java_path: Option<PathBuf>,

    /// Number of concurrent downloads
    pub concurrency: usize,
}

impl InstallSpec {
    pub fn new(
        minecraft_version: impl Into<String>,
        forge_version: impl Into<String>,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            minecraft_version: minecraft_version.into(),
            forge_version: forge_version.into(),
            paths: GamePaths::new(root),
            installer_path: None,
            java_path: None,
            concurrency: super::config::DEFAULT_CONCURRENCY,
        }
    }

    /// `<mc>-forge-<forge>`, the name used when the installer names none.
    pub fn default_version_name(&self) -> String {
        format!("{}-forge-{}", self.minecraft_version, self.forge_version)
    }

    /// The base game jar processors read from: `versions/<mc>/<mc>.jar`.
    pub fn minecraft_jar(&self) -> PathBuf {
        self.paths
            .versions_dir()
            .join(&self.minecraft_version)
            .join(format!("{}.jar", self.minecraft_version))
    }

    /// Java program for processors: explicit path, `java` on PATH, or bare `java`.
    pub fn java_program(&self) -> PathBuf {
        self.java_path
            .clone()
            .or_else(|| which::which("java").ok())
            .unwrap_or_else(|| PathBuf::from("java"))
    }
}

/// Operating system types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsType {
    Windows,
    MacOS,
    Linux,
}

impl OsType {
    /// Detect the current OS
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            OsType::Windows
        } else if cfg!(target_os = "macos") {
            OsType::MacOS
        } else {
            OsType::Linux
        }
    }

    /// Get the OS name as a string (for rule matching)
    pub fn as_str(&self) -> &'static str {
        match self {
            OsType::Windows => "windows",
            OsType::Linux => "linux",
            OsType::MacOS => "osx",
        }
    }

    /// Get the classpath separator for this OS
    pub fn classpath_separator(&self) -> &'static str {
        match self {
            OsType::Windows => ";",
            _ => ":",
        }
    }
}
