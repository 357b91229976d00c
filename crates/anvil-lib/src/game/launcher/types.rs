use crate::error::{Error, Result};
use crate::game::installer::config::{DEFAULT_MAX_MEMORY_MB, DEFAULT_SERVER_PORT};
use crate::game::placeholders::quote_if_spaced;
use crate::game::version::RuleContext;
use std::path::{Path, PathBuf};

/// Identity handed to the game. Acquiring one is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
}

impl Session {
    /// Deterministic offline identity: UUID v3 of `OfflinePlayer:<name>`.
    pub fn offline(username: &str) -> Self {
        let uuid = uuid::Uuid::new_v3(
            &uuid::Uuid::NAMESPACE_OID,
            format!("OfflinePlayer:{}", username).as_bytes(),
        );
        Self {
            username: username.to_string(),
            uuid: uuid.simple().to_string(),
            access_token: "access_token".to_string(),
            user_type: "legacy".to_string(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.username.trim().is_empty()
            && !self.uuid.trim().is_empty()
            && !self.access_token.trim().is_empty()
    }
}

/// Runtime options for one launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Game root holding `libraries/`, `versions/`, `assets/` and `natives/`
    pub base_path: Option<PathBuf>,
    /// Working directory for the game; defaults to `base_path`
    pub game_directory: Option<PathBuf>,
    pub java_path: Option<PathBuf>,
    pub max_memory_mb: i32,
    /// Emitted as `-Xms` only when positive
    pub min_memory_mb: i32,
    /// Replaces the default G1 tuning flags
    pub jvm_override: Option<Vec<String>>,
    pub session: Option<Session>,
    pub server_ip: Option<String>,
    pub server_port: i32,
    pub screen_width: i32,
    pub screen_height: i32,
    pub fullscreen: bool,
    pub launcher_name: Option<String>,
    pub launcher_version: Option<String>,
    /// Overrides the profile's version type
    pub version_type: Option<String>,
    pub dock_name: Option<String>,
    pub dock_icon: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            base_path: None,
            game_directory: None,
            java_path: None,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            min_memory_mb: 0,
            jvm_override: None,
            session: None,
            server_ip: None,
            server_port: DEFAULT_SERVER_PORT,
            screen_width: 0,
            screen_height: 0,
            fullscreen: false,
            launcher_name: None,
            launcher_version: None,
            version_type: None,
            dock_name: None,
            dock_icon: None,
        }
    }
}

impl LaunchOptions {
    pub fn new(base_path: impl Into<PathBuf>, session: Session) -> Self {
        Self {
            base_path: Some(base_path.into()),
            session: Some(session),
            ..Default::default()
        }
    }

    /// Set the JVM override from one shell-style string.
    pub fn set_jvm_override(&mut self, flags: &str) -> Result<()> {
        let parsed = shlex::split(flags)
            .ok_or_else(|| Error::validation(format!("unbalanced quotes in JVM flags: {}", flags)))?;
        self.jvm_override = Some(parsed);
        Ok(())
    }

    /// Rule context for resolving a profile against these options.
    pub fn rule_context(&self) -> RuleContext {
        RuleContext::host()
            .with_feature("is_demo_user", false)
            .with_feature(
                "has_custom_resolution",
                self.screen_width > 0 && self.screen_height > 0,
            )
    }

    /// Check every precondition in order and report the first violation.
    pub(crate) fn validate(&self, has_profile: bool) -> Result<()> {
        if self.base_path.is_none() {
            return Err(Error::validation("base path is not set"));
        }
        if self.max_memory_mb < 1 {
            return Err(Error::validation(format!(
                "maximum memory must be at least 1 MB (got {})",
                self.max_memory_mb
            )));
        }
        if !has_profile {
            return Err(Error::validation("no version profile to launch"));
        }
        if !self.session.as_ref().is_some_and(Session::is_valid) {
            return Err(Error::validation("session is missing or incomplete"));
        }
        if !(0..=65535).contains(&self.server_port) {
            return Err(Error::validation(format!(
                "server port {} is out of range",
                self.server_port
            )));
        }
        if self.screen_width < 0 || self.screen_height < 0 {
            return Err(Error::validation(format!(
                "screen size {}x{} is negative",
                self.screen_width, self.screen_height
            )));
        }
        Ok(())
    }
}

/// The final process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: PathBuf,
    /// Display form: interpolated values containing spaces are quoted
    pub arguments: Vec<String>,
    /// The same arguments unquoted, as handed to the OS
    pub process_arguments: Vec<String>,
    pub working_directory: PathBuf,
}

impl LaunchPlan {
    /// Single-line rendering for logs and shell scripts.
    pub fn command_line(&self) -> String {
        let program = quote_if_spaced(&self.program.to_string_lossy());
        std::iter::once(program)
            .chain(self.arguments.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// A ready-to-spawn command using the unquoted arguments.
    pub fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.process_arguments)
            .current_dir(&self.working_directory);
        command
    }
}
