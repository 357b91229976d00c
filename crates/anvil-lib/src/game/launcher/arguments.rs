//! Launch plan construction: validated options plus a resolved profile in,
//! an ordered argument list out.

use super::classpath::{build_classpath, classpath_entries};
use super::natives::{NativesProvider, ZipNativesProvider};
use super::types::{LaunchOptions, LaunchPlan, Session};
use crate::error::{Error, Result};
use crate::game::installer::config::{
    DEFAULT_JVM_ARGS, DEFAULT_LAUNCHER_NAME, DEFAULT_LAUNCHER_VERSION, DEFAULT_SERVER_PORT,
};
use crate::game::installer::types::{GamePaths, OsType};
use crate::game::placeholders::{interpolate, interpolate_quoted, quote_if_spaced, PlaceholderMap, Syntax};
use crate::game::store::LibraryStore;
use crate::game::version::{GameArguments, VersionProfile, VersionStore};
use dunce::canonicalize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments in display form (quoted) alongside the raw process form.
#[derive(Debug, Default)]
struct ArgumentList {
    display: Vec<String>,
    raw: Vec<String>,
}

impl ArgumentList {
    fn push_literal(&mut self, arg: impl Into<String>) {
        let arg = arg.into();
        self.display.push(arg.clone());
        self.raw.push(arg);
    }

    /// `<prefix><value>`, quoting only the value.
    fn push_value(&mut self, prefix: &str, value: &str) {
        self.display.push(format!("{}{}", prefix, quote_if_spaced(value)));
        self.raw.push(format!("{}{}", prefix, value));
    }

    fn push_template(&mut self, template: &str, vars: &PlaceholderMap) {
        self.display.push(interpolate_quoted(template, vars, Syntax::Dollar));
        self.raw.push(interpolate(template, vars, Syntax::Dollar));
    }
}

/// Builds [`LaunchPlan`]s for one set of options.
pub struct LaunchPlanBuilder {
    options: LaunchOptions,
    natives: Arc<dyn NativesProvider>,
}

impl LaunchPlanBuilder {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            options,
            natives: Arc::new(ZipNativesProvider),
        }
    }

    pub fn with_natives_provider(mut self, natives: Arc<dyn NativesProvider>) -> Self {
        self.natives = natives;
        self
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Resolve `name` from the version store under the base path, then build.
    pub async fn build_version(&self, name: &str) -> Result<LaunchPlan> {
        let base = self
            .options
            .base_path
            .as_ref()
            .ok_or_else(|| Error::validation("base path is not set"))?;
        let versions = VersionStore::new(GamePaths::new(base).versions_dir());
        let profile = versions.resolve(name, &self.options.rule_context())?;
        self.build(Some(&profile)).await
    }

    pub async fn build(&self, profile: Option<&VersionProfile>) -> Result<LaunchPlan> {
        self.options.validate(profile.is_some())?;
        let (Some(profile), Some(base), Some(session)) = (
            profile,
            self.options.base_path.as_ref(),
            self.options.session.as_ref(),
        ) else {
            return Err(Error::validation("launch options are incomplete"));
        };

        let paths = GamePaths::new(base);
        let store = LibraryStore::new(paths.libraries_dir());
        let versions = VersionStore::new(paths.versions_dir());
        let natives_dir = paths.natives_dir(&profile.id);
        let os = OsType::current();

        log::info!("Preparing launch of {}", profile.id);
        self.natives.prepare(profile, &store, &natives_dir).await?;

        let classpath = build_classpath(&classpath_entries(profile, &store, &versions), os);
        let mut args = ArgumentList::default();

        // 1. JVM tuning
        match &self.options.jvm_override {
            Some(flags) => flags.iter().for_each(|f| args.push_literal(f.as_str())),
            None => DEFAULT_JVM_ARGS.iter().for_each(|f| args.push_literal(*f)),
        }

        // 2. Memory and dock
        args.push_literal(format!("-Xmx{}m", self.options.max_memory_mb));
        if self.options.min_memory_mb > 0 {
            args.push_literal(format!("-Xms{}m", self.options.min_memory_mb));
        }
        if let Some(name) = non_empty(&self.options.dock_name) {
            args.push_value("-Xdock:name=", name);
        }
        if let Some(icon) = non_empty(&self.options.dock_icon) {
            args.push_value("-Xdock:icon=", icon);
        }

        // 3. JVM template or fallback
        let jvm_vars = self.jvm_variables(profile, &paths, &natives_dir, &classpath, os);
        match &profile.jvm_arguments {
            Some(template) => template.iter().for_each(|t| args.push_template(t, &jvm_vars)),
            None => {
                args.push_value("-Djava.library.path=", &jvm_vars["natives_directory"]);
                args.push_literal("-cp");
                args.push_value("", &classpath);
            }
        }

        // 4. Main class
        args.push_literal(profile.main_class.as_str());

        // 5. Game arguments
        let game_vars = self.game_variables(profile, &paths, session);
        match &profile.game_arguments {
            Some(GameArguments::Template(template)) => {
                template.iter().for_each(|t| args.push_template(t, &game_vars))
            }
            Some(GameArguments::Legacy(line)) => line
                .split(' ')
                .filter(|s| !s.is_empty())
                .for_each(|t| args.push_template(t, &game_vars)),
            None => {}
        }

        // 6. Trailing options
        if let Some(ip) = non_empty(&self.options.server_ip) {
            args.push_literal("--server");
            args.push_value("", ip);
            if self.options.server_port != DEFAULT_SERVER_PORT {
                args.push_literal("--port");
                args.push_literal(self.options.server_port.to_string());
            }
        }
        if self.options.screen_width > 0 && self.options.screen_height > 0 {
            args.push_literal("--width");
            args.push_literal(self.options.screen_width.to_string());
            args.push_literal("--height");
            args.push_literal(self.options.screen_height.to_string());
        }
        if self.options.fullscreen {
            args.push_literal("--fullscreen");
        }

        let plan = LaunchPlan {
            program: self.java_program(),
            arguments: args.display,
            process_arguments: args.raw,
            working_directory: base.clone(),
        };
        log::debug!("Launch command: {}", plan.command_line());
        Ok(plan)
    }

    fn java_program(&self) -> PathBuf {
        self.options
            .java_path
            .clone()
            .or_else(|| which::which("java").ok())
            .unwrap_or_else(|| PathBuf::from("java"))
    }

    fn jvm_variables(
        &self,
        profile: &VersionProfile,
        paths: &GamePaths,
        natives_dir: &Path,
        classpath: &str,
        os: OsType,
    ) -> PlaceholderMap {
        let mut vars = PlaceholderMap::new();
        vars.insert("natives_directory".to_string(), display_path(natives_dir));
        vars.insert(
            "launcher_name".to_string(),
            non_empty(&self.options.launcher_name)
                .unwrap_or(DEFAULT_LAUNCHER_NAME)
                .to_string(),
        );
        vars.insert(
            "launcher_version".to_string(),
            non_empty(&self.options.launcher_version)
                .unwrap_or(DEFAULT_LAUNCHER_VERSION)
                .to_string(),
        );
        vars.insert("classpath".to_string(), classpath.to_string());
        vars.insert(
            "library_directory".to_string(),
            display_path(&paths.libraries_dir()),
        );
        vars.insert(
            "classpath_separator".to_string(),
            os.classpath_separator().to_string(),
        );
        vars.insert("version_name".to_string(), profile.id.clone());
        vars
    }

    fn game_variables(
        &self,
        profile: &VersionProfile,
        paths: &GamePaths,
        session: &Session,
    ) -> PlaceholderMap {
        let game_dir = self
            .options
            .game_directory
            .clone()
            .unwrap_or_else(|| paths.root().to_path_buf());
        let assets = display_path(&paths.assets_dir());
        let version_type = non_empty(&self.options.version_type)
            .or_else(|| non_empty(&profile.version_type))
            .unwrap_or("release");

        let mut vars = PlaceholderMap::new();
        vars.insert("auth_player_name".to_string(), session.username.clone());
        vars.insert("auth_uuid".to_string(), session.uuid.clone());
        vars.insert("auth_access_token".to_string(), session.access_token.clone());
        vars.insert("auth_session".to_string(), session.access_token.clone());
        vars.insert("user_type".to_string(), session.user_type.clone());
        vars.insert("user_properties".to_string(), "{}".to_string());
        vars.insert("version_name".to_string(), profile.id.clone());
        vars.insert("version_type".to_string(), version_type.to_string());
        vars.insert("game_directory".to_string(), display_path(&game_dir));
        vars.insert("assets_root".to_string(), assets);
        vars.insert(
            "game_assets".to_string(),
            display_path(&paths.legacy_assets_dir()),
        );
        vars.insert(
            "assets_index_name".to_string(),
            profile
                .asset_index_id
                .clone()
                .unwrap_or_else(|| "legacy".to_string()),
        );
        vars
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.trim().is_empty())
}

/// Canonical form when the path exists, as given otherwise.
fn display_path(path: &Path) -> String {
    canonicalize(path)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}
