pub mod config;
pub mod downloader;
pub mod extractor;
pub mod materializer;
pub mod processors;
pub mod profile;
pub mod traits;
pub mod types;


use crate::error::{Error, IoResultExt, Result};
use crate::game::store::LibraryStore;
use crate::game::version::{resolve_libraries, RuleContext, VersionStore};
use downloader::HttpFetcher;
use materializer::{MaterializeReport, Materializer};
use processors::{install_placeholders, JavaProcessRunner, PipelineReport, PlaceholderInputs, ProcessorPipeline};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use traits::{LibraryFetcher, OutputCallback, OutputStream, ProcessRunner};
use types::{InstallSpec, ProgressReporter};

/// What a finished install produced.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    /// Name the version profile was saved under
    pub version_name: String,
    pub profile_path: PathBuf,
    pub libraries: MaterializeReport,
    pub processors: PipelineReport,
}

/// Installs a Forge release from its installer archive.
pub struct ForgeInstaller {
    fetcher: Arc<dyn LibraryFetcher>,
    runner: Arc<dyn ProcessRunner>,
    output: OutputCallback,
}

impl ForgeInstaller {
    /// HTTP downloads and the configured Java for processors, processor output
    /// forwarded to the log.
    pub fn for_spec(spec: &InstallSpec) -> Result<Self> {
        let fetcher = HttpFetcher::new().map_err(|e| Error::Transfer {
            name: "http client".to_string(),
            source: e,
        })?;
        let runner = JavaProcessRunner::new(spec.java_program()).working_dir(spec.paths.root());
        Ok(Self::with_collaborators(
            Arc::new(fetcher),
            Arc::new(runner),
            Arc::new(|stream: OutputStream, line: &str| match stream {
                OutputStream::Stdout => log::debug!("[processor] {}", line),
                OutputStream::Stderr => log::warn!("[processor] {}", line),
            }),
        ))
    }

    pub fn with_collaborators(
        fetcher: Arc<dyn LibraryFetcher>,
        runner: Arc<dyn ProcessRunner>,
        output: OutputCallback,
    ) -> Self {
        Self {
            fetcher,
            runner,
            output,
        }
    }

    /// Install using `spec.installer_path`, downloading the installer into
    /// the cache when none is given.
    pub async fn install(
        &self,
        spec: &InstallSpec,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<InstallOutcome> {
        let result = self.install_inner(spec, reporter.clone()).await;
        match &result {
            Ok(outcome) => reporter.done(
                true,
                Some(&format!("Installed {}", outcome.version_name)),
            ),
            Err(e) => reporter.done(false, Some(&e.to_string())),
        }
        result
    }

    async fn install_inner(
        &self,
        spec: &InstallSpec,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Result<InstallOutcome> {
        log::info!(
            "Starting Forge installation: minecraft={}, forge={}",
            spec.minecraft_version,
            spec.forge_version
        );

        let minecraft_jar = spec.minecraft_jar();
        if !minecraft_jar.is_file() {
            return Err(Error::io(
                &minecraft_jar,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("install {} first", spec.minecraft_version),
                ),
            ));
        }

        let installer = match &spec.installer_path {
            Some(path) => path.clone(),
            None => self.fetch_installer(spec, reporter.as_ref()).await?,
        };

        // 1. Extract
        reporter.start_step("Extracting installer", None);
        let staging = tempfile::Builder::new()
            .prefix("forge-installer-")
            .tempdir()
            .at(std::env::temp_dir())?;
        let docs = extract_archive(&installer, staging.path()).await?;
        let (version, metadata) = profile::normalize(&docs)?;
        let version_name = metadata.version_name(|| spec.default_version_name());
        log::info!("Forge version name: {}", version_name);

        // 2. Libraries
        reporter.start_step("Downloading libraries", None);
        let store = LibraryStore::new(spec.paths.libraries_dir());
        let ctx = RuleContext::host();
        let mut entries = metadata.library_entries(&ctx)?;
        entries.extend(resolve_libraries(&version.libraries, &ctx)?);
        let materializer = Materializer::new(
            store.clone(),
            self.fetcher.clone(),
            reporter.clone(),
            spec.concurrency,
        );
        let libraries = materializer
            .materialize(staging.path(), &metadata, entries)
            .await?;

        // 3. Processors
        let map = install_placeholders(&PlaceholderInputs {
            data: &metadata.data,
            store: &store,
            staging: staging.path(),
            minecraft_jar: &minecraft_jar,
            minecraft_version: &spec.minecraft_version,
            root: spec.paths.root(),
            installer: &installer,
        });
        let pipeline = ProcessorPipeline::new(
            store,
            self.runner.clone(),
            reporter.clone(),
            self.output.clone(),
        );
        let processors = pipeline.run(&metadata.processors, &map).await?;
        for failed in processors.failed() {
            log::warn!("Processor {} did not exit cleanly: {:?}", failed.jar, failed.outcome);
        }

        // 4. Version profile
        reporter.start_step("Writing version profile", None);
        let versions = VersionStore::new(spec.paths.versions_dir());
        let profile_path = versions.save(&version_name, &version)?;

        log::info!("Forge installation completed successfully");
        Ok(InstallOutcome {
            version_name,
            profile_path,
            libraries,
            processors,
        })
    }

    async fn fetch_installer(
        &self,
        spec: &InstallSpec,
        reporter: &dyn ProgressReporter,
    ) -> Result<PathBuf> {
        let url = config::forge_installer_url(&spec.minecraft_version, &spec.forge_version);
        let dest = spec.paths.installers_dir().join(format!(
            "forge-{}-{}-installer.jar",
            spec.minecraft_version, spec.forge_version
        ));
        if dest.is_file() {
            return Ok(dest);
        }

        reporter.start_step("Downloading installer", None);
        reporter.set_message(&url);
        self.fetcher
            .fetch(&url, &dest, None)
            .await
            .map_err(|e| Error::Transfer {
                name: format!("forge installer {}-{}", spec.minecraft_version, spec.forge_version),
                source: e,
            })?;
        Ok(dest)
    }
}

async fn extract_archive(installer: &Path, staging: &Path) -> Result<extractor::ExtractedDocuments> {
    let installer = installer.to_path_buf();
    let staging = staging.to_path_buf();
    let at = installer.clone();
    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&installer).at(&installer)?;
        extractor::extract_installer(std::io::BufReader::new(file), &staging)
    })
    .await
    .map_err(|e| Error::io(&at, std::io::Error::other(e)))?
}
