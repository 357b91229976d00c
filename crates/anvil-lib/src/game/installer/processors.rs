//! Ordered, idempotent post-install processor steps.

use super::profile::{ProcessorStep, SidedDataEntry};
use super::traits::{OutputCallback, OutputStream, ProcessInvocation, ProcessRunner};
use super::types::{OsType, ProgressReporter};
use crate::error::{Error, IoResultExt, Result};
use crate::game::maven::{join_relative, Coordinate};
use crate::game::placeholders::{interpolate, strip_literal, PlaceholderMap, Syntax};
use crate::game::store::LibraryStore;
use crate::utils::hash::file_matches_sha1;
use crate::utils::process::AnvilCommandExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Result of one processor step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every declared output already exists with the expected checksum
    AlreadySatisfied,
    /// The step jar has no `Main-Class`
    NoEntryPoint,
    Succeeded,
    /// Exited non-zero (`None` when killed by a signal)
    Failed { code: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub jar: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    /// Number of steps that actually spawned a process.
    pub fn executed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Succeeded | StepOutcome::Failed { .. }))
            .count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }
}

/// Inputs for the install-time placeholder map.
pub struct PlaceholderInputs<'a> {
    pub data: &'a HashMap<String, SidedDataEntry>,
    pub store: &'a LibraryStore,
    pub staging: &'a Path,
    pub minecraft_jar: &'a Path,
    pub minecraft_version: &'a str,
    pub root: &'a Path,
    pub installer: &'a Path,
}

/// Build the map shared by every processor step of one install.
///
/// Client data values map as: `[coord]` to a store path, `'literal'` to the
/// bare literal, `/path` to a file inside staging, anything else verbatim.
pub fn install_placeholders(inputs: &PlaceholderInputs<'_>) -> PlaceholderMap {
    let mut map = PlaceholderMap::new();

    for (key, entry) in inputs.data {
        let value = entry.client.as_str();
        let mapped = if Coordinate::is_reference(value) {
            match inputs.store.resolve(value) {
                Ok(path) => path.to_string_lossy().to_string(),
                Err(e) => {
                    log::warn!("Data entry {} has a malformed coordinate: {}", key, e);
                    value.to_string()
                }
            }
        } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
            strip_literal(value).to_string()
        } else if let Some(relative) = value.strip_prefix('/') {
            join_relative(inputs.staging, relative)
                .to_string_lossy()
                .to_string()
        } else {
            value.to_string()
        };
        log::debug!("Processor data {} -> {}", key, mapped);
        map.insert(key.clone(), mapped);
    }

    let path = |p: &Path| p.to_string_lossy().to_string();
    map.insert("SIDE".into(), "client".into());
    map.insert("MINECRAFT_JAR".into(), path(inputs.minecraft_jar));
    map.insert("MINECRAFT_VERSION".into(), inputs.minecraft_version.to_string());
    map.insert("ROOT".into(), path(inputs.root));
    map.insert("LIBRARY_DIR".into(), path(inputs.store.root()));
    map.insert("INSTALLER".into(), path(inputs.installer));
    map
}

/// Read `Main-Class` from a jar's manifest. `Ok(None)` when the manifest or
/// the attribute is absent.
pub fn read_main_class(jar: &Path) -> Result<Option<String>> {
    let file = std::fs::File::open(jar).at(jar)?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut manifest = match archive.by_name("META-INF/MANIFEST.MF") {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut text = String::new();
    manifest.read_to_string(&mut text).at(jar)?;

    Ok(manifest_attribute(&text, "Main-Class"))
}

/// Look up a manifest attribute, joining 72-column continuation lines.
fn manifest_attribute(text: &str, name: &str) -> Option<String> {
    let mut logical: Vec<String> = Vec::new();
    for line in text.lines() {
        match line.strip_prefix(' ') {
            Some(rest) => {
                if let Some(last) = logical.last_mut() {
                    last.push_str(rest);
                }
            }
            None => logical.push(line.to_string()),
        }
    }

    logical.iter().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name)
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Interpolate, then resolve a whole-value `[coord]` against the store.
fn resolve_template(template: &str, map: &PlaceholderMap, store: &LibraryStore) -> String {
    let value = interpolate(template, map, Syntax::Braces);
    if Coordinate::is_reference(&value) {
        if let Ok(path) = store.resolve(&value) {
            return path.to_string_lossy().to_string();
        }
    }
    value
}

/// Runs processor steps one at a time in declared order.
pub struct ProcessorPipeline {
    store: LibraryStore,
    runner: Arc<dyn ProcessRunner>,
    reporter: Arc<dyn ProgressReporter>,
    output: OutputCallback,
    separator: &'static str,
}

impl ProcessorPipeline {
    pub fn new(
        store: LibraryStore,
        runner: Arc<dyn ProcessRunner>,
        reporter: Arc<dyn ProgressReporter>,
        output: OutputCallback,
    ) -> Self {
        Self {
            store,
            runner,
            reporter,
            output,
            separator: OsType::current().classpath_separator(),
        }
    }

    pub fn run<'a>(
        &'a self,
        steps: &'a [ProcessorStep],
        map: &'a PlaceholderMap,
    ) -> BoxFuture<'a, Result<PipelineReport>> {
        Box::pin(async move {
            let client_steps: Vec<&ProcessorStep> =
                steps.iter().filter(|s| s.runs_on_client()).collect();
            let total = client_steps.len() as u32;
            let mut report = PipelineReport::default();

            if client_steps.is_empty() {
                log::info!("No processors to execute");
                return Ok(report);
            }
            log::info!("Executing {} processors...", total);
            self.reporter.start_step("Running processors", Some(total));

            for (index, step) in client_steps.into_iter().enumerate() {
                self.reporter
                    .set_message(&format!("Processor {}/{}: {}", index + 1, total, step.jar));
                let outcome = self.run_step(step, map).await?;
                match &outcome {
                    StepOutcome::AlreadySatisfied => {
                        log::info!("Processor {} outputs already valid, skipping", step.jar)
                    }
                    StepOutcome::NoEntryPoint => {
                        log::warn!("Processor {} has no Main-Class, skipping", step.jar)
                    }
                    StepOutcome::Succeeded => log::debug!("Processor {} finished", step.jar),
                    StepOutcome::Failed { code } => {
                        log::warn!("Processor {} exited with code {:?}", step.jar, code)
                    }
                }
                report.steps.push(StepReport {
                    jar: step.jar.clone(),
                    outcome,
                });
                self.reporter.set_step_count(index as u32 + 1, Some(total));
            }

            Ok(report)
        })
    }

    async fn run_step(&self, step: &ProcessorStep, map: &PlaceholderMap) -> Result<StepOutcome> {
        if self.outputs_satisfied(step, map) {
            return Ok(StepOutcome::AlreadySatisfied);
        }

        let jar_path = self.store.resolve(&step.jar)?;
        let lookup = jar_path.clone();
        let main_class = tokio::task::spawn_blocking(move || read_main_class(&lookup))
            .await
            .map_err(|e| Error::io(&jar_path, std::io::Error::other(e)))??;
        let Some(main_class) = main_class else {
            return Ok(StepOutcome::NoEntryPoint);
        };

        let mut classpath = Vec::with_capacity(step.classpath.len() + 1);
        for coord in &step.classpath {
            classpath.push(self.store.resolve(coord)?.to_string_lossy().to_string());
        }
        classpath.push(jar_path.to_string_lossy().to_string());

        let invocation = ProcessInvocation {
            classpath: classpath.join(self.separator),
            main_class,
            args: step
                .args
                .iter()
                .map(|a| resolve_template(a, map, &self.store))
                .collect(),
        };
        log::debug!("Processor invocation: {:?}", invocation);

        match self.runner.run(&invocation, self.output.clone()).await? {
            Some(0) => Ok(StepOutcome::Succeeded),
            code => Ok(StepOutcome::Failed { code }),
        }
    }

    /// True when the step declares outputs and every one exists with its
    /// expected checksum. An empty declaration is satisfied.
    pub fn outputs_satisfied(&self, step: &ProcessorStep, map: &PlaceholderMap) -> bool {
        let Some(outputs) = &step.outputs else {
            return false;
        };

        outputs.iter().all(|(key, value)| {
            let path = PathBuf::from(resolve_template(key, map, &self.store));
            let expected = interpolate(value, map, Syntax::Braces);
            let expected = strip_literal(&expected);
            let valid = file_matches_sha1(&path, expected);
            if !valid {
                log::debug!("Processor output missing or stale: {} -> {:?}", key, path);
            }
            valid
        })
    }
}

/// Lossy UTF-8 with the line terminator removed.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Runs processors with a local Java executable.
pub struct JavaProcessRunner {
    java: PathBuf,
    working_dir: Option<PathBuf>,
}

impl JavaProcessRunner {
    pub fn new(java: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            working_dir: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl ProcessRunner for JavaProcessRunner {
    fn run<'a>(
        &'a self,
        invocation: &'a ProcessInvocation,
        output: OutputCallback,
    ) -> BoxFuture<'a, Result<Option<i32>>> {
        Box::pin(async move {
            let mut command = Command::new(&self.java);
            command
                .arg("-cp")
                .arg(&invocation.classpath)
                .arg(&invocation.main_class)
                .args(&invocation.args)
                .suppress_console()
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            if let Some(dir) = &self.working_dir {
                command.current_dir(dir);
            }

            let mut child = command.spawn().at(&self.java)?;
            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let pump = |stream: OutputStream, pipe: Option<Box<dyn tokio::io::AsyncRead + Send + Unpin>>| {
                let output = output.clone();
                async move {
                    let Some(pipe) = pipe else { return };
                    let mut reader = BufReader::new(pipe);
                    let mut buf = Vec::new();
                    // Drain until EOF so the child never blocks on a full pipe
                    loop {
                        buf.clear();
                        match reader.read_until(b'\n', &mut buf).await {
                            Ok(0) => break,
                            Ok(_) => output(stream, &decode_line(&buf)),
                            Err(e) => {
                                log::warn!("Failed to read processor {:?}: {}", stream, e);
                                break;
                            }
                        }
                    }
                }
            };

            tokio::join!(
                pump(
                    OutputStream::Stdout,
                    stdout.map(|s| Box::new(s) as Box<dyn tokio::io::AsyncRead + Send + Unpin>)
                ),
                pump(
                    OutputStream::Stderr,
                    stderr.map(|s| Box::new(s) as Box<dyn tokio::io::AsyncRead + Send + Unpin>)
                ),
            );

            let status = child.wait().await.at(&self.java)?;
            Ok(status.code())
        })
    }
}
