//! Populates the library store from the staging area and remote repositories.

use super::profile::InstallerMetadata;
use super::traits::LibraryFetcher;
use super::types::ProgressReporter;
use crate::error::{Error, IoResultExt, Result};
use crate::game::maven::{join_relative, Coordinate};
use crate::game::store::LibraryStore;
use crate::game::version::LibraryEntry;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Counts from one materialization run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Files copied from the bundled `maven/` tree
    pub bundled: usize,
    pub universal_copied: bool,
    pub already_present: usize,
    pub downloaded: usize,
    /// Missing entries without a download source
    pub unsourced: usize,
    /// Optional entries that failed to download
    pub optional_failed: usize,
    /// Entries the host's rules exclude, never fetched
    pub disallowed: usize,
}

enum EntryOutcome {
    Disallowed,
    Present,
    Downloaded,
    Unsourced,
    OptionalFailed,
}

pub struct Materializer {
    store: LibraryStore,
    fetcher: Arc<dyn LibraryFetcher>,
    reporter: Arc<dyn ProgressReporter>,
    concurrency: usize,
}

impl Materializer {
    pub fn new(
        store: LibraryStore,
        fetcher: Arc<dyn LibraryFetcher>,
        reporter: Arc<dyn ProgressReporter>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            fetcher,
            reporter,
            concurrency: concurrency.max(1),
        }
    }

    /// Run the bulk copy, the legacy universal copy and the explicit entries in that order.
    pub async fn materialize(
        &self,
        staging: &Path,
        metadata: &InstallerMetadata,
        entries: Vec<LibraryEntry>,
    ) -> Result<MaterializeReport> {
        let mut report = MaterializeReport {
            bundled: self.copy_bundled_maven(staging).await?,
            universal_copied: self.copy_legacy_universal(staging, metadata).await?,
            ..Default::default()
        };
        self.fetch_entries(entries, &mut report).await?;

        log::info!(
            "Libraries ready: {} bundled, {} present, {} downloaded, {} unsourced, {} optional failures, {} disallowed",
            report.bundled,
            report.already_present,
            report.downloaded,
            report.unsourced,
            report.optional_failed,
            report.disallowed
        );
        Ok(report)
    }

    /// Copy staging `maven/` into the store verbatim, overwriting.
    pub async fn copy_bundled_maven(&self, staging: &Path) -> Result<usize> {
        let source = staging.join("maven");
        if !source.is_dir() {
            return Ok(0);
        }

        let dest = self.store.root().to_path_buf();
        let copied = tokio::task::spawn_blocking(move || copy_dir_recursive(&source, &dest))
            .await
            .map_err(|e| Error::io(staging, std::io::Error::other(e)))??;
        log::info!("Copied {} bundled libraries into {:?}", copied, self.store.root());
        Ok(copied)
    }

    /// Copy the legacy universal jar to its destination coordinate. No-op
    /// unless both ends are declared and the source exists.
    pub async fn copy_legacy_universal(
        &self,
        staging: &Path,
        metadata: &InstallerMetadata,
    ) -> Result<bool> {
        let (Some(file_path), Some(destination)) = (
            metadata.legacy_universal_path.as_deref(),
            metadata.legacy_destination.as_deref(),
        ) else {
            return Ok(false);
        };

        let source = join_relative(staging, file_path);
        if !source.is_file() {
            log::debug!("Legacy universal jar {:?} not in staging, skipping", source);
            return Ok(false);
        }

        let dest = self.store.path_of(&Coordinate::parse(destination)?);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.at(parent)?;
        }
        tokio::fs::copy(&source, &dest).await.at(&dest)?;
        log::info!("Extracted universal jar {} to {:?}", file_path, dest);
        Ok(true)
    }

    /// Download every missing or mismatched entry on a bounded pool.
    pub async fn fetch_entries(
        &self,
        entries: Vec<LibraryEntry>,
        report: &mut MaterializeReport,
    ) -> Result<()> {
        // Deduplicate by store path to avoid concurrent writes to the same file
        let mut seen = HashSet::new();
        let unique: Vec<LibraryEntry> = entries
            .into_iter()
            .filter(|e| seen.insert(e.path.clone()))
            .collect();

        let total = unique.len() as u32;
        if total == 0 {
            return Ok(());
        }
        self.reporter.set_step_count(0, Some(total));
        let completed = Arc::new(AtomicU32::new(0));

        let results: Vec<Result<EntryOutcome>> = stream::iter(unique)
            .map(|entry| {
                let completed = Arc::clone(&completed);
                async move {
                    let outcome = self.fetch_one(&entry).await;
                    let count = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    self.reporter.set_step_count(count, Some(total));
                    outcome
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(EntryOutcome::Disallowed) => report.disallowed += 1,
                Ok(EntryOutcome::Present) => report.already_present += 1,
                Ok(EntryOutcome::Downloaded) => report.downloaded += 1,
                Ok(EntryOutcome::Unsourced) => report.unsourced += 1,
                Ok(EntryOutcome::OptionalFailed) => report.optional_failed += 1,
                Err(e) => errors.push(e),
            }
        }

        // Return first error, log others
        let mut errors = errors.into_iter();
        if let Some(first) = errors.next() {
            for (i, e) in errors.enumerate() {
                log::error!("Additional library download error {}: {}", i + 2, e);
            }
            return Err(first);
        }
        Ok(())
    }

    async fn fetch_one(&self, entry: &LibraryEntry) -> Result<EntryOutcome> {
        if !entry.allowed {
            log::debug!("Skipping library {} (disallowed by rules)", entry.coordinate);
            return Ok(EntryOutcome::Disallowed);
        }

        let dest = self.store.join(&entry.path);
        let checksum = entry.checksum.as_deref();

        if LibraryStore::is_satisfied(&dest, checksum) {
            return Ok(EntryOutcome::Present);
        }

        let Some(url) = entry.download_url.as_deref() else {
            log::debug!(
                "Skipping library {} (no download source, expected from installer or processors)",
                entry.coordinate
            );
            return Ok(EntryOutcome::Unsourced);
        };

        match self.fetcher.fetch(url, &dest, checksum).await {
            Ok(()) => Ok(EntryOutcome::Downloaded),
            Err(e) if entry.required => Err(Error::Transfer {
                name: entry.coordinate.to_string(),
                source: e,
            }),
            Err(e) => {
                log::warn!("Optional library {} unavailable: {:#}", entry.coordinate, e);
                Ok(EntryOutcome::OptionalFailed)
            }
        }
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<usize> {
    std::fs::create_dir_all(dest).at(dest)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(src).at(src)? {
        let entry = entry.at(src)?;
        let file_type = entry.file_type().at(entry.path())?;
        let target_path = dest.join(entry.file_name());
        if file_type.is_dir() {
            copied += copy_dir_recursive(&entry.path(), &target_path)?;
        } else {
            std::fs::copy(entry.path(), &target_path).at(&target_path)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::profile::ProfileShape;
    use crate::game::installer::types::{OsType, SilentProgressReporter};
    use crate::game::version::{Library, RuleContext};
    use crate::utils::hash::sha1_bytes;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves bodies from memory and records every requested URL.
    #[derive(Default)]
    struct FakeFetcher {
        bodies: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl LibraryFetcher for FakeFetcher {
        fn fetch<'a>(
            &'a self,
            url: &'a str,
            dest: &'a Path,
            _sha1: Option<&'a str>,
        ) -> BoxFuture<'a, anyhow::Result<()>> {
            Box::pin(async move {
                self.requests.lock().unwrap().push(url.to_string());
                let body = self
                    .bodies
                    .get(url)
                    .ok_or_else(|| anyhow::anyhow!("404 {}", url))?;
                std::fs::create_dir_all(dest.parent().unwrap())?;
                std::fs::write(dest, body)?;
                Ok(())
            })
        }
    }

    fn metadata() -> InstallerMetadata {
        InstallerMetadata {
            shape: ProfileShape::Modern,
            libraries: vec![],
            data: HashMap::new(),
            processors: vec![],
            legacy_universal_path: None,
            legacy_destination: None,
            target: None,
            version: None,
            minecraft: None,
        }
    }

    fn entry(name: &str, url: Option<&str>, required: bool, checksum: Option<&str>) -> LibraryEntry {
        let coordinate = Coordinate::parse(name).unwrap();
        LibraryEntry {
            path: coordinate.relative_path(),
            coordinate,
            allowed: true,
            required,
            is_native: false,
            download_url: url.map(str::to_string),
            checksum: checksum.map(str::to_string),
            extract_exclude: vec![],
        }
    }

    fn materializer(root: &Path, fetcher: Arc<FakeFetcher>) -> Materializer {
        Materializer::new(
            LibraryStore::new(root),
            fetcher,
            Arc::new(SilentProgressReporter),
            4,
        )
    }

    #[tokio::test]
    async fn bulk_and_universal_copies() {
        let staging = tempfile::tempdir().unwrap();
        let libs = tempfile::tempdir().unwrap();
        let bundled = staging.path().join("maven/net/minecraftforge/forge/1.0/forge-1.0.jar");
        std::fs::create_dir_all(bundled.parent().unwrap()).unwrap();
        std::fs::write(&bundled, b"bundled").unwrap();
        std::fs::write(staging.path().join("forge-universal.jar"), b"universal").unwrap();

        let mut meta = metadata();
        meta.legacy_universal_path = Some("forge-universal.jar".into());
        meta.legacy_destination = Some("net.minecraftforge:forge:1.12.2-14.23.5.2854".into());

        let m = materializer(libs.path(), Arc::new(FakeFetcher::default()));
        let report = m.materialize(staging.path(), &meta, vec![]).await.unwrap();

        assert_eq!(report.bundled, 1);
        assert!(report.universal_copied);
        assert!(libs.path().join("net/minecraftforge/forge/1.0/forge-1.0.jar").is_file());
        assert_eq!(
            std::fs::read(libs.path().join(
                "net/minecraftforge/forge/1.12.2-14.23.5.2854/forge-1.12.2-14.23.5.2854.jar"
            ))
            .unwrap(),
            b"universal"
        );
    }

    #[tokio::test]
    async fn universal_copy_is_noop_without_source() {
        let staging = tempfile::tempdir().unwrap();
        let libs = tempfile::tempdir().unwrap();
        let mut meta = metadata();
        meta.legacy_universal_path = Some("missing.jar".into());
        meta.legacy_destination = Some("a:b:1".into());

        let m = materializer(libs.path(), Arc::new(FakeFetcher::default()));
        assert!(!m.copy_legacy_universal(staging.path(), &meta).await.unwrap());
    }

    #[tokio::test]
    async fn explicit_entries_download_only_when_needed() {
        let libs = tempfile::tempdir().unwrap();
        let present = entry("com.example:present:1", Some("https://r/present.jar"), true, Some(&sha1_bytes(b"ok")));
        let present_path = libs.path().join(&present.path);
        std::fs::create_dir_all(present_path.parent().unwrap()).unwrap();
        std::fs::write(&present_path, b"ok").unwrap();

        let stale = entry("com.example:stale:1", Some("https://r/stale.jar"), true, Some(&sha1_bytes(b"fresh")));
        let stale_path = libs.path().join(&stale.path);
        std::fs::create_dir_all(stale_path.parent().unwrap()).unwrap();
        std::fs::write(&stale_path, b"old").unwrap();

        let missing = entry("com.example:missing:1", Some("https://r/missing.jar"), true, None);
        let unsourced = entry("net.minecraftforge:forge:47.2.0:client", None, true, None);

        let mut fetcher = FakeFetcher::default();
        fetcher.bodies.insert("https://r/stale.jar".into(), b"fresh".to_vec());
        fetcher.bodies.insert("https://r/missing.jar".into(), b"new".to_vec());
        let fetcher = Arc::new(fetcher);

        let m = materializer(libs.path(), fetcher.clone());
        let mut report = MaterializeReport::default();
        m.fetch_entries(
            vec![present, stale, missing.clone(), missing, unsourced],
            &mut report,
        )
        .await
        .unwrap();

        assert_eq!(report.already_present, 1);
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.unsourced, 1);
        assert_eq!(std::fs::read(&stale_path).unwrap(), b"fresh");

        let mut requests = fetcher.requests.lock().unwrap().clone();
        requests.sort();
        assert_eq!(requests, vec!["https://r/missing.jar", "https://r/stale.jar"]);
    }

    #[tokio::test]
    async fn required_failure_is_transfer_error() {
        let libs = tempfile::tempdir().unwrap();
        let m = materializer(libs.path(), Arc::new(FakeFetcher::default()));
        let mut report = MaterializeReport::default();

        let err = m
            .fetch_entries(
                vec![entry("com.example:gone:1", Some("https://r/gone.jar"), true, None)],
                &mut report,
            )
            .await
            .unwrap_err();

        match err {
            Error::Transfer { name, .. } => assert_eq!(name, "com.example:gone:1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn optional_failure_is_skipped() {
        let libs = tempfile::tempdir().unwrap();
        let m = materializer(libs.path(), Arc::new(FakeFetcher::default()));
        let mut report = MaterializeReport::default();

        m.fetch_entries(
            vec![entry("com.example:extra:1", Some("https://r/extra.jar"), false, None)],
            &mut report,
        )
        .await
        .unwrap();

        assert_eq!(report.optional_failed, 1);
    }

    #[tokio::test]
    async fn disallowed_entries_are_never_fetched() {
        let libs = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(FakeFetcher::default());
        let m = materializer(libs.path(), fetcher.clone());
        let mut report = MaterializeReport::default();

        let lib: Library = serde_json::from_value(serde_json::json!({
            "name": "ca.weblite:java-objc-bridge:1.1",
            "rules": [{"action": "allow", "os": {"name": "osx"}}]
        }))
        .unwrap();
        let entries = lib.resolve(&RuleContext::for_os(OsType::Linux)).unwrap();

        m.fetch_entries(entries, &mut report).await.unwrap();

        assert_eq!(report.disallowed, 1);
        assert_eq!(report.optional_failed, 0);
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }
}
