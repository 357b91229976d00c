//! Native library extraction before launch

use crate::error::{Error, IoResultExt, Result};
use crate::game::store::LibraryStore;
use crate::game::version::{LibraryEntry, VersionProfile};
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

/// Resets and repopulates the per-version natives directory.
pub trait NativesProvider: Send + Sync {
    fn prepare<'a>(
        &'a self,
        profile: &'a VersionProfile,
        store: &'a LibraryStore,
        natives_dir: &'a Path,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Unpacks native jars from the library store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipNativesProvider;

impl NativesProvider for ZipNativesProvider {
    fn prepare<'a>(
        &'a self,
        profile: &'a VersionProfile,
        store: &'a LibraryStore,
        natives_dir: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        let jobs: Vec<(PathBuf, Vec<String>)> = profile
            .libraries
            .iter()
            .filter(|l| l.is_native && l.required)
            .map(|l: &LibraryEntry| (store.join(&l.path), l.extract_exclude.clone()))
            .collect();
        let natives_dir = natives_dir.to_path_buf();

        Box::pin(async move {
            let at = natives_dir.clone();
            tokio::task::spawn_blocking(move || extract_natives(&jobs, &natives_dir))
                .await
                .map_err(|e| Error::io(&at, std::io::Error::other(e)))?
        })
    }
}

fn extract_natives(jobs: &[(PathBuf, Vec<String>)], natives_dir: &Path) -> Result<()> {
    if natives_dir.exists() {
        std::fs::remove_dir_all(natives_dir).at(natives_dir)?;
    }
    std::fs::create_dir_all(natives_dir).at(natives_dir)?;

    for (jar, exclude) in jobs {
        if !jar.is_file() {
            log::warn!("Native library not found: {:?}", jar);
            continue;
        }
        let written = extract_jar(jar, natives_dir, exclude)?;
        log::debug!("Extracted {} native files from {:?}", written, jar);
    }
    Ok(())
}

fn extract_jar(jar: &Path, output_dir: &Path, exclusions: &[String]) -> Result<usize> {
    let file = std::fs::File::open(jar).at(jar)?;
    let mut archive = zip::ZipArchive::new(std::io::BufReader::new(file))?;
    let mut written = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || should_exclude(entry.name(), exclusions) {
            continue;
        }
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("Skipping native entry outside target: {}", entry.name());
            continue;
        };

        let output_path = output_dir.join(relative);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        let mut out = std::fs::File::create(&output_path).at(&output_path)?;
        std::io::copy(&mut entry, &mut out).at(&output_path)?;
        written += 1;
    }
    Ok(written)
}

fn should_exclude(file_path: &str, exclusions: &[String]) -> bool {
    exclusions.iter().any(|e| file_path.starts_with(e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::installer::extractor::tests::build_zip;
    use crate::game::maven::Coordinate;

    #[test]
    fn test_should_exclude() {
        let exclusions = vec!["META-INF/".to_string(), "module-info.class".to_string()];

        assert!(should_exclude("META-INF/MANIFEST.MF", &exclusions));
        assert!(should_exclude("module-info.class", &exclusions));
        assert!(!should_exclude("org/lwjgl/Library.class", &exclusions));
    }

    fn native_entry(path: &str, exclude: &[&str]) -> LibraryEntry {
        LibraryEntry {
            coordinate: Coordinate::parse("org.lwjgl.lwjgl:lwjgl-platform:2.9.4").unwrap(),
            path: path.to_string(),
            allowed: true,
            required: true,
            is_native: true,
            download_url: None,
            checksum: None,
            extract_exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn prepare_resets_directory_and_honors_excludes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LibraryStore::new(tmp.path().join("libraries"));
        let natives_dir = tmp.path().join("natives").join("1.12.2");

        let rel = "org/lwjgl/lwjgl/lwjgl-platform/2.9.4/lwjgl-platform-2.9.4-natives-linux.jar";
        let jar = store.join(rel);
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(
            &jar,
            build_zip(&[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
                ("liblwjgl.so", b"elf"),
                ("linux/libopenal.so", b"elf"),
            ]),
        )
        .unwrap();

        std::fs::create_dir_all(&natives_dir).unwrap();
        std::fs::write(natives_dir.join("stale.so"), b"old").unwrap();

        let profile = VersionProfile {
            id: "1.12.2".into(),
            main_class: "net.minecraft.client.main.Main".into(),
            inherits_from: None,
            jar: "1.12.2".into(),
            libraries: vec![
                native_entry(rel, &["META-INF/"]),
                native_entry("missing/native.jar", &[]),
            ],
            jvm_arguments: None,
            game_arguments: None,
            asset_index_id: None,
            version_type: None,
        };

        ZipNativesProvider
            .prepare(&profile, &store, &natives_dir)
            .await
            .unwrap();

        assert!(natives_dir.join("liblwjgl.so").is_file());
        assert!(natives_dir.join("linux/libopenal.so").is_file());
        assert!(!natives_dir.join("META-INF").exists());
        assert!(!natives_dir.join("stale.so").exists());
    }
}
