use anvil_lib::game::installer::traits::{
    LibraryFetcher, OutputCallback, OutputStream, ProcessInvocation, ProcessRunner,
};
use anvil_lib::game::installer::types::{InstallSpec, SilentProgressReporter};
use anvil_lib::game::installer::ForgeInstaller;
use anvil_lib::game::launcher::{LaunchOptions, LaunchPlanBuilder, Session};
use anvil_lib::game::{VersionDocument, VersionStore};
use futures::future::BoxFuture;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    use zip::write::FileOptions;

    if let Some(p) = path.parent() {
        std::fs::create_dir_all(p).unwrap();
    }
    let f = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(f);
    for (name, bytes) in entries {
        zip.start_file::<&str, ()>(*name, FileOptions::default())
            .unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// Nothing may be downloaded: everything ships inside the installer.
struct OfflineFetcher;

impl LibraryFetcher for OfflineFetcher {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _dest: &'a Path,
        _sha1: Option<&'a str>,
    ) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move { anyhow::bail!("offline: {}", url) })
    }
}

#[derive(Default)]
struct NoopRunner {
    calls: Mutex<usize>,
}

impl ProcessRunner for NoopRunner {
    fn run<'a>(
        &'a self,
        _invocation: &'a ProcessInvocation,
        _output: OutputCallback,
    ) -> BoxFuture<'a, anvil_lib::Result<Option<i32>>> {
        Box::pin(async move {
            *self.calls.lock().unwrap() += 1;
            Ok(Some(0))
        })
    }
}

fn seed_vanilla(root: &Path) {
    let versions = VersionStore::new(root.join("versions"));
    let vanilla = VersionDocument::from_json(
        &json!({
            "id": "1.12.2",
            "type": "release",
            "mainClass": "net.minecraft.client.main.Main",
            "assetIndex": {"id": "1.12"},
            "minecraftArguments": "--username ${auth_player_name} --version ${version_name} --gameDir ${game_directory} --assetIndex ${assets_index_name} --uuid ${auth_uuid} --accessToken ${auth_access_token} --userType ${user_type}",
            "libraries": [
                {"name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.4-nightly-20150209",
                 "natives": {"linux": "natives-linux", "osx": "natives-osx", "windows": "natives-windows"},
                 "extract": {"exclude": ["META-INF/"]}},
                {"name": "com.google.guava:guava:21.0"}
            ]
        })
        .to_string(),
    )
    .unwrap();
    versions.save("1.12.2", &vanilla).unwrap();
    std::fs::write(versions.jar_path("1.12.2"), b"vanilla").unwrap();

    let libraries = root.join("libraries");
    for dir in ["linux", "osx", "windows"] {
        write_zip(
            &libraries.join(format!(
                "org/lwjgl/lwjgl/lwjgl-platform/2.9.4-nightly-20150209/lwjgl-platform-2.9.4-nightly-20150209-natives-{}.jar",
                dir
            )),
            &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"), ("liblwjgl.bin", b"native")],
        );
    }
    write_zip(
        &libraries.join("com/google/guava/guava/21.0/guava-21.0.jar"),
        &[("com/google/common/base/Strings.class", b"\xca\xfe\xba\xbe")],
    );
}

fn legacy_installer(path: &Path) {
    let profile = json!({
        "install": {
            "profileName": "forge",
            "target": "1.12.2-forge1.12.2-14.23.5.2854",
            "path": "net.minecraftforge:forge:1.12.2-14.23.5.2854",
            "filePath": "forge-1.12.2-14.23.5.2854-universal.jar",
            "minecraft": "1.12.2"
        },
        "versionInfo": {
            "id": "1.12.2-forge1.12.2-14.23.5.2854",
            "inheritsFrom": "1.12.2",
            "jar": "1.12.2",
            "mainClass": "net.minecraft.launchwrapper.Launch",
            "minecraftArguments": "--username ${auth_player_name} --version ${version_name} --gameDir ${game_directory} --assetIndex ${assets_index_name} --uuid ${auth_uuid} --accessToken ${auth_access_token} --userType ${user_type} --tweakClass net.minecraftforge.fml.common.launcher.FMLTweaker",
            "libraries": [
                {"name": "net.minecraftforge:forge:1.12.2-14.23.5.2854"},
                {"name": "net.minecraft:launchwrapper:1.12", "clientreq": true}
            ]
        }
    })
    .to_string();

    write_zip(
        path,
        &[
            ("install_profile.json", profile.as_bytes()),
            ("forge-1.12.2-14.23.5.2854-universal.jar", b"universal"),
            (
                "maven/net/minecraft/launchwrapper/1.12/launchwrapper-1.12.jar",
                b"launchwrapper",
            ),
        ],
    );
}

#[tokio::test]
async fn legacy_install_then_launch() {
    init_logger();
    let tmp = TempDir::new().expect("tmpdir");
    let root = tmp.path();
    seed_vanilla(root);

    let installer_path = root.join("forge-1.12.2-installer.jar");
    legacy_installer(&installer_path);

    let mut spec = InstallSpec::new("1.12.2", "14.23.5.2854", root);
    spec.installer_path = Some(installer_path);

    let runner = Arc::new(NoopRunner::default());
    let forge = ForgeInstaller::with_collaborators(
        Arc::new(OfflineFetcher),
        runner.clone(),
        Arc::new(|_: OutputStream, _: &str| {}),
    );
    let outcome = forge
        .install(&spec, Arc::new(SilentProgressReporter))
        .await
        .expect("install failed");
    assert_eq!(outcome.version_name, "1.12.2-forge1.12.2-14.23.5.2854");
    assert_eq!(*runner.calls.lock().unwrap(), 0);

    let mut options = LaunchOptions::new(root, Session::offline("Steve"));
    options.java_path = Some("/usr/bin/java".into());
    options.max_memory_mb = 2048;
    let plan = LaunchPlanBuilder::new(options)
        .build_version(&outcome.version_name)
        .await
        .expect("launch plan failed");

    let args = &plan.process_arguments;
    let main = args
        .iter()
        .position(|a| a == "net.minecraft.launchwrapper.Launch")
        .expect("main class present");
    assert!(args.contains(&"-Xmx2048m".to_string()));

    let cp_index = args.iter().position(|a| a == "-cp").unwrap();
    assert!(cp_index < main);
    let classpath = &args[cp_index + 1];
    assert!(classpath.contains("forge-1.12.2-14.23.5.2854.jar"));
    assert!(classpath.contains("launchwrapper-1.12.jar"));
    assert!(classpath.contains("guava-21.0.jar"));
    assert!(!classpath.contains("natives"));
    assert!(classpath.ends_with("1.12.2.jar"));

    // The child's legacy string replaces the parent's
    let game = &args[main + 1..];
    assert_eq!(game[0], "--username");
    assert_eq!(game[1], "Steve");
    assert_eq!(game[3], "1.12.2-forge1.12.2-14.23.5.2854");
    assert_eq!(game[7], "1.12");
    assert_eq!(game[9], Session::offline("Steve").uuid);
    assert_eq!(game[13], "legacy");
    assert_eq!(
        game[game.len() - 1],
        "net.minecraftforge.fml.common.launcher.FMLTweaker"
    );

    let natives = root
        .join("natives")
        .join("1.12.2-forge1.12.2-14.23.5.2854");
    assert!(natives.join("liblwjgl.bin").is_file());
    assert!(!natives.join("META-INF").exists());
}

#[test]
fn launch_rejects_missing_session_before_touching_disk() {
    init_logger();
    let tmp = TempDir::new().expect("tmpdir");
    seed_vanilla(tmp.path());

    let mut options = LaunchOptions::new(tmp.path(), Session::offline("Steve"));
    options.session = None;

    let result = tokio_test::block_on(LaunchPlanBuilder::new(options).build_version("1.12.2"));
    assert!(matches!(result, Err(anvil_lib::Error::Validation(_))));
    assert!(!tmp.path().join("natives").exists());
}

#[test]
fn vanilla_launch_with_block_on() {
    init_logger();
    let tmp = TempDir::new().expect("tmpdir");
    seed_vanilla(tmp.path());

    let mut options = LaunchOptions::new(tmp.path(), Session::offline("Alex"));
    options.java_path = Some("java".into());
    let plan = tokio_test::block_on(LaunchPlanBuilder::new(options).build_version("1.12.2"))
        .expect("launch plan failed");

    assert_eq!(plan.working_directory, tmp.path());
    assert!(plan.command_line().starts_with("java -XX:+UnlockExperimentalVMOptions"));
    assert!(plan
        .process_arguments
        .iter()
        .any(|a| a.starts_with("-Djava.library.path=")));
}
