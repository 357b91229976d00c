use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use anvil_lib::game::installer::types::{InstallSpec, ProgressReporter};
use anvil_lib::game::installer::ForgeInstaller;
use anvil_lib::game::launcher::{LaunchOptions, LaunchPlanBuilder, Session};

struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn start_step(&self, name: &str, total_steps: Option<u32>) {
        println!("[STEP START] {} (total: {:?})", name, total_steps);
    }

    fn set_message(&self, message: &str) {
        println!("[MSG] {}", message);
    }

    fn set_step_count(&self, current: u32, total: Option<u32>) {
        println!("[STEP COUNT] {}/{:?}", current, total);
    }

    fn done(&self, success: bool, message: Option<&str>) {
        println!("[DONE] success={} message={:?}", success, message);
    }
}

/// Usage: install_forge <game-root> <minecraft-version> <forge-version> [installer.jar]
///
/// The base game version must already be installed under the root.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let root = PathBuf::from(args.next().context("missing game root")?);
    let minecraft = args.next().context("missing minecraft version")?;
    let forge = args.next().context("missing forge version")?;

    let mut spec = InstallSpec::new(minecraft, forge, &root);
    spec.installer_path = args.next().map(PathBuf::from);

    let installer = ForgeInstaller::for_spec(&spec)?;
    let outcome = installer
        .install(&spec, Arc::new(ConsoleReporter))
        .await
        .context("forge install failed")?;
    println!(
        "Installed {} ({} processors executed)",
        outcome.version_name,
        outcome.processors.executed()
    );

    let plan = LaunchPlanBuilder::new(LaunchOptions::new(&root, Session::offline("Player")))
        .build_version(&outcome.version_name)
        .await?;
    println!("{}", plan.command_line());
    Ok(())
}
