//! Installer and launcher constants.

/// Mojang library repository, used when a library names no repository
pub const MINECRAFT_LIBRARIES_URL: &str = "https://libraries.minecraft.net/";

/// Forge maven, hosts the installer archives
pub const FORGE_MAVEN_URL: &str = "https://maven.minecraftforge.net/";

/// Network request timeout in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Attempts per download before giving up
pub const DOWNLOAD_RETRIES: u32 = 3;

/// Base delay between download attempts, multiplied by the attempt number
pub const RETRY_DELAY_MS: u64 = 1000;

/// Concurrent library downloads
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Reserved installer archive entries
pub const INSTALL_PROFILE_ENTRY: &str = "install_profile.json";
pub const VERSION_ENTRY: &str = "version.json";

// Launcher defaults

/// G1 tuning flags used when no JVM override is configured
pub const DEFAULT_JVM_ARGS: &[&str] = &[
    "-XX:+UnlockExperimentalVMOptions",
    "-XX:+UseG1GC",
    "-XX:G1NewSizePercent=20",
    "-XX:G1ReservePercent=20",
    "-XX:MaxGCPauseMillis=50",
    "-XX:G1HeapRegionSize=16M",
];

pub const DEFAULT_MAX_MEMORY_MB: i32 = 1024;
pub const DEFAULT_SERVER_PORT: i32 = 25565;
pub const DEFAULT_LAUNCHER_NAME: &str = "minecraft-launcher";
pub const DEFAULT_LAUNCHER_VERSION: &str = "2";

/// Installer archive URL for `<mc>-<forge>`.
pub fn forge_installer_url(minecraft_version: &str, forge_version: &str) -> String {
    let full = format!("{}-{}", minecraft_version, forge_version);
    format!(
        "{}net/minecraftforge/forge/{full}/forge-{full}-installer.jar",
        FORGE_MAVEN_URL
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installer_url() {
        assert_eq!(
            forge_installer_url("1.20.1", "47.2.0"),
            "https://maven.minecraftforge.net/net/minecraftforge/forge/1.20.1-47.2.0/forge-1.20.1-47.2.0-installer.jar"
        );
    }
}
