use crate::{archive, config::Config, paths::ManagerPaths};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

const RELEASES_URL: &str = "https://api.github.com/repos/BepInEx/BepInEx/releases/latest";
const USER_AGENT: &str = concat!("lethalkit/", env!("CARGO_PKG_VERSION"));
pub const CACHE_FILE: &str = "BepInEx.zip";

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Asset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeStatus {
    Missing,
    Stale { cached: String, latest: String },
    Current { version: String },
}

pub fn cached_archive(paths: &ManagerPaths) -> PathBuf {
    paths.cache_dir().join(CACHE_FILE)
}

pub fn is_cached(paths: &ManagerPaths) -> bool {
    cached_archive(paths).is_file()
}

pub fn fetch_latest_release() -> Result<Release> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(10))
        .timeout_write(Duration::from_secs(10))
        .build();
    let response = agent
        .get(RELEASES_URL)
        .set("User-Agent", USER_AGENT)
        .call()
        .context("fetch latest BepInEx release")?;
    let release: Release = response.into_json().context("decode BepInEx release")?;
    Ok(release)
}

pub fn is_up_to_date(config: &Config, release: &Release) -> bool {
    !config.cached_bepinex_version.is_empty() && config.cached_bepinex_version == release.tag_name
}

pub fn status(paths: &ManagerPaths, config: &Config, release: &Release) -> RuntimeStatus {
    if !is_cached(paths) {
        RuntimeStatus::Missing
    } else if is_up_to_date(config, release) {
        RuntimeStatus::Current {
            version: release.tag_name.clone(),
        }
    } else {
        RuntimeStatus::Stale {
            cached: config.cached_bepinex_version.clone(),
            latest: release.tag_name.clone(),
        }
    }
}

/// Picks the Windows x64 build. Older releases name it only by architecture
/// (`BepInEx_x64_*.zip`), so that naming is tried next, then the first zip.
pub fn select_asset(assets: &[Asset]) -> Option<&Asset> {
    let zips = || {
        assets
            .iter()
            .filter(|asset| asset.name.to_lowercase().ends_with(".zip"))
    };
    let has_token = |asset: &Asset, token: &str| {
        asset
            .name
            .to_lowercase()
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .any(|part| part == token)
    };
    zips()
        .find(|asset| has_token(asset, "win") && has_token(asset, "x64"))
        .or_else(|| {
            zips().find(|asset| {
                has_token(asset, "x64")
                    && !["unix", "linux", "macos", "osx"]
                        .iter()
                        .any(|os| has_token(asset, os))
            })
        })
        .or_else(|| zips().next())
}

pub fn download_and_cache(paths: &ManagerPaths, release: &Release) -> Result<PathBuf> {
    let asset = select_asset(&release.assets)
        .with_context(|| format!("no zip asset in BepInEx release {}", release.tag_name))?;
    let cache_dir = paths.cache_dir();
    fs::create_dir_all(&cache_dir).context("create cache dir")?;

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(60))
        .timeout_write(Duration::from_secs(60))
        .build();
    debug!(url = %asset.browser_download_url, "downloading BepInEx");
    let response = agent
        .get(&asset.browser_download_url)
        .set("User-Agent", USER_AGENT)
        .call()
        .context("download BepInEx")?;

    let path = cached_archive(paths);
    let partial = path.with_extension("zip.part");
    let mut reader = response.into_reader();
    let mut file = File::create(&partial).context("create BepInEx cache file")?;
    io::copy(&mut reader, &mut file).context("write BepInEx cache file")?;
    drop(file);
    fs::rename(&partial, &path).context("finalize BepInEx cache file")?;
    Ok(path)
}

/// Downloads the runtime when it is missing or stale and records the cached
/// version. Returns the version now in the cache.
pub fn ensure_cached(paths: &ManagerPaths, config: &mut Config) -> Result<String> {
    let release = fetch_latest_release()?;
    if let RuntimeStatus::Current { version } = status(paths, config, &release) {
        return Ok(version);
    }

    download_and_cache(paths, &release)?;
    config.cached_bepinex_version = release.tag_name.clone();
    config.save(paths)?;
    info!(version = %release.tag_name, "cached BepInEx");
    Ok(release.tag_name)
}

/// Unpacks the cached runtime into `target_dir`.
pub fn unpack(paths: &ManagerPaths, target_dir: &Path) -> Result<()> {
    let archive_path = cached_archive(paths);
    if !archive_path.is_file() {
        anyhow::bail!(
            "BepInEx is not cached yet (expected {}); run `lethalkit runtime update`",
            archive_path.display()
        );
    }
    archive::extract(&archive_path, target_dir)
        .with_context(|| format!("unpack BepInEx into {}", target_dir.display()))?;
    Ok(())
}
