use crate::{config::Config, paths::ManagerPaths};
use anyhow::{bail, Context, Result};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::info;

pub const STEAM_APP_ID: &str = "1966720";

pub fn default_steam_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files (x86)\Steam\steam.exe")
    } else {
        PathBuf::from("steam")
    }
}

pub fn preloader_path(paths: &ManagerPaths, profile: &str) -> PathBuf {
    paths
        .bepinex_dir(profile)
        .join("core")
        .join("BepInEx.Preloader.dll")
}

pub fn launch_args(preloader: &Path) -> Vec<OsString> {
    vec![
        "-applaunch".into(),
        STEAM_APP_ID.into(),
        "--doorstop-enable".into(),
        "true".into(),
        "--doorstop-target".into(),
        preloader.as_os_str().to_os_string(),
    ]
}

/// Starts the game through Steam with doorstop pointed at the profile's loader.
pub fn launch(paths: &ManagerPaths, config: &Config, profile: &str) -> Result<()> {
    let preloader = preloader_path(paths, profile);
    if !preloader.is_file() {
        bail!(
            "profile {profile} has no BepInEx preloader at {}",
            preloader.display()
        );
    }

    let steam = config.steam_path.clone().unwrap_or_else(default_steam_path);
    Command::new(&steam)
        .args(launch_args(&preloader))
        .spawn()
        .with_context(|| format!("launch game via {}", steam.display()))?;
    info!(profile, "game launched");
    Ok(())
}
