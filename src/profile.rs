use crate::{bepinex, mod_id::is_valid_profile_name, paths::ManagerPaths};
use anyhow::{bail, Context, Result};
use std::fs;
use tracing::info;

const DEFAULT_BEPINEX_CFG: &str = include_str!("../assets/BepInEx.cfg");

pub fn validate_name(name: &str) -> Result<()> {
    if !is_valid_profile_name(name) {
        bail!("invalid profile name: {name:?}");
    }
    Ok(())
}

pub fn exists(paths: &ManagerPaths, name: &str) -> bool {
    validate_name(name).is_ok() && paths.profile_dir(name).is_dir()
}

/// Creates an empty profile holding the cached runtime, the default loader
/// config and an empty plugin directory.
pub fn create(paths: &ManagerPaths, name: &str) -> Result<()> {
    validate_name(name)?;
    let profile_dir = paths.profile_dir(name);
    fs::create_dir_all(paths.profiles_dir()).context("create profiles dir")?;
    match fs::create_dir(&profile_dir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            bail!("profile already exists: {name}")
        }
        Err(err) => return Err(err).context("create profile dir"),
    }

    bepinex::unpack(paths, &profile_dir)?;

    let config_dir = paths.bepinex_dir(name).join("config");
    fs::create_dir_all(&config_dir).context("create BepInEx config dir")?;
    fs::write(config_dir.join("BepInEx.cfg"), DEFAULT_BEPINEX_CFG)
        .context("write default BepInEx.cfg")?;
    fs::create_dir_all(paths.plugins_dir(name)).context("create plugins dir")?;

    info!(profile = name, "created profile");
    Ok(())
}

pub fn delete(paths: &ManagerPaths, name: &str) -> Result<()> {
    validate_name(name)?;
    let profile_dir = paths.profile_dir(name);
    match fs::remove_dir_all(&profile_dir) {
        Ok(()) => {
            info!(profile = name, "deleted profile");
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("delete profile {name}")),
    }
}

pub fn rename(paths: &ManagerPaths, old: &str, new: &str) -> Result<()> {
    validate_name(old)?;
    validate_name(new)?;
    let from = paths.profile_dir(old);
    let to = paths.profile_dir(new);
    if !from.is_dir() {
        bail!("unknown profile: {old}");
    }
    if to.exists() {
        bail!("profile already exists: {new}");
    }
    fs::rename(&from, &to).with_context(|| format!("rename profile {old} to {new}"))?;
    info!(from = old, to = new, "renamed profile");
    Ok(())
}

pub fn list(paths: &ManagerPaths) -> Result<Vec<String>> {
    let dir = paths.profiles_dir();
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).context("read profiles dir"),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.context("read profile entry")?;
        if entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false) {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort_by_key(|name| name.to_lowercase());
    Ok(names)
}
