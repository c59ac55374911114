//! Imports profiles created by other Lethal Company mod managers.

use crate::{mod_id::is_valid_profile_name, paths::ManagerPaths};
use anyhow::{Context, Result};
use directories::BaseDirs;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Manager name and its profiles directory relative to the roaming app data dir.
pub const KNOWN_MANAGERS: &[(&str, &str)] = &[
    (
        "thunderstore",
        "Thunderstore Mod Manager/DataFolder/LethalCompany/profiles",
    ),
    ("r2modman", "r2modmanPlus-local/LethalCompany/profiles"),
];

pub fn known_profile_roots() -> Result<Vec<(String, PathBuf)>> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(KNOWN_MANAGERS
        .iter()
        .map(|(manager, relative)| (manager.to_string(), base.config_dir().join(relative)))
        .collect())
}

/// Copies every profile under each root to `Profiles/<manager>-<profile>`.
/// Roots that don't exist are skipped. Returns the new profile names.
pub fn clone_profiles(paths: &ManagerPaths, roots: &[(String, PathBuf)]) -> Result<Vec<String>> {
    let mut cloned = Vec::new();
    for (manager, root) in roots {
        if !root.is_dir() {
            debug!(manager, root = %root.display(), "no profiles to clone");
            continue;
        }

        let entries = fs::read_dir(root).with_context(|| format!("read {}", root.display()))?;
        let mut sources: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        sources.sort();

        for source in sources {
            let Some(profile) = source.file_name().map(|name| name.to_string_lossy().to_string())
            else {
                continue;
            };
            let name = format!("{manager}-{profile}");
            if !is_valid_profile_name(&name) {
                continue;
            }
            copy_dir(&source, &paths.profile_dir(&name))?;
            info!(profile = %name, "cloned profile");
            cloned.push(name);
        }
    }
    Ok(cloned)
}

fn copy_dir(source: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).context("create cloned profile dir")?;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(source).context("rel path")?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).context("create dir")?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).context("create file dir")?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}
