use crate::{
    archive,
    error::{ModError, ModResult},
    layout,
    manifest::{self, ModManifest, MANIFEST_FILE},
    mod_id::{is_valid_profile_name, Dependency, ModIdentity, VersionedMod},
    paths::ManagerPaths,
    registry::Registry,
};
use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// A mod directory found in a profile's plugin directory.
#[derive(Debug, Clone)]
pub struct InstalledMod {
    pub dir_name: String,
    pub author: String,
    pub path: PathBuf,
    pub manifest: ModManifest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutdatedMod {
    pub installed: VersionedMod,
    pub latest_version: String,
}

/// Outcome of one top-level install, dependencies included.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Directories created by this run, in install order.
    pub installed: Vec<VersionedMod>,
    /// Mods whose latest version was already present.
    pub up_to_date: Vec<VersionedMod>,
}

enum Target {
    Requested(ModIdentity),
    Dependency(String),
}

struct Pending {
    target: Target,
    /// Mods between the top-level request and this item, outermost first.
    lineage: Vec<ModIdentity>,
}

pub struct Installer<R> {
    registry: R,
    paths: ManagerPaths,
}

impl<R: Registry> Installer<R> {
    pub fn new(registry: R, paths: ManagerPaths) -> Self {
        Self { registry, paths }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn paths(&self) -> &ManagerPaths {
        &self.paths
    }

    /// Installs the latest version of `id` into `profile`, then its dependencies.
    ///
    /// Dependencies always resolve to the registry's latest version; the
    /// version pinned in the manifest is ignored. Each `(author, name)` is
    /// visited once per call, so shared and cyclic dependencies terminate.
    pub fn install(&self, profile: &str, id: &ModIdentity) -> ModResult<InstallReport> {
        self.plugins_dir(profile)?;
        let mut report = InstallReport::default();
        let mut visited: HashSet<ModIdentity> = HashSet::new();
        let mut stack = vec![Pending {
            target: Target::Requested(id.clone()),
            lineage: Vec::new(),
        }];

        while let Some(Pending { target, lineage }) = stack.pop() {
            let dep_id = match target {
                Target::Requested(id) => id,
                Target::Dependency(token) => match Dependency::parse(&token) {
                    Ok(Dependency::Runtime) => {
                        debug!(%token, "skipping runtime dependency");
                        continue;
                    }
                    Ok(Dependency::Package(pinned)) => pinned.id,
                    Err(err) => return Err(wrap_lineage(err, &lineage)),
                },
            };

            if !visited.insert(dep_id.clone()) {
                debug!(id = %dep_id, "already handled in this install");
                continue;
            }

            let mut lineage = lineage;
            lineage.push(dep_id.clone());
            let dependencies = self
                .install_single(profile, &dep_id, &mut report)
                .map_err(|err| wrap_lineage(err, &lineage))?;

            // Reversed so the stack pops them in manifest order.
            for token in dependencies.into_iter().rev() {
                stack.push(Pending {
                    target: Target::Dependency(token),
                    lineage: lineage.clone(),
                });
            }
        }

        Ok(report)
    }

    /// Returns the dependency tokens of a freshly installed mod, or nothing
    /// when the latest version is already present.
    fn install_single(
        &self,
        profile: &str,
        id: &ModIdentity,
        report: &mut InstallReport,
    ) -> ModResult<Vec<String>> {
        let metadata = self.registry.fetch_metadata(id)?;
        let target = VersionedMod::new(id.clone(), &metadata.latest_version)?;
        let plugins_dir = self.plugins_dir(profile)?;

        if has_entry_named(&plugins_dir, &target.dir_name())? {
            debug!(mod_dir = %target, "already up to date");
            report.up_to_date.push(target);
            return Ok(Vec::new());
        }

        let archive_path = self.registry.download_package(id, &target.version)?;
        let mod_dir = plugins_dir.join(target.dir_name());
        debug!(mod_dir = %mod_dir.display(), "extracting package");
        let extracted = archive::extract(&archive_path, &mod_dir);
        let _ = fs::remove_file(&archive_path);
        extracted?;

        layout::normalize_layout(&mod_dir)?;
        let manifest = manifest::read_manifest(&mod_dir.join(MANIFEST_FILE))?;

        info!(mod_dir = %target, profile, "installed mod");
        report.installed.push(target);
        Ok(manifest.dependencies)
    }

    /// Removes one installed version. Removing an absent mod succeeds.
    pub fn delete(&self, profile: &str, installed: &VersionedMod) -> ModResult<()> {
        let mod_dir = self.plugins_dir(profile)?.join(installed.dir_name());
        match fs::remove_dir_all(&mod_dir) {
            Ok(()) => {
                info!(mod_dir = %installed, profile, "removed mod");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ModError::io(mod_dir, err)),
        }
    }

    /// Lists mod directories that carry a manifest.
    ///
    /// A manifest that exists but cannot be read fails the whole listing.
    pub fn list(&self, profile: &str) -> ModResult<Vec<InstalledMod>> {
        list_installed(&self.plugins_dir(profile)?)
    }

    fn plugins_dir(&self, profile: &str) -> ModResult<PathBuf> {
        if !is_valid_profile_name(profile) {
            return Err(ModError::InvalidProfileName {
                value: profile.to_string(),
            });
        }
        Ok(self.paths.plugins_dir(profile))
    }

    pub fn is_outdated(&self, id: &ModIdentity, version: &str) -> ModResult<bool> {
        let metadata = self.registry.fetch_metadata(id)?;
        Ok(metadata.latest_version != version)
    }

    /// Installed mods with a newer registry version. Directories whose names
    /// don't decode to `author-name-version` are ignored.
    pub fn outdated(&self, profile: &str) -> ModResult<Vec<OutdatedMod>> {
        let mut outdated = Vec::new();
        for installed in self.list(profile)? {
            let Some(parsed) = VersionedMod::parse(&installed.dir_name) else {
                continue;
            };
            let metadata = self.registry.fetch_metadata(&parsed.id)?;
            if metadata.latest_version != parsed.version {
                outdated.push(OutdatedMod {
                    installed: parsed,
                    latest_version: metadata.latest_version,
                });
            }
        }
        Ok(outdated)
    }
}

pub fn list_installed(plugins_dir: &Path) -> ModResult<Vec<InstalledMod>> {
    let entries = match fs::read_dir(plugins_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(ModError::io(plugins_dir, err)),
    };

    let mut mods = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| ModError::io(plugins_dir, err))?;
        let path = entry.path();
        let dir_name = entry.file_name().to_string_lossy().to_string();
        if !path.is_dir() || !dir_name.contains('-') {
            continue;
        }
        let manifest_path = path.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            continue;
        }
        let manifest = manifest::read_manifest(&manifest_path)?;
        let author = dir_name.split('-').next().unwrap_or_default().to_string();
        mods.push(InstalledMod {
            dir_name,
            author,
            path,
            manifest,
        });
    }

    mods.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    Ok(mods)
}

fn has_entry_named(dir: &Path, name: &str) -> ModResult<bool> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(ModError::io(dir, err)),
    };
    for entry in entries {
        let entry = entry.map_err(|err| ModError::io(dir, err))?;
        if entry.file_name() == name && entry.path().is_dir() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Wraps `err` once per parent/child link, so the outermost layer names the
/// top-level mod.
fn wrap_lineage(err: ModError, lineage: &[ModIdentity]) -> ModError {
    lineage.windows(2).rev().fold(err, |source, link| {
        ModError::DependencyInstallFailed {
            parent: link[0].to_string(),
            dependency: link[1].to_string(),
            source: Box::new(source),
        }
    })
}
