use crate::{
    bepinex, clone,
    config::{Config, DEFAULT_PROFILE},
    installer::{InstallReport, Installer, OutdatedMod},
    launcher, profile,
    paths::ManagerPaths,
    registry::{Registry, ThunderstoreClient},
};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

pub struct App<R = ThunderstoreClient> {
    pub paths: ManagerPaths,
    pub config: Config,
    pub installer: Installer<R>,
}

impl App {
    /// Bootstraps the base directory and loads the config.
    pub fn initialize(base: Option<PathBuf>) -> Result<Self> {
        let base = match base {
            Some(base) => base,
            None => ManagerPaths::default_base()?,
        };
        Self::with_registry(ManagerPaths::new(base), ThunderstoreClient::new())
    }
}

impl<R: Registry> App<R> {
    pub fn with_registry(paths: ManagerPaths, registry: R) -> Result<Self> {
        paths.ensure_structure()?;
        let config = Config::load_or_create(&paths)?;
        let installer = Installer::new(registry, paths.clone());
        Ok(Self {
            paths,
            config,
            installer,
        })
    }

    /// `--profile` when given, else the last used profile. Must exist.
    pub fn resolve_profile(&self, override_name: Option<&str>) -> Result<String> {
        let name = override_name.unwrap_or(&self.config.last_used_profile);
        if !profile::exists(&self.paths, name) {
            bail!("Unknown profile: {name} (create it with `lethalkit profiles create {name}`)");
        }
        Ok(name.to_string())
    }

    pub fn use_profile(&mut self, name: &str) -> Result<()> {
        if !profile::exists(&self.paths, name) {
            bail!("Unknown profile: {name}");
        }
        self.config.last_used_profile = name.to_string();
        self.config.save(&self.paths)
    }

    pub fn rename_profile(&mut self, old: &str, new: &str) -> Result<()> {
        profile::rename(&self.paths, old, new)?;
        if self.config.last_used_profile == old {
            self.config.last_used_profile = new.to_string();
            self.config.save(&self.paths)?;
        }
        Ok(())
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        profile::delete(&self.paths, name)?;
        if self.config.last_used_profile == name {
            self.config.last_used_profile = DEFAULT_PROFILE.to_string();
            self.config.save(&self.paths)?;
        }
        Ok(())
    }

    /// Reinstalls every outdated mod at its latest version, removing the old
    /// directory only after the new one is in place.
    pub fn update_all(&self, profile: &str) -> Result<Vec<(OutdatedMod, InstallReport)>> {
        let outdated = self
            .installer
            .outdated(profile)
            .context("check for outdated mods")?;
        let mut updated = Vec::new();
        for entry in outdated {
            let report = self
                .installer
                .install(profile, &entry.installed.id)
                .with_context(|| format!("update {}", entry.installed))?;
            self.installer
                .delete(profile, &entry.installed)
                .with_context(|| format!("remove {}", entry.installed))?;
            info!(
                from = %entry.installed,
                to = %entry.latest_version,
                "updated mod"
            );
            updated.push((entry, report));
        }
        Ok(updated)
    }

    /// Copies profiles from other managers once; later calls are no-ops.
    pub fn clone_other_managers(&mut self, roots: &[(String, PathBuf)]) -> Result<Vec<String>> {
        if self.config.other_profiles_cloned {
            info!("profiles from other managers were already cloned");
            return Ok(Vec::new());
        }
        let cloned = clone::clone_profiles(&self.paths, roots)?;
        self.config.other_profiles_cloned = true;
        self.config.save(&self.paths)?;
        Ok(cloned)
    }

    /// Caches the runtime and creates the default profile when missing.
    pub fn init(&mut self) -> Result<String> {
        let version = bepinex::ensure_cached(&self.paths, &mut self.config)?;
        if !profile::exists(&self.paths, DEFAULT_PROFILE) {
            profile::create(&self.paths, DEFAULT_PROFILE)?;
        }
        Ok(version)
    }

    pub fn launch(&self, profile: &str) -> Result<()> {
        if !bepinex::is_cached(&self.paths) {
            warn!("BepInEx is not cached; the profile may be missing its loader");
        }
        launcher::launch(&self.paths, &self.config, profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mod_id::ModIdentity, test_support::FakeRegistry};
    use std::fs;

    fn app(registry: FakeRegistry) -> (tempfile::TempDir, App<FakeRegistry>) {
        let temp = tempfile::tempdir().unwrap();
        let app = App::with_registry(ManagerPaths::new(temp.path()), registry).unwrap();
        fs::create_dir_all(app.paths.plugins_dir(DEFAULT_PROFILE)).unwrap();
        (temp, app)
    }

    #[test]
    fn resolves_active_profile() {
        let (_temp, mut app) = app(FakeRegistry::new());
        assert_eq!(app.resolve_profile(None).unwrap(), DEFAULT_PROFILE);
        assert!(app.resolve_profile(Some("Missing")).is_err());
        assert!(app.use_profile("Missing").is_err());

        fs::create_dir_all(app.paths.profile_dir("Speedrun")).unwrap();
        app.use_profile("Speedrun").unwrap();
        let reloaded = Config::load_or_create(&app.paths).unwrap();
        assert_eq!(reloaded.last_used_profile, "Speedrun");
    }

    #[test]
    fn renaming_active_profile_follows_it() {
        let (_temp, mut app) = app(FakeRegistry::new());
        app.rename_profile(DEFAULT_PROFILE, "Main").unwrap();
        assert_eq!(app.config.last_used_profile, "Main");

        app.delete_profile("Main").unwrap();
        assert_eq!(app.config.last_used_profile, DEFAULT_PROFILE);
    }

    #[test]
    fn update_replaces_outdated_versions() {
        let mut registry = FakeRegistry::new();
        registry.publish("Foo", "Bar", "1.0.0", &[]);
        let (_temp, mut app) = app(registry);
        let id = ModIdentity::new("Foo", "Bar").unwrap();
        app.installer.install(DEFAULT_PROFILE, &id).unwrap();

        let mut registry = FakeRegistry::new();
        registry.publish("Foo", "Bar", "1.1.0", &[]);
        app.installer = Installer::new(registry, app.paths.clone());

        let updated = app.update_all(DEFAULT_PROFILE).unwrap();
        assert_eq!(updated.len(), 1);
        let plugins = app.paths.plugins_dir(DEFAULT_PROFILE);
        assert!(plugins.join("Foo-Bar-1.1.0").is_dir());
        assert!(!plugins.join("Foo-Bar-1.0.0").exists());
        assert!(app.update_all(DEFAULT_PROFILE).unwrap().is_empty());
    }

    #[test]
    fn clones_only_once() {
        let (temp, mut app) = app(FakeRegistry::new());
        let root = temp.path().join("r2");
        fs::create_dir_all(root.join("Friends")).unwrap();
        let roots = vec![("r2modman".to_string(), root)];

        assert_eq!(app.clone_other_managers(&roots).unwrap(), vec!["r2modman-Friends"]);
        assert!(app.config.other_profiles_cloned);
        assert!(app.clone_other_managers(&roots).unwrap().is_empty());
    }
}
