use crate::{config::Config, mod_id::ModIdentity};
use anyhow::{Context, Result};
use directories::BaseDirs;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

pub const PROFILES_DIR: &str = "Profiles";
pub const CACHES_DIR: &str = "Caches";
pub const CONFIG_FILE: &str = "config.json";
pub const HOME_ENV: &str = "LETHALKIT_HOME";

const VENDOR_DIR: &str = "Lethal Foundation";
const APP_DIR: &str = "Lethal Mod Manager";

/// Every on-disk location, derived from one base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerPaths {
    base: PathBuf,
}

impl ManagerPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// `$LETHALKIT_HOME`, falling back to the platform data directory.
    pub fn default_base() -> Result<PathBuf> {
        if let Some(home) = env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        let base = BaseDirs::new().context("resolve home dir")?;
        Ok(base.data_dir().join(VENDOR_DIR).join(APP_DIR))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.base.join(PROFILES_DIR)
    }

    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.profiles_dir().join(profile)
    }

    pub fn bepinex_dir(&self, profile: &str) -> PathBuf {
        self.profile_dir(profile).join("BepInEx")
    }

    pub fn plugins_dir(&self, profile: &str) -> PathBuf {
        self.bepinex_dir(profile).join("plugins")
    }

    pub fn mod_dir(&self, profile: &str, id: &ModIdentity, version: &str) -> PathBuf {
        self.plugins_dir(profile).join(id.dir_name(version))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.base.join(CACHES_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.base.join(CONFIG_FILE)
    }

    /// Creates `Profiles/`, `Caches/` and a default config when missing.
    pub fn ensure_structure(&self) -> Result<()> {
        for dir in [self.profiles_dir(), self.cache_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("create {}", dir.display()))?;
        }
        if !self.config_path().exists() {
            Config::default().save(self)?;
        }
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        self.profiles_dir().is_dir() && self.cache_dir().is_dir() && self.config_path().is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_profile_layout() {
        let paths = ManagerPaths::new("/data/lmm");
        let id = ModIdentity::new("Foo", "Bar").unwrap();
        assert_eq!(
            paths.mod_dir("Default", &id, "1.2.0"),
            PathBuf::from("/data/lmm/Profiles/Default/BepInEx/plugins/Foo-Bar-1.2.0")
        );
        assert_eq!(paths.cache_dir(), PathBuf::from("/data/lmm/Caches"));
        assert_eq!(paths.config_path(), PathBuf::from("/data/lmm/config.json"));
    }

    #[test]
    fn bootstraps_directory_structure() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ManagerPaths::new(temp.path().join("base"));
        assert!(!paths.is_set_up());

        paths.ensure_structure().unwrap();

        assert!(paths.profiles_dir().is_dir());
        assert!(paths.cache_dir().is_dir());
        assert!(paths.config_path().is_file());
        assert!(paths.is_set_up());
    }

    #[test]
    fn bootstrap_keeps_existing_config() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ManagerPaths::new(temp.path());
        paths.ensure_structure().unwrap();

        let mut config = Config::load_or_create(&paths).unwrap();
        config.last_used_profile = "Speedrun".to_string();
        config.save(&paths).unwrap();

        paths.ensure_structure().unwrap();
        let reloaded = Config::load_or_create(&paths).unwrap();
        assert_eq!(reloaded.last_used_profile, "Speedrun");
    }
}
