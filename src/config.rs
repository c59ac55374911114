use crate::paths::ManagerPaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const DEFAULT_PROFILE: &str = "Default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_profile")]
    pub last_used_profile: String,
    #[serde(default)]
    pub cached_bepinex_version: String,
    #[serde(default)]
    pub other_profiles_cloned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steam_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_used_profile: default_profile(),
            cached_bepinex_version: String::new(),
            other_profiles_cloned: false,
            steam_path: None,
        }
    }
}

impl Config {
    pub fn load_or_create(paths: &ManagerPaths) -> Result<Self> {
        let path = paths.config_path();
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read config")?;
            let config: Config = serde_json::from_str(&raw).context("parse config")?;
            return Ok(config);
        }

        let config = Config::default();
        config.save(paths)?;
        Ok(config)
    }

    pub fn save(&self, paths: &ManagerPaths) -> Result<()> {
        fs::create_dir_all(paths.base()).context("create app data dir")?;
        let path = paths.config_path();
        let raw = serde_json::to_string_pretty(self).context("serialize config")?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, raw).context("write config temp")?;
        fs::rename(&temp, &path).context("finalize config")?;
        Ok(())
    }
}

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}
