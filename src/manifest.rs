use crate::error::{ModError, ModResult};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::Path};

/// Fixed location of the manifest inside an extracted mod.
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModManifest {
    pub name: String,
    #[serde(rename = "version_number")]
    pub version: String,
    pub description: String,
    pub dependencies: Vec<String>,
}

pub fn read_manifest(path: &Path) -> ModResult<ModManifest> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(ModError::ManifestNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(err) => return Err(ModError::io(path, err)),
    };

    parse_manifest(&raw).map_err(|source| ModError::ManifestMalformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_manifest(raw: &[u8]) -> Result<ModManifest, serde_json::Error> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
    serde_json::from_slice(raw)
}
