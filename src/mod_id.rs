//! Naming rules for installed mods.
//!
//! An installed mod is recorded only by its directory name,
//! `author-name-version`, so every encode/decode of that pattern lives here.
//! Dependency strings in manifests use the same three-field shape.

use crate::error::{ModError, ModResult};
use std::fmt;

/// Author of the loader runtime. Dependencies on it are never installed as mods.
pub const RUNTIME_AUTHOR: &str = "BepInEx";

const SEPARATOR: char = '-';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModIdentity {
    author: String,
    name: String,
}

impl ModIdentity {
    pub fn new(author: &str, name: &str) -> ModResult<Self> {
        Ok(Self {
            author: checked_segment(author)?,
            name: checked_segment(name)?,
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir_name(&self, version: &str) -> String {
        format!("{}-{}-{}", self.author, self.name, version)
    }

    pub fn package_file_name(&self, version: &str) -> String {
        format!("{}.zip", self.dir_name(version))
    }
}

impl fmt::Display for ModIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.author, self.name)
    }
}

/// A decoded `author-name-version` directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedMod {
    pub id: ModIdentity,
    pub version: String,
}

impl VersionedMod {
    pub fn new(id: ModIdentity, version: &str) -> ModResult<Self> {
        Ok(Self {
            id,
            version: checked_segment(version)?,
        })
    }

    /// Returns `None` unless `raw` has exactly three non-empty, path-safe fields.
    pub fn parse(raw: &str) -> Option<Self> {
        let (author, name, version) = split_three(raw)?;
        let id = ModIdentity::new(author, name).ok()?;
        Self::new(id, version).ok()
    }

    pub fn dir_name(&self) -> String {
        self.id.dir_name(&self.version)
    }
}

impl fmt::Display for VersionedMod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

/// A dependency entry from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    /// The loader runtime, which is managed through the cache instead.
    Runtime,
    /// A mod to install. The pinned version is kept for reporting only.
    Package(VersionedMod),
}

impl Dependency {
    pub fn parse(token: &str) -> ModResult<Self> {
        let invalid = || ModError::InvalidDependencyFormat {
            dependency: token.to_string(),
        };

        if token.split(SEPARATOR).next() == Some(RUNTIME_AUTHOR) {
            return Ok(Dependency::Runtime);
        }

        let (author, name, version) = split_three(token).ok_or_else(invalid)?;
        let id = ModIdentity::new(author, name).map_err(|_| invalid())?;
        let pinned = VersionedMod::new(id, version).map_err(|_| invalid())?;
        Ok(Dependency::Package(pinned))
    }
}

fn split_three(raw: &str) -> Option<(&str, &str, &str)> {
    let mut parts = raw.split(SEPARATOR);
    let author = parts.next()?;
    let name = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((author, name, version))
}

/// Accepts a single non-empty path component without the field separator.
fn checked_segment(value: &str) -> ModResult<String> {
    let unsafe_char = |ch: char| ch == SEPARATOR || ch == '/' || ch == '\\' || ch == ':';
    if value.is_empty() || value == "." || value == ".." || value.contains(unsafe_char) {
        return Err(ModError::InvalidModName {
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}

/// Path-safety check shared with profile names.
pub fn is_safe_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(|ch: char| ch == '/' || ch == '\\' || ch == ':' || ch == '\0')
}

/// Profile names are single path segments without surrounding whitespace.
pub fn is_valid_profile_name(value: &str) -> bool {
    is_safe_segment(value) && value.trim() == value
}
