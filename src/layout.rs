//! Flattens published package layouts so the payload sits at the mod root.
//!
//! Packages ship their plugin files under `plugins/`, `BepInEx/plugins/`, or
//! directly at the root. After normalization everything from the first two
//! lives at the root as well.

use crate::error::{ModError, ModResult};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::debug;

pub fn normalize_layout(mod_root: &Path) -> ModResult<()> {
    let bepinex_dir = mod_root.join("BepInEx");
    for source in [mod_root.join("plugins"), bepinex_dir.join("plugins")] {
        hoist_children(&source, mod_root)?;
        remove_dir_if_empty(&source)?;
    }
    remove_dir_if_empty(&bepinex_dir)
}

fn hoist_children(source: &Path, mod_root: &Path) -> ModResult<()> {
    let children = match read_children(source) {
        Ok(children) => children,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(ModError::io(source, err)),
    };

    debug!(source = %source.display(), count = children.len(), "hoisting plugin payload");
    for child in children {
        let Some(file_name) = child.file_name() else {
            continue;
        };
        let target = mod_root.join(file_name);
        if target.is_dir() {
            merge_dirs(&child, &target)?;
        } else {
            move_entry(&child, &target)?;
        }
    }
    Ok(())
}

/// Moves everything under `source` into the existing directory `target`,
/// overwriting files, then removes the emptied `source` tree.
fn merge_dirs(source: &Path, target: &Path) -> ModResult<()> {
    if !source.is_dir() {
        return Err(ModError::MergeConflict {
            path: target.to_path_buf(),
        });
    }

    for child in read_children(source).map_err(|err| ModError::io(source, err))? {
        let Some(file_name) = child.file_name() else {
            continue;
        };
        let dest = target.join(file_name);
        if child.is_dir() {
            match fs::symlink_metadata(&dest) {
                Ok(meta) if meta.is_dir() => merge_dirs(&child, &dest)?,
                Ok(_) => return Err(ModError::MergeConflict { path: dest }),
                Err(_) => move_entry(&child, &dest)?,
            }
        } else {
            move_entry(&child, &dest)?;
        }
    }

    fs::remove_dir(source).map_err(|err| ModError::io(source, err))
}

/// Renames `source` onto `dest`. Only a file may replace an existing file;
/// anything landing on a directory, or a directory landing on anything, is a
/// conflict.
fn move_entry(source: &Path, dest: &Path) -> ModResult<()> {
    if let Ok(meta) = fs::symlink_metadata(dest) {
        if meta.is_dir() || source.is_dir() {
            return Err(ModError::MergeConflict {
                path: dest.to_path_buf(),
            });
        }
    }
    fs::rename(source, dest).map_err(|err| ModError::io(source, err))
}

fn read_children(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir)? {
        children.push(entry?.path());
    }
    children.sort();
    Ok(children)
}

/// Removes `dir` only when it has no entries. A missing directory is fine.
pub fn remove_dir_if_empty(dir: &Path) -> ModResult<()> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(ModError::io(dir, err)),
    };
    if entries.next().is_some() {
        return Ok(());
    }
    drop(entries);

    match fs::remove_dir(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed empty directory");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ModError::io(dir, err)),
    }
}
