use crate::error::{ModError, ModResult};
use filetime::{set_file_mtime, FileTime};
use std::{
    fs, io,
    path::{Component, Path, PathBuf},
};
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};
use zip::result::ZipError;

/// Unpacks `archive` into `dest`, refusing entries that resolve outside it.
///
/// Extraction stops at the first failing entry; entries written before it stay
/// on disk.
pub fn extract(archive: &Path, dest: &Path) -> ModResult<()> {
    let failed = |source: io::Error| ModError::ExtractionFailed {
        archive: archive.to_path_buf(),
        source,
    };

    fs::create_dir_all(dest).map_err(failed)?;
    let file = fs::File::open(archive).map_err(failed)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|err| failed(zip_io_error(err)))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|err| failed(zip_io_error(err)))?;
        let name = entry.name().to_string();
        let out_path = resolve_entry_path(dest, &name)
            .ok_or_else(|| ModError::PathTraversal { entry: name.clone() })?;

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(failed)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(failed)?;
            }
            let mut out_file = fs::File::create(&out_path).map_err(failed)?;
            io::copy(&mut entry, &mut out_file).map_err(failed)?;
        }

        apply_mode(&out_path, entry.unix_mode(), entry.is_dir());
        if !entry.is_dir() {
            if let Some(mtime) = entry.last_modified().and_then(zip_time_to_unix) {
                let _ = set_file_mtime(&out_path, FileTime::from_unix_time(mtime, 0));
            }
        }
    }

    Ok(())
}

/// Joins an archive entry name onto `dest` without touching the filesystem.
///
/// Returns `None` for absolute names, names that climb above `dest`, and names
/// that collapse to `dest` itself.
pub fn resolve_entry_path(dest: &Path, entry_name: &str) -> Option<PathBuf> {
    let normalized = entry_name.replace('\\', "/");
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }
    // A leading "C:" survives as a normal component on unix.
    if parts[0].to_string_lossy().ends_with(':') {
        return None;
    }

    let mut out = dest.to_path_buf();
    out.extend(parts);
    Some(out)
}

fn apply_mode(path: &Path, mode: Option<u32>, is_dir: bool) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let Some(mode) = mode else {
            return;
        };
        let mode = if is_dir { (mode & 0o7777) | 0o700 } else { mode & 0o7777 };
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode, is_dir);
    }
}

fn zip_io_error(err: ZipError) -> io::Error {
    match err {
        ZipError::Io(err) => err,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    let datetime = PrimitiveDateTime::new(date, time).assume_utc();
    Some(datetime.unix_timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_zip, ZipItem};

    #[test]
    fn extracts_files_and_directories() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("mod.zip");
        write_zip(
            &archive,
            &[
                ZipItem::Dir("config/"),
                ZipItem::File("manifest.json", b"{}"),
                ZipItem::File("plugins/Deep/Mod.dll", b"dll-bytes"),
            ],
        );

        let dest = temp.path().join("out").join("Foo-Bar-1.0.0");
        extract(&archive, &dest).unwrap();

        assert!(dest.join("config").is_dir());
        assert_eq!(fs::read(dest.join("manifest.json")).unwrap(), b"{}");
        assert_eq!(
            fs::read(dest.join("plugins/Deep/Mod.dll")).unwrap(),
            b"dll-bytes"
        );
    }

    #[test]
    fn overwrites_existing_files() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("mod.zip");
        write_zip(&archive, &[ZipItem::File("readme.txt", b"new")]);

        let dest = temp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("readme.txt"), b"old contents that are longer").unwrap();

        extract(&archive, &dest).unwrap();
        assert_eq!(fs::read(dest.join("readme.txt")).unwrap(), b"new");
    }

    #[test]
    fn rejects_parent_traversal() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(
            &archive,
            &[ZipItem::File("../../escaped.txt", b"gotcha")],
        );

        let dest = temp.path().join("a").join("b");
        let err = extract(&archive, &dest).unwrap_err();

        assert!(matches!(err, ModError::PathTraversal { .. }), "{err:?}");
        assert!(!temp.path().join("escaped.txt").exists());
        assert!(!temp.path().join("a").join("escaped.txt").exists());
    }

    #[test]
    fn traversal_aborts_before_later_entries() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("evil.zip");
        write_zip(
            &archive,
            &[
                ZipItem::File("inner/../../outside.txt", b"x"),
                ZipItem::File("after.txt", b"y"),
            ],
        );

        let dest = temp.path().join("dest");
        assert!(extract(&archive, &dest).is_err());
        assert!(!temp.path().join("outside.txt").exists());
        assert!(!dest.join("after.txt").exists());
    }

    #[test]
    fn unreadable_archive_is_extraction_failure() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let err = extract(&archive, &temp.path().join("dest")).unwrap_err();
        assert!(matches!(err, ModError::ExtractionFailed { .. }), "{err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn applies_unix_modes_and_keeps_directories_writable() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;
        use zip::write::SimpleFileOptions;

        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("modes.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        writer
            .add_directory("ro/", SimpleFileOptions::default().unix_permissions(0o555))
            .unwrap();
        writer
            .start_file(
                "ro/inner.txt",
                SimpleFileOptions::default().unix_permissions(0o640),
            )
            .unwrap();
        writer.write_all(b"inner").unwrap();
        writer
            .start_file("run.sh", SimpleFileOptions::default().unix_permissions(0o755))
            .unwrap();
        writer.write_all(b"#!/bin/sh").unwrap();
        writer.finish().unwrap();

        let dest = temp.path().join("dest");
        extract(&archive, &dest).unwrap();

        let mode = |path: &Path| fs::metadata(path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&dest.join("ro")), 0o755);
        assert_eq!(mode(&dest.join("ro/inner.txt")), 0o640);
        assert_eq!(mode(&dest.join("run.sh")), 0o755);
        assert_eq!(fs::read(dest.join("ro/inner.txt")).unwrap(), b"inner");
    }

    #[test]
    fn restores_entry_modification_time() {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("dated.zip");
        let stamp = zip::DateTime::from_date_and_time(2021, 3, 4, 5, 6, 8).unwrap();
        let mut writer = zip::ZipWriter::new(fs::File::create(&archive).unwrap());
        writer
            .start_file(
                "Mod.dll",
                SimpleFileOptions::default().last_modified_time(stamp),
            )
            .unwrap();
        writer.write_all(b"MZ").unwrap();
        writer.finish().unwrap();

        let dest = temp.path().join("dest");
        extract(&archive, &dest).unwrap();

        let meta = fs::metadata(dest.join("Mod.dll")).unwrap();
        let mtime = FileTime::from_last_modification_time(&meta);
        assert_eq!(mtime.unix_seconds(), 1_614_834_368);
    }

    #[test]
    fn entry_path_resolution() {
        let dest = Path::new("/profiles/p/plugins/A-B-1.0.0");
        assert_eq!(
            resolve_entry_path(dest, "a/./b/../c.txt"),
            Some(dest.join("a").join("c.txt"))
        );
        assert_eq!(
            resolve_entry_path(dest, "dir\\file.dll"),
            Some(dest.join("dir").join("file.dll"))
        );
        assert_eq!(resolve_entry_path(dest, "../x"), None);
        assert_eq!(resolve_entry_path(dest, "/etc/passwd"), None);
        assert_eq!(resolve_entry_path(dest, "a/../.."), None);
        assert_eq!(resolve_entry_path(dest, "a/.."), None);
        assert_eq!(resolve_entry_path(dest, "C:/Windows/x.dll"), None);
    }
}
