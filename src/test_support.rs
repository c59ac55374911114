use crate::{
    error::{ModError, ModResult},
    mod_id::ModIdentity,
    registry::{ModMetadata, Registry},
};
use std::{
    cell::RefCell,
    collections::HashMap,
    fs,
    io::{Cursor, Write},
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub enum ZipItem<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
}

pub fn zip_bytes(items: &[ZipItem<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for item in items {
        match item {
            ZipItem::File(name, bytes) => {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(bytes).unwrap();
            }
            ZipItem::Dir(name) => {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            }
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn write_zip(path: &Path, items: &[ZipItem<'_>]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, zip_bytes(items)).unwrap();
}

pub fn manifest_json(name: &str, version: &str, dependencies: &[&str]) -> String {
    serde_json::json!({
        "name": name,
        "version_number": version,
        "description": format!("{name} test package"),
        "dependencies": dependencies,
    })
    .to_string()
}

struct Package {
    version: String,
    archive: Vec<u8>,
}

/// In-memory registry that records every download.
pub struct FakeRegistry {
    packages: HashMap<(String, String), Package>,
    scratch: TempDir,
    downloads: RefCell<Vec<String>>,
    archives: RefCell<Vec<PathBuf>>,
    lookups: RefCell<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            packages: HashMap::new(),
            scratch: tempfile::tempdir().unwrap(),
            downloads: RefCell::new(Vec::new()),
            archives: RefCell::new(Vec::new()),
            lookups: RefCell::new(Vec::new()),
        }
    }

    /// Publishes a package whose payload sits under `BepInEx/plugins`.
    pub fn publish(&mut self, author: &str, name: &str, version: &str, dependencies: &[&str]) {
        let manifest = manifest_json(name, version, dependencies);
        let dll = format!("BepInEx/plugins/{name}/{name}.dll");
        let archive = zip_bytes(&[
            ZipItem::File("manifest.json", manifest.as_bytes()),
            ZipItem::File("README.md", b"# readme"),
            ZipItem::File(&dll, b"MZ"),
        ]);
        self.publish_archive(author, name, version, archive);
    }

    pub fn publish_archive(&mut self, author: &str, name: &str, version: &str, archive: Vec<u8>) {
        self.packages.insert(
            (author.to_string(), name.to_string()),
            Package {
                version: version.to_string(),
                archive,
            },
        );
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }

    /// Paths handed out by `download_package`, in order.
    pub fn archives(&self) -> Vec<PathBuf> {
        self.archives.borrow().clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.borrow().clone()
    }

    fn package(&self, id: &ModIdentity) -> ModResult<&Package> {
        self.packages
            .get(&(id.author().to_string(), id.name().to_string()))
            .ok_or_else(|| ModError::RegistryBadStatus {
                url: format!("fake://{id}"),
                status: 404,
            })
    }
}

impl Registry for FakeRegistry {
    fn fetch_metadata(&self, id: &ModIdentity) -> ModResult<ModMetadata> {
        self.lookups.borrow_mut().push(id.to_string());
        let package = self.package(id)?;
        Ok(ModMetadata {
            downloads: 10,
            rating: 1,
            latest_version: package.version.clone(),
        })
    }

    fn download_package(&self, id: &ModIdentity, version: &str) -> ModResult<PathBuf> {
        let package = self.package(id)?;
        let mut downloads = self.downloads.borrow_mut();
        downloads.push(id.dir_name(version));
        let path = self
            .scratch
            .path()
            .join(format!("{}-{}", downloads.len(), id.package_file_name(version)));
        fs::write(&path, &package.archive).unwrap();
        self.archives.borrow_mut().push(path.clone());
        Ok(path)
    }
}
