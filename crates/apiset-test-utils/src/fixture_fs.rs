use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use apiset_classfile::ClassFile;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

fn serialize(class: &ClassFile) -> io::Result<Vec<u8>> {
    class
        .to_bytes()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}

/// Writes each class to `<root>/<internal name>.class`.
pub fn write_class_dir(root: &Path, classes: &[ClassFile]) -> io::Result<()> {
    for class in classes {
        let path = root.join(format!("{}.class", class.this_class));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serialize(class)?)?;
        tracing::trace!(target: "apiset.test_utils", path = %path.display(), "wrote fixture class");
    }
    Ok(())
}

/// Writes the classes into a deflated jar at `path`, with a manifest entry first.
pub fn write_jar(path: &Path, classes: &[ClassFile]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut jar = ZipWriter::new(fs::File::create(path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    jar.start_file("META-INF/MANIFEST.MF", options)?;
    jar.write_all(b"Manifest-Version: 1.0\r\n\r\n")?;
    for class in classes {
        jar.start_file(format!("{}.class", class.this_class), options)?;
        jar.write_all(&serialize(class)?)?;
    }
    jar.finish()?;
    Ok(())
}

/// A temporary directory holding one class directory per version.
pub struct VersionedRoots {
    dir: TempDir,
}

impl VersionedRoots {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Lays out `classes` under `<tmp>/<version>/` and returns that directory.
    pub fn add(&self, version: &str, classes: &[ClassFile]) -> io::Result<PathBuf> {
        let root = self.dir.path().join(version);
        fs::create_dir_all(&root)?;
        write_class_dir(&root, classes)?;
        Ok(root)
    }

    /// Packs `classes` into `<tmp>/<version>.jar` and returns the jar path.
    pub fn add_jar(&self, version: &str, classes: &[ClassFile]) -> io::Result<PathBuf> {
        let path = self.dir.path().join(format!("{version}.jar"));
        write_jar(&path, classes)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassFixture;

    #[test]
    fn class_dir_mirrors_package_layout() {
        let roots = VersionedRoots::new().unwrap();
        let root = roots
            .add("1", &[ClassFixture::class("p/q/A").build()])
            .unwrap();
        let bytes = fs::read(root.join("p/q/A.class")).unwrap();
        assert_eq!(ClassFile::parse(&bytes).unwrap().this_class, "p/q/A");
    }

    #[test]
    fn jar_is_readable() {
        let roots = VersionedRoots::new().unwrap();
        let jar = roots
            .add_jar("1", &[ClassFixture::class("p/A").build()])
            .unwrap();
        let mut archive = zip::ZipArchive::new(fs::File::open(jar).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        assert!(archive.by_name("p/A.class").is_ok());
    }
}
