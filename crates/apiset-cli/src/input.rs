use std::ffi::OsStr;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use apiset_merge::{decode_class, ClassEntry, TagSet};
use serde::Serialize;

/// One `--root <version>=<path>` argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootSpec {
    pub version: String,
    pub path: PathBuf,
}

impl FromStr for RootSpec {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (version, path) = value
            .split_once('=')
            .ok_or_else(|| format!("expected <version>=<path>, got `{value}`"))?;
        let version = version.trim();
        if version.is_empty() || version.contains(',') {
            return Err(format!("invalid version tag `{version}`"));
        }
        if path.is_empty() {
            return Err(format!("missing path for version `{version}`"));
        }
        Ok(Self {
            version: version.to_string(),
            path: PathBuf::from(path),
        })
    }
}

impl fmt::Display for RootSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.version, self.path.display())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    pub decoded: usize,
    pub decode_failures: usize,
    /// Entries that are not classes in their own right (`module-info`, `package-info`).
    pub skipped: usize,
}

#[derive(Debug)]
pub struct RootSnapshots {
    pub spec: RootSpec,
    pub classes: Vec<ClassEntry<TagSet>>,
    pub stats: ReadStats,
}

fn is_ignored_entry(name: &str) -> bool {
    let file = name.rsplit('/').next().unwrap_or(name);
    file == "module-info.class" || file == "package-info.class" || name.starts_with("META-INF/")
}

struct Collector {
    version: TagSet,
    classes: Vec<ClassEntry<TagSet>>,
    stats: ReadStats,
}

impl Collector {
    fn accept(&mut self, name: &str, bytes: &[u8]) {
        if is_ignored_entry(name) {
            self.stats.skipped += 1;
            return;
        }
        match decode_class(bytes, self.version.clone()) {
            Ok(class) => {
                self.stats.decoded += 1;
                self.classes.push(class);
            }
            Err(err) => {
                self.stats.decode_failures += 1;
                tracing::debug!(target: "apiset.cli", entry = name, error = %err, "failed to decode class");
            }
        }
    }
}

/// Decodes every class under one root. Undecodable classes are counted, not fatal; failing to
/// read the root itself is.
pub fn read_root(spec: &RootSpec) -> Result<RootSnapshots> {
    let mut collector = Collector {
        version: TagSet::single(spec.version.clone()),
        classes: Vec::new(),
        stats: ReadStats::default(),
    };

    if spec.path.is_dir() {
        read_class_dir(&spec.path, &mut collector)?;
    } else if spec.path.is_file() {
        read_jar(&spec.path, &mut collector)?;
    } else {
        bail!("root {} does not exist", spec.path.display());
    }

    tracing::info!(
        target: "apiset.cli",
        version = %spec.version,
        path = %spec.path.display(),
        decoded = collector.stats.decoded,
        failures = collector.stats.decode_failures,
        skipped = collector.stats.skipped,
        "read root"
    );
    Ok(RootSnapshots {
        spec: spec.clone(),
        classes: collector.classes,
        stats: collector.stats,
    })
}

fn read_class_dir(dir: &Path, collector: &mut Collector) -> Result<()> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(dir).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && entry.path().extension() == Some(OsStr::new("class")) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    for path in paths {
        let bytes =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .strip_prefix(dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        collector.accept(&name, &bytes);
    }
    Ok(())
}

fn read_jar(path: &Path, collector: &mut Collector) -> Result<()> {
    let file =
        std::fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a jar", path.display()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read entry {index} of {}", path.display()))?;
        if !entry.is_file() || !entry.name().ends_with(".class") {
            continue;
        }
        let name = entry.name().to_owned();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {name} from {}", path.display()))?;
        collector.accept(&name, &bytes);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn root_spec_parses_version_and_path() {
        let spec: RootSpec = "31=out/android-31.jar".parse().unwrap();
        assert_eq!(spec.version, "31");
        assert_eq!(spec.path, PathBuf::from("out/android-31.jar"));
        assert_eq!(spec.to_string(), "31=out/android-31.jar");
    }

    #[test]
    fn root_spec_rejects_malformed_values() {
        assert!("no-separator".parse::<RootSpec>().is_err());
        assert!("=path".parse::<RootSpec>().is_err());
        assert!("1,2=path".parse::<RootSpec>().is_err());
        assert!("1=".parse::<RootSpec>().is_err());
    }

    #[test]
    fn metadata_entries_are_ignored() {
        assert!(is_ignored_entry("module-info.class"));
        assert!(is_ignored_entry("p/package-info.class"));
        assert!(is_ignored_entry("META-INF/versions/9/p/A.class"));
        assert!(!is_ignored_entry("p/A.class"));
    }
}
