use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apiset_config::ApisetConfig;
use apiset_merge::{
    encode_class, merge_sharded, ClassEntry, ClassGrouper, EncodeOptions, MergeStatistics,
    Superset, TagSet,
};
use serde::Serialize;

use crate::input::{read_root, ReadStats, RootSnapshots, RootSpec};

#[derive(Debug, Clone, Serialize)]
pub struct RootSummary {
    pub version: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub stats: ReadStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub roots: Vec<RootSummary>,
    pub classes: usize,
    pub statistics: MergeStatistics,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for root in &self.roots {
            writeln!(
                f,
                "root {} ({}): decoded {}, failed {}, skipped {}",
                root.version,
                root.path.display(),
                root.stats.decoded,
                root.stats.decode_failures,
                root.stats.skipped
            )?;
        }
        writeln!(f, "classes: {}", self.classes)?;
        write!(f, "{}", self.statistics)
    }
}

pub struct Merged {
    pub superset: Superset<TagSet>,
    pub roots: Vec<RootSummary>,
    pub decode_failures: usize,
}

impl Merged {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            roots: self.roots.clone(),
            classes: self.superset.len(),
            statistics: self.superset.report().statistics(),
        }
    }
}

/// Reads every root in order; snapshots of later roots are merged into earlier ones.
pub fn read_roots(specs: &[RootSpec]) -> Result<Vec<RootSnapshots>> {
    specs.iter().map(read_root).collect()
}

pub fn merge_roots(roots: Vec<RootSnapshots>, config: &ApisetConfig) -> Merged {
    let mut summaries = Vec::with_capacity(roots.len());
    let mut snapshots: Vec<ClassEntry<TagSet>> = Vec::new();
    for root in roots {
        summaries.push(RootSummary {
            version: root.spec.version,
            path: root.spec.path,
            stats: root.stats,
        });
        snapshots.extend(root.classes);
    }
    let decode_failures = summaries.iter().map(|r| r.stats.decode_failures).sum();

    if config.merge.group_classes {
        let mut grouper = ClassGrouper::new();
        for snapshot in snapshots {
            grouper.add(snapshot);
        }
        grouper.group_all();
        snapshots = grouper.rewrite();
    }

    let mut superset = merge_sharded(snapshots, config.run.shards, config.merge.options());
    superset.cleanup_versions();
    Merged {
        superset,
        roots: summaries,
        decode_failures,
    }
}

/// Writes each class to `<out>/<internal name>.class` and returns how many were written.
pub fn write_superset(
    superset: &Superset<TagSet>,
    out: &Path,
    options: &EncodeOptions,
) -> Result<usize> {
    let mut written = 0;
    for class in superset.classes() {
        let bytes = encode_class(class, options)
            .with_context(|| format!("failed to encode {}", class.name))?;
        let path = out.join(format!("{}.class", class.name));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
        written += 1;
    }
    tracing::info!(target: "apiset.cli", out = %out.display(), written, "wrote superset");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiset_merge::access::{ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC};
    use apiset_merge::ClassEntry;
    use pretty_assertions::assert_eq;

    fn root(version: &str, classes: Vec<ClassEntry<TagSet>>) -> RootSnapshots {
        RootSnapshots {
            spec: RootSpec {
                version: version.to_string(),
                path: PathBuf::from(format!("{version}.jar")),
            },
            stats: ReadStats {
                decoded: classes.len(),
                decode_failures: 1,
                skipped: 0,
            },
            classes,
        }
    }

    #[test]
    fn grouping_splits_a_class_that_became_an_interface() {
        let v1 = ClassEntry::new(ACC_PUBLIC, "p/A", TagSet::single("1"));
        let v2 = ClassEntry::new(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT, "p/A", TagSet::single("2"));

        let mut config = ApisetConfig::default();
        let plain = merge_roots(vec![root("1", vec![v1.clone()]), root("2", vec![v2.clone()])], &config);
        assert_eq!(plain.superset.len(), 1);
        assert_eq!(plain.decode_failures, 2);

        config.merge.group_classes = true;
        let grouped = merge_roots(vec![root("1", vec![v1]), root("2", vec![v2])], &config);
        let names: Vec<_> = grouped.superset.classes().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["p/AV0", "p/AV1"]);
        assert!(!grouped.superset.report().has_conflicts());
    }

    #[test]
    fn summary_lists_roots_then_statistics() {
        let merged = merge_roots(
            vec![root("1", vec![ClassEntry::new(ACC_PUBLIC, "p/A", TagSet::single("1"))])],
            &ApisetConfig::default(),
        );
        let text = merged.summary().to_string();
        assert!(text.starts_with("root 1 (1.jar): decoded 1, failed 1, skipped 0\nclasses: 1\nClasses:\n"));
    }
}
