//! The growing collection of merged classes.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use indexmap::map::Entry;
use indexmap::IndexMap;
use rayon::prelude::*;

use crate::merger::{MergeOptions, Merger};
use crate::model::ClassEntry;
use crate::report::MergeReport;
use crate::version::Version;

/// What happened to a snapshot passed to [`Superset::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// First snapshot of this class.
    Installed,
    Merged,
    /// The existing entry already covers this snapshot's version; nothing changed.
    Duplicate,
    /// A class-level precondition failed; the existing entry was kept.
    Rejected,
    /// Filtered out before merging.
    Skipped,
}

#[derive(Debug)]
pub struct Superset<V> {
    classes: IndexMap<String, ClassEntry<V>>,
    merger: Merger,
}

impl<V: Version> Default for Superset<V> {
    fn default() -> Self {
        Self::new(MergeOptions::default())
    }
}

impl<V: Version> Superset<V> {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            classes: IndexMap::new(),
            merger: Merger::new(options),
        }
    }

    pub fn append(&mut self, class: ClassEntry<V>) -> AppendOutcome {
        if self.merger.options().skip_package_private_member_classes
            && class.is_package_private_member_class()
        {
            tracing::trace!(target: "apiset.merge", class = %class.name, "skipping package-private member class");
            return AppendOutcome::Skipped;
        }

        match self.classes.entry(class.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(class);
                AppendOutcome::Installed
            }
            Entry::Occupied(existing) if existing.get().version.contains(&class.version) => {
                tracing::debug!(
                    target: "apiset.merge",
                    class = %class.name,
                    version = ?class.version,
                    "ignoring duplicate snapshot"
                );
                AppendOutcome::Duplicate
            }
            Entry::Occupied(mut existing) => {
                if self.merger.merge_classes(existing.get_mut(), class) {
                    AppendOutcome::Merged
                } else {
                    AppendOutcome::Rejected
                }
            }
        }
    }

    pub fn append_all(&mut self, classes: impl IntoIterator<Item = ClassEntry<V>>) {
        for class in classes {
            self.append(class);
        }
    }

    /// Drops member versions that merely repeat their class's version, so that emitted metadata
    /// only records members that differ from their owner.
    pub fn cleanup_versions(&mut self) {
        for class in self.classes.values_mut() {
            let version = &class.version;
            for field in class.fields.values_mut() {
                if field.version.as_ref() == Some(version) {
                    field.version = None;
                }
            }
            for slot in class.methods.values_mut() {
                for method in slot.variants_mut() {
                    if method.version.as_ref() == Some(version) {
                        method.version = None;
                    }
                }
            }
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassEntry<V>> {
        self.classes.values()
    }

    pub fn get(&self, name: &str) -> Option<&ClassEntry<V>> {
        self.classes.get(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn report(&self) -> &MergeReport {
        self.merger.report()
    }

    pub fn into_parts(self) -> (IndexMap<String, ClassEntry<V>>, MergeReport) {
        (self.classes, self.merger.into_report())
    }
}

fn shard_of(name: &str, shards: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    (hasher.finish() % shards as u64) as usize
}

/// Merges `snapshots` split into `shards` partitions by class name, each partition on its own
/// worker.
///
/// Every snapshot of one class lands in the same partition in arrival order, so the result
/// matches a sequential merge. Classes keep the order of their first snapshot.
pub fn merge_sharded<V: Version>(
    snapshots: Vec<ClassEntry<V>>,
    shards: usize,
    options: MergeOptions,
) -> Superset<V> {
    if shards <= 1 {
        let mut superset = Superset::new(options);
        superset.append_all(snapshots);
        return superset;
    }

    let mut first_seen = HashMap::new();
    let mut partitions: Vec<Vec<ClassEntry<V>>> = (0..shards).map(|_| Vec::new()).collect();
    for (index, snapshot) in snapshots.into_iter().enumerate() {
        first_seen.entry(snapshot.name.clone()).or_insert(index);
        partitions[shard_of(&snapshot.name, shards)].push(snapshot);
    }

    let merged: Vec<Superset<V>> = partitions
        .into_par_iter()
        .map(|partition| {
            let mut superset = Superset::new(options);
            superset.append_all(partition);
            superset
        })
        .collect();

    let mut combined = Superset::new(options);
    let mut report = MergeReport::default();
    for shard in merged {
        let (classes, shard_report) = shard.into_parts();
        combined.classes.extend(classes);
        report.absorb(shard_report);
    }
    combined.classes.sort_by(|a, _, b, _| {
        let rank = |name: &String| first_seen.get(name).copied().unwrap_or(usize::MAX);
        rank(a).cmp(&rank(b))
    });
    combined.merger = Merger::with_report(options, report);
    tracing::debug!(
        target: "apiset.merge",
        shards,
        classes = combined.len(),
        "sharded merge finished"
    );
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC};
    use crate::model::{FieldEntry, MethodEntry, MethodSlot};
    use crate::version::TagSet;
    use apiset_classfile::EnclosingMethod;
    use pretty_assertions::assert_eq;

    fn snapshot(name: &str, tag: &str) -> ClassEntry<TagSet> {
        let version = TagSet::single(tag);
        let mut class = ClassEntry::new(ACC_PUBLIC, name, version.clone());
        let mut method = MethodEntry::new(ACC_PUBLIC, "run", "()V");
        method.version = Some(version.clone());
        class.methods.insert(method.key(), MethodSlot::Single(method));
        let mut field = FieldEntry::new(ACC_PUBLIC, format!("since{tag}"), "I");
        field.version = Some(version);
        class.fields.insert(field.key(), field);
        class
    }

    #[test]
    fn outcomes_track_each_append() {
        let mut superset = Superset::default();
        assert_eq!(superset.append(snapshot("p/A", "1")), AppendOutcome::Installed);
        assert_eq!(superset.append(snapshot("p/A", "2")), AppendOutcome::Merged);
        assert_eq!(superset.append(snapshot("p/A", "1")), AppendOutcome::Duplicate);
        assert_eq!(
            superset.append(ClassEntry::new(
                ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
                "p/A",
                TagSet::single("3")
            )),
            AppendOutcome::Rejected
        );

        let mut local = ClassEntry::new(0, "p/A$1", TagSet::single("1"));
        local.enclosing = Some(EnclosingMethod {
            class: "p/A".into(),
            method_name: None,
            method_descriptor: None,
        });
        assert_eq!(superset.append(local), AppendOutcome::Skipped);
        assert_eq!(superset.len(), 1);
    }

    #[test]
    fn duplicate_snapshot_changes_nothing() {
        let mut superset = Superset::default();
        superset.append(snapshot("p/A", "1"));
        superset.append(snapshot("p/A", "2"));
        let before = superset.get("p/A").cloned();

        let mut altered = snapshot("p/A", "2");
        altered.access.0 |= crate::access::ACC_FINAL;
        assert_eq!(superset.append(altered), AppendOutcome::Duplicate);
        assert_eq!(superset.get("p/A").cloned(), before);
        assert_eq!(superset.report().classes.success(), 1);
    }

    #[test]
    fn cleanup_resets_members_matching_their_class() {
        let mut superset = Superset::default();
        superset.append(snapshot("p/A", "1"));
        superset.append(snapshot("p/A", "2"));
        superset.cleanup_versions();

        let class = superset.get("p/A").unwrap();
        assert_eq!(class.version, TagSet::of(["1", "2"]));
        assert_eq!(class.method("run", "()V").unwrap().variants()[0].version, None);
        assert_eq!(class.field("since2", "I").unwrap().version, Some(TagSet::single("2")));
    }

    #[test]
    fn sharded_merge_matches_sequential() {
        let snapshots: Vec<_> = ["p/A", "p/B", "p/C", "p/D"]
            .iter()
            .flat_map(|name| [snapshot(name, "1"), snapshot(name, "2")])
            .collect();

        let mut sequential = Superset::default();
        sequential.append_all(snapshots.clone());
        let sharded = merge_sharded(snapshots, 3, MergeOptions::default());

        let names = |s: &Superset<TagSet>| s.classes().map(|c| c.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&sharded), names(&sequential));
        for class in sequential.classes() {
            assert_eq!(sharded.get(&class.name), Some(class));
        }
        assert_eq!(
            sharded.report().classes.success(),
            sequential.report().classes.success()
        );
    }
}
