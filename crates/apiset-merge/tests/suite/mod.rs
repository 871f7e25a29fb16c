use apiset_merge::{decode_class, ClassEntry, Superset, TagSet};
use apiset_test_utils::ClassFixture;

mod laws;
mod round_trip;
mod scenarios;
mod statistics;

/// Decodes the fixture as the snapshot of version `tag`.
pub(crate) fn snapshot(fixture: ClassFixture, tag: &str) -> ClassEntry<TagSet> {
    decode_class(&fixture.bytes(), TagSet::single(tag)).expect("fixture should decode")
}

pub(crate) fn merged(snapshots: impl IntoIterator<Item = ClassEntry<TagSet>>) -> Superset<TagSet> {
    let mut superset = Superset::default();
    superset.append_all(snapshots);
    superset
}
