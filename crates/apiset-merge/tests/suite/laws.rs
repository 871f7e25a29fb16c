use apiset_merge::access::{ACC_ABSTRACT, ACC_FINAL, ACC_PRIVATE, ACC_PROTECTED, ACC_PUBLIC};
use apiset_merge::{ClassEntry, MergeOptions, Merger, TagSet, Version};
use apiset_test_utils::ClassFixture;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::{merged, snapshot};

fn tag_set() -> impl Strategy<Value = TagSet> {
    prop_oneof![
        1 => Just(TagSet::Universal),
        6 => prop::collection::btree_set("[a-e]", 0..4).prop_map(TagSet::Tags),
    ]
}

proptest! {
    #[test]
    fn plus_is_commutative(a in tag_set(), b in tag_set()) {
        prop_assert_eq!(a.plus(&b), b.plus(&a));
    }

    #[test]
    fn plus_is_associative(a in tag_set(), b in tag_set(), c in tag_set()) {
        prop_assert_eq!(a.plus(&b).plus(&c), a.plus(&b.plus(&c)));
    }

    #[test]
    fn plus_is_an_upper_bound(a in tag_set(), b in tag_set()) {
        let joined = a.plus(&b);
        prop_assert!(joined.contains(&a));
        prop_assert!(joined.contains(&b));
        prop_assert!(a.contains(&a));
    }

    #[test]
    fn merging_never_narrows_a_class(
        left_visibility in prop::sample::select(vec![ACC_PUBLIC, ACC_PROTECTED, 0, ACC_PRIVATE]),
        right_visibility in prop::sample::select(vec![ACC_PUBLIC, ACC_PROTECTED, 0, ACC_PRIVATE]),
        left_modality in prop::sample::select(vec![0, ACC_FINAL, ACC_ABSTRACT]),
        right_modality in prop::sample::select(vec![0, ACC_FINAL, ACC_ABSTRACT]),
    ) {
        let mut target = ClassEntry::new(left_visibility | left_modality, "p/A", TagSet::single("1"));
        let incoming = ClassEntry::new(right_visibility | right_modality, "p/A", TagSet::single("2"));
        let (left, right) = (target.access, incoming.access);

        let mut merger = Merger::new(MergeOptions::default());
        prop_assert!(merger.merge_classes(&mut target, incoming));

        prop_assert!(target.access.visibility() >= left.visibility());
        prop_assert!(target.access.visibility() >= right.visibility());
        prop_assert!(target.access.modality().is_at_least(left.modality()));
        prop_assert!(target.access.modality().is_at_least(right.modality()));
        prop_assert_eq!(target.alt_visibility.is_empty(), left.visibility() == right.visibility());
    }
}

#[test]
fn merging_a_snapshot_with_itself_changes_nothing() {
    let fixture = ClassFixture::class("p/A")
        .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
        .method(ACC_PUBLIC, "f", "()V")
        .generic_method(ACC_PUBLIC, "get", "()Ljava/lang/Object;", "()TT;")
        .field(ACC_PUBLIC | ACC_FINAL, "size", "I")
        .annotation("Lp/Marker;");
    let original = snapshot(fixture.clone(), "1");

    let superset = merged([snapshot(fixture.clone(), "1"), snapshot(fixture, "1")]);

    assert_eq!(superset.get("p/A"), Some(&original));
    assert!(!superset.report().has_conflicts());
}

#[test]
fn class_version_does_not_depend_on_arrival_order() {
    let versions = ["3", "1", "2"];
    let forward = merged(
        versions
            .iter()
            .map(|tag| snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "f", "()V"), tag)),
    );
    let backward = merged(
        versions
            .iter()
            .rev()
            .map(|tag| snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "f", "()V"), tag)),
    );

    let version = |superset: &apiset_merge::Superset<TagSet>| superset.get("p/A").unwrap().version.clone();
    assert_eq!(version(&forward), TagSet::of(["1", "2", "3"]));
    assert_eq!(version(&forward), version(&backward));
}
