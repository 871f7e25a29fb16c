use apiset_merge::access::{ACC_PUBLIC, ACC_STATIC};
use apiset_merge::{
    encode_class, ClassReadVersionInfo, ConflictKind, EncodeOptions, MergeOptions, Superset,
    TagSet, TagSetLoader, VersionInfoProvider, Visibility,
};
use apiset_test_utils::ClassFixture;
use pretty_assertions::assert_eq;

use super::{merged, snapshot};

#[test]
fn removed_method_keeps_its_old_version() {
    let superset = merged([
        snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "f", "()V"), "1"),
        snapshot(ClassFixture::class("p/A"), "2"),
    ]);

    let class = superset.get("p/A").unwrap();
    assert_eq!(class.version, TagSet::of(["1", "2"]));
    let f = &class.method("f", "()V").unwrap().variants()[0];
    assert_eq!(f.version, Some(TagSet::single("1")));
    assert!(!superset.report().has_conflicts());
}

#[test]
fn narrowed_visibility_is_widened_and_remembered() {
    let superset = merged([
        snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "f", "()V"), "1"),
        snapshot(ClassFixture::class("p/A").method(0, "f", "()V"), "2"),
    ]);

    let f = &superset.get("p/A").unwrap().method("f", "()V").unwrap().variants()[0];
    assert_eq!(f.access.visibility(), Visibility::Public);
    assert_eq!(f.alt_visibility.len(), 2);
    assert_eq!(f.alt_visibility.get(Visibility::Public), Some(&TagSet::single("1")));
    assert_eq!(
        f.alt_visibility.get(Visibility::PackagePrivate),
        Some(&TagSet::single("2"))
    );
    assert_eq!(f.version, Some(TagSet::of(["1", "2"])));
}

#[test]
fn drifting_generic_argument_widens_to_wildcard() {
    let superset = merged([
        snapshot(
            ClassFixture::class("p/A").generic_method(
                ACC_PUBLIC,
                "m",
                "(Ljava/util/List;)V",
                "(Ljava/util/List<Ljava/lang/String;>;)V",
            ),
            "1",
        ),
        snapshot(
            ClassFixture::class("p/A").generic_method(
                ACC_PUBLIC,
                "m",
                "(Ljava/util/List;)V",
                "(Ljava/util/List<+Ljava/lang/Object;>;)V",
            ),
            "2",
        ),
    ]);

    let slot = superset
        .get("p/A")
        .unwrap()
        .method("m", "(Ljava/util/List;)V")
        .unwrap();
    assert!(!slot.is_group());
    assert_eq!(
        slot.variants()[0].signature.as_deref(),
        Some("(Ljava/util/List<+Ljava/lang/Object;>;)V")
    );
    assert_eq!(superset.report().methods.failed(), 0);
}

#[test]
fn constructors_with_different_parameters_stay_separate() {
    let superset = merged([
        snapshot(
            ClassFixture::class("p/A").method(ACC_PUBLIC, "<init>", "(Ljava/lang/String;)V"),
            "1",
        ),
        snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "<init>", "(I)V"), "2"),
    ]);

    let class = superset.get("p/A").unwrap();
    let by_string = class.method("<init>", "(Ljava/lang/String;)V").unwrap();
    let by_int = class.method("<init>", "(I)V").unwrap();
    assert_eq!(by_string.variants()[0].version, Some(TagSet::single("1")));
    assert_eq!(by_int.variants()[0].version, Some(TagSet::single("2")));
}

#[test]
fn constructor_generic_drift_is_unified_even_without_deep_merge() {
    let constructor = |sig: &str| {
        ClassFixture::class("p/A").generic_method(ACC_PUBLIC, "<init>", "(Ljava/util/List;)V", sig)
    };
    let snapshots = [
        snapshot(constructor("(Ljava/util/List<Ljava/lang/String;>;)V"), "1"),
        snapshot(constructor("(Ljava/util/List<+Ljava/lang/Object;>;)V"), "2"),
    ];

    let options = MergeOptions {
        deep_signature_merge: false,
        ..MergeOptions::default()
    };
    let mut shallow = Superset::new(options);
    shallow.append_all(snapshots.clone());
    for superset in [merged(snapshots), shallow] {
        let slot = superset
            .get("p/A")
            .unwrap()
            .method("<init>", "(Ljava/util/List;)V")
            .unwrap();
        assert!(!slot.is_group());
        assert_eq!(
            slot.variants()[0].signature.as_deref(),
            Some("(Ljava/util/List<+Ljava/lang/Object;>;)V")
        );
        assert_eq!(slot.variants()[0].version, Some(TagSet::of(["1", "2"])));
        assert_eq!(superset.report().methods.failed(), 0);
    }
}

#[test]
fn static_flip_groups_variants_under_one_key() {
    let mut superset = merged([
        snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "m", "()V"), "1"),
        snapshot(
            ClassFixture::class("p/A").method(ACC_PUBLIC | ACC_STATIC, "m", "()V"),
            "2",
        ),
    ]);

    let slot = superset.get("p/A").unwrap().method("m", "()V").unwrap();
    assert!(slot.is_group());
    let versions: Vec<_> = slot.variants().iter().map(|m| m.version.clone()).collect();
    assert_eq!(
        versions,
        vec![Some(TagSet::single("1")), Some(TagSet::single("2"))]
    );
    let failures = superset.report().methods.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, ConflictKind::MethodKindMismatch);

    superset.cleanup_versions();
    let bytes = encode_class(superset.get("p/A").unwrap(), &EncodeOptions::default()).unwrap();
    let class = apiset_classfile::ClassFile::parse(&bytes).unwrap();
    let names: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["m$V0", "m$V1"]);

    let mut info = ClassReadVersionInfo::new();
    info.add_class_file(&class, &TagSetLoader);
    assert_eq!(info.for_method("p/A", "m", "()V"), Some(TagSet::of(["1", "2"])));
}

#[test]
fn class_kind_change_rejects_the_whole_snapshot() {
    let superset = merged([
        snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "f", "()V"), "1"),
        snapshot(ClassFixture::interface("p/A").method(ACC_PUBLIC, "g", "()V"), "2"),
    ]);

    let class = superset.get("p/A").unwrap();
    assert_eq!(class.version, TagSet::single("1"));
    assert!(class.method("g", "()V").is_none());
    assert_eq!(
        superset.report().classes.failures()[0].kind,
        ConflictKind::ClassKindMismatch
    );
}
