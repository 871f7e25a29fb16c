use apiset_merge::access::{ACC_FINAL, ACC_PUBLIC};
use apiset_merge::{ConflictKind, ScopeKind, TagSet};
use apiset_test_utils::ClassFixture;
use pretty_assertions::assert_eq;

use super::{merged, snapshot};

#[test]
fn field_modality_change_is_reported_and_keeps_the_first_field() {
    let superset = merged([
        snapshot(ClassFixture::class("p/A").field(ACC_PUBLIC | ACC_FINAL, "x", "I"), "1"),
        snapshot(ClassFixture::class("p/A").field(ACC_PUBLIC, "x", "I"), "2"),
    ]);

    let field = superset.get("p/A").unwrap().field("x", "I").unwrap();
    assert!(field.access.has(ACC_FINAL));
    assert_eq!(field.version, Some(TagSet::single("1")));

    let report = superset.report();
    let failures = report.scope(ScopeKind::Fields).failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, ConflictKind::FieldModalityMismatch);
    assert_eq!(failures[0].subject, "p/A.x:I");
}

#[test]
fn statistics_serialize_per_scope_and_category() {
    let superset = merged([
        snapshot(
            ClassFixture::class("p/A")
                .field(ACC_PUBLIC | ACC_FINAL, "x", "I")
                .method(ACC_PUBLIC, "f", "()V"),
            "1",
        ),
        snapshot(
            ClassFixture::class("p/A")
                .field(ACC_PUBLIC, "x", "I")
                .method(ACC_PUBLIC, "f", "()V"),
            "2",
        ),
    ]);

    let json = serde_json::to_value(superset.report().statistics()).unwrap();
    assert_eq!(json["scopes"]["classes"]["success"], 1);
    assert_eq!(json["scopes"]["methods"]["success"], 1);
    assert_eq!(json["scopes"]["fields"]["failed"], 1);
    assert_eq!(json["scopes"]["fields"]["total"], 1);
    assert_eq!(
        json["scopes"]["fields"]["by_category"]["fieldModalityMismatch"],
        1
    );
}
