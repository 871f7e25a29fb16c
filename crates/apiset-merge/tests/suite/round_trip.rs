use apiset_classfile::{Annotation, ClassFile, ClassMember, ConstValue, ElementValue};
use apiset_merge::access::{ACC_ABSTRACT, ACC_FINAL, ACC_PRIVATE, ACC_PUBLIC, ACC_STATIC};
use apiset_merge::codec::EXISTS_IN;
use apiset_merge::{encode_class, EncodeOptions};
use apiset_test_utils::ClassFixture;
use pretty_assertions::assert_eq;

use super::{merged, snapshot};

fn exists_in(annotations: &[Annotation]) -> Option<&str> {
    let annotation = annotations.iter().find(|a| a.type_descriptor == EXISTS_IN)?;
    match annotation.element("version")? {
        ElementValue::Const(ConstValue::String(value)) => Some(value),
        _ => None,
    }
}

fn shape(members: &[ClassMember]) -> Vec<(u16, String, String, Option<String>)> {
    members
        .iter()
        .map(|m| (m.access_flags, m.name.clone(), m.descriptor.clone(), m.signature.clone()))
        .collect()
}

#[test]
fn single_version_survives_decode_merge_encode() {
    let fixture = ClassFixture::class("p/Box")
        .access(ACC_PUBLIC | ACC_ABSTRACT)
        .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Iterable<TT;>;")
        .implements("java/lang/Iterable")
        .field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, "EMPTY", "Lp/Box;")
        .field(ACC_PUBLIC, "value", "Ljava/lang/Object;")
        .method(ACC_PUBLIC, "<init>", "()V")
        .generic_method(ACC_PUBLIC, "get", "()Ljava/lang/Object;", "()TT;")
        .method(ACC_PUBLIC | ACC_ABSTRACT, "size", "()I")
        .method(ACC_PRIVATE, "hidden", "()V");
    let original = fixture.clone().build();

    let mut superset = merged([snapshot(fixture, "1")]);
    superset.cleanup_versions();
    let bytes = encode_class(superset.get("p/Box").unwrap(), &EncodeOptions::default()).unwrap();
    let written = ClassFile::parse(&bytes).unwrap();

    assert_eq!(written.access_flags, original.access_flags);
    assert_eq!(written.super_class, original.super_class);
    assert_eq!(written.interfaces, original.interfaces);
    assert_eq!(written.signature, original.signature);
    assert_eq!(shape(&written.fields), shape(&original.fields));
    assert_eq!(shape(&written.methods), shape(&original.methods[..3]));

    assert_eq!(exists_in(&written.runtime_visible_annotations), Some("1"));
    assert!(written
        .methods
        .iter()
        .all(|m| exists_in(&m.runtime_visible_annotations).is_none()));
}

#[test]
fn members_newer_than_their_class_carry_their_own_version() {
    let mut superset = merged([
        snapshot(ClassFixture::class("p/A"), "1"),
        snapshot(ClassFixture::class("p/A").method(ACC_PUBLIC, "added", "()V"), "2"),
    ]);
    superset.cleanup_versions();

    let bytes = encode_class(superset.get("p/A").unwrap(), &EncodeOptions::default()).unwrap();
    let written = ClassFile::parse(&bytes).unwrap();
    assert_eq!(exists_in(&written.runtime_visible_annotations), Some("1, 2"));
    assert_eq!(exists_in(&written.methods[0].runtime_visible_annotations), Some("2"));
}
