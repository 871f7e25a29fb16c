//! Conversion between class files and [`ClassEntry`] snapshots.
//!
//! Decoding keeps only what is visible outside the class: private members and private nested
//! class references are dropped. Encoding writes the merged view back, recording version
//! evidence as class-retention annotations.

use apiset_classfile::{
    parse_method_descriptor, Annotation, ClassFile, ClassMember, ConstValue, ElementValue,
    InnerClassInfo, MethodParameter, StubBody,
};

use crate::access::{Modality, Visibility, ACC_ABSTRACT, ACC_NATIVE, ACC_PRIVATE};
use crate::error::CodecError;
use crate::model::{
    Alternatives, Annotations, ClassEntry, FieldEntry, InnerClassRef, MethodEntry, MethodSlot,
    Nullability, Origin, ParameterInfo,
};
use crate::version::Version;

pub const EXISTS_IN: &str = "Lapiset/annotations/ExistsIn;";
pub const ALTERNATIVE_VISIBILITY: &str = "Lapiset/annotations/AlternativeVisibility;";
pub const ALTERNATIVE_MODALITY: &str = "Lapiset/annotations/AlternativeModality;";
pub const MANGLED_NAME: &str = "Lapiset/annotations/MangledName;";
pub const VISIBILITY_ENUM: &str = "Lapiset/annotations/Visibility;";
pub const MODALITY_ENUM: &str = "Lapiset/annotations/Modality;";
pub const NULLABLE: &str = "Lorg/jetbrains/annotations/Nullable;";
pub const NOT_NULL: &str = "Lorg/jetbrains/annotations/NotNull;";
pub const KOTLIN_METADATA: &str = "Lkotlin/Metadata;";

const STUB_EXCEPTION: &str = "java/lang/RuntimeException";
const STUB_MESSAGE: &str = "Stub!";

/// Annotations this crate writes itself; dropped when reading so that a superset can be fed back
/// in as a snapshot.
fn is_version_metadata(descriptor: &str) -> bool {
    matches!(
        descriptor,
        EXISTS_IN | ALTERNATIVE_VISIBILITY | ALTERNATIVE_MODALITY | MANGLED_NAME
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Emit `MethodParameters` for methods whose parameter names are known.
    pub write_parameters: bool,
    /// Give concrete methods a body that throws.
    pub stub_bodies: bool,
    pub major_version: u16,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            write_parameters: true,
            stub_bodies: true,
            major_version: 52,
        }
    }
}

pub fn decode_class<V: Version>(bytes: &[u8], version: V) -> Result<ClassEntry<V>, CodecError> {
    from_class_file(ClassFile::parse(bytes)?, version)
}

/// Splits member annotations into the nullability marker and everything else.
fn take_nullability(visible: Vec<Annotation>, invisible: Vec<Annotation>) -> (Nullability, Annotations) {
    let mut nullability = Nullability::Unknown;
    let mut keep = |list: Vec<Annotation>| {
        let mut rest = Vec::new();
        for annotation in list {
            match annotation.type_descriptor.as_str() {
                NOT_NULL => nullability = nullability.min(Nullability::NotNull),
                NULLABLE => nullability = nullability.min(Nullability::Nullable),
                desc if is_version_metadata(desc) => {}
                _ => rest.push(annotation),
            }
        }
        rest
    };
    let visible = keep(visible);
    let invisible = keep(invisible);
    (nullability, Annotations { visible, invisible })
}

fn member_annotations(member: &mut ClassMember) -> (Nullability, Annotations) {
    take_nullability(
        std::mem::take(&mut member.runtime_visible_annotations),
        std::mem::take(&mut member.runtime_invisible_annotations),
    )
}

pub fn from_class_file<V: Version>(
    mut class: ClassFile,
    version: V,
) -> Result<ClassEntry<V>, CodecError> {
    let mut entry = ClassEntry::new(class.access_flags, class.this_class.clone(), version);
    entry.signature = class.signature.take();
    entry.super_class = class.super_class.take();
    entry.interfaces = std::mem::take(&mut class.interfaces);
    entry.enclosing = class.enclosing_method.take();

    let visible = std::mem::take(&mut class.runtime_visible_annotations);
    let invisible = std::mem::take(&mut class.runtime_invisible_annotations);
    for (annotation, is_visible) in visible
        .into_iter()
        .map(|a| (a, true))
        .chain(invisible.into_iter().map(|a| (a, false)))
    {
        match annotation.type_descriptor.as_str() {
            KOTLIN_METADATA => {
                entry.origin = Origin::Kotlin;
                entry.origin_metadata = Some(annotation);
            }
            desc if is_version_metadata(desc) => {}
            _ if is_visible => entry.annotations.visible.push(annotation),
            _ => entry.annotations.invisible.push(annotation),
        }
    }

    for inner in std::mem::take(&mut class.inner_classes) {
        if inner.access_flags & ACC_PRIVATE != 0 {
            continue;
        }
        entry.inner_classes.insert(
            inner.inner_class,
            InnerClassRef {
                outer: inner.outer_class,
                inner_name: inner.inner_name,
                access: inner.access_flags,
            },
        );
    }

    for mut member in std::mem::take(&mut class.fields) {
        if member.access_flags & ACC_PRIVATE != 0 {
            continue;
        }
        let (nullability, annotations) = member_annotations(&mut member);
        let mut field = FieldEntry::new(member.access_flags, member.name, member.descriptor);
        field.signature = member.signature;
        field.constant_value = member.constant_value;
        field.version = Some(entry.version.clone());
        field.nullability = nullability;
        field.annotations = annotations;

        let key = field.key();
        if entry.fields.contains_key(&key) {
            return Err(CodecError::DuplicateMember {
                class: entry.name,
                member: key,
            });
        }
        entry.fields.insert(key, field);
    }

    for mut member in std::mem::take(&mut class.methods) {
        if member.access_flags & ACC_PRIVATE != 0 {
            continue;
        }
        let arity = parse_method_descriptor(&member.descriptor)?.params.len();
        let (nullability, annotations) = member_annotations(&mut member);
        let mut parameters = vec![ParameterInfo::default(); arity];
        for (info, param) in parameters.iter_mut().zip(std::mem::take(&mut member.parameters)) {
            info.name = param.name;
            info.access = param.access_flags;
        }
        let mut visible = std::mem::take(&mut member.runtime_visible_parameter_annotations).into_iter();
        let mut invisible =
            std::mem::take(&mut member.runtime_invisible_parameter_annotations).into_iter();
        for info in parameters.iter_mut() {
            let (nullability, rest) = take_nullability(
                visible.next().unwrap_or_default(),
                invisible.next().unwrap_or_default(),
            );
            info.nullability = nullability;
            info.annotations = rest;
        }

        let mut method = MethodEntry::new(member.access_flags, member.name, member.descriptor);
        method.signature = member.signature;
        method.exceptions = member.exceptions;
        method.version = Some(entry.version.clone());
        method.nullability = nullability;
        method.parameters = parameters;
        method.annotations = annotations;
        method.annotation_default = member.annotation_default;

        let key = method.key();
        if entry.methods.contains_key(&key) {
            return Err(CodecError::DuplicateMember {
                class: entry.name,
                member: key,
            });
        }
        entry.methods.insert(key, MethodSlot::Single(method));
    }

    Ok(entry)
}

pub fn encode_class<V: Version>(
    entry: &ClassEntry<V>,
    options: &EncodeOptions,
) -> Result<Vec<u8>, CodecError> {
    Ok(to_class_file(entry, options).to_bytes()?)
}

fn string_value(value: impl Into<String>) -> ElementValue {
    ElementValue::Const(ConstValue::String(value.into()))
}

fn enum_value(descriptor: &str, name: &str) -> ElementValue {
    ElementValue::Enum {
        type_descriptor: descriptor.to_string(),
        const_name: name.to_string(),
    }
}

fn exists_in<V: Version>(version: Option<&V>) -> Option<Annotation> {
    let literal = version?.literal()?;
    Some(Annotation::new(
        EXISTS_IN,
        vec![("version".to_string(), string_value(literal))],
    ))
}

fn alternatives<K: Ord + Copy, V: Version>(
    descriptor: &str,
    element: &str,
    table: &Alternatives<K, V>,
    value: impl Fn(K) -> ElementValue,
) -> Option<Annotation> {
    if table.is_empty() {
        return None;
    }
    let (versions, values): (Vec<_>, Vec<_>) = table
        .iter()
        .filter_map(|(key, version)| Some((string_value(version.literal()?), value(key))))
        .unzip();
    Some(Annotation::new(
        descriptor,
        vec![
            ("version".to_string(), ElementValue::Array(versions)),
            (element.to_string(), ElementValue::Array(values)),
        ],
    ))
}

fn version_metadata<V: Version>(
    version: Option<&V>,
    alt_visibility: &Alternatives<Visibility, V>,
    alt_modality: &Alternatives<Modality, V>,
) -> Vec<Annotation> {
    let visibility = alternatives(ALTERNATIVE_VISIBILITY, "visibility", alt_visibility, |v| {
        enum_value(VISIBILITY_ENUM, v.constant_name())
    });
    let modality = alternatives(ALTERNATIVE_MODALITY, "modality", alt_modality, |m| {
        enum_value(MODALITY_ENUM, m.constant_name())
    });
    exists_in(version)
        .into_iter()
        .chain(visibility)
        .chain(modality)
        .collect()
}

fn nullability_annotation(nullability: Nullability) -> Option<Annotation> {
    match nullability {
        Nullability::NotNull => Some(Annotation::new(NOT_NULL, Vec::new())),
        Nullability::Nullable => Some(Annotation::new(NULLABLE, Vec::new())),
        Nullability::Unknown => None,
    }
}

pub fn to_class_file<V: Version>(entry: &ClassEntry<V>, options: &EncodeOptions) -> ClassFile {
    let mut class = ClassFile::new(entry.access.0, entry.name.clone());
    class.major_version = options.major_version;
    class.signature = entry.signature.clone();
    class.super_class = entry.super_class.clone();
    class.interfaces = entry.interfaces.clone();
    class.enclosing_method = entry.enclosing.clone();

    class.runtime_invisible_annotations = entry.annotations.invisible.clone();
    class.runtime_visible_annotations = entry
        .origin_metadata
        .iter()
        .chain(&entry.annotations.visible)
        .cloned()
        .chain(version_metadata(
            Some(&entry.version),
            &entry.alt_visibility,
            &entry.alt_modality,
        ))
        .collect();

    class.inner_classes = entry
        .inner_classes
        .iter()
        .map(|(name, inner)| InnerClassInfo {
            inner_class: name.clone(),
            outer_class: inner.outer.clone(),
            inner_name: inner.inner_name.clone(),
            access_flags: inner.access,
        })
        .collect();

    class.fields = entry.fields.values().map(field_member).collect();

    for slot in entry.methods.values() {
        match slot {
            MethodSlot::Single(method) => class.methods.push(method_member(method, None, options)),
            MethodSlot::Group(variants) => {
                for (index, method) in variants.iter().enumerate() {
                    class
                        .methods
                        .push(method_member(method, Some(index), options));
                }
            }
        }
    }

    class
}

fn field_member<V: Version>(field: &FieldEntry<V>) -> ClassMember {
    let mut member = ClassMember::new(field.access.0, field.name.clone(), field.descriptor.clone());
    member.signature = field.signature.clone();
    member.constant_value = field.constant_value.clone();
    member.runtime_invisible_annotations = field.annotations.invisible.clone();
    member.runtime_visible_annotations = field
        .annotations
        .visible
        .iter()
        .cloned()
        .chain(nullability_annotation(field.nullability))
        .chain(version_metadata(
            field.version.as_ref(),
            &field.alt_visibility,
            &field.alt_modality,
        ))
        .collect();
    member
}

/// `variant` is the position inside a method group; grouped variants get distinct names.
fn method_member<V: Version>(
    method: &MethodEntry<V>,
    variant: Option<usize>,
    options: &EncodeOptions,
) -> ClassMember {
    let name = match variant {
        Some(index) => format!("{}$V{index}", method.name),
        None => method.name.clone(),
    };
    let mut member = ClassMember::new(method.access.0, name, method.descriptor.clone());
    member.signature = method.signature.clone();
    member.exceptions = method.exceptions.clone();
    member.annotation_default = method.annotation_default.clone();

    let mangled = variant.map(|_| {
        Annotation::new(
            MANGLED_NAME,
            vec![("original".to_string(), string_value(method.name.clone()))],
        )
    });
    member.runtime_invisible_annotations = method.annotations.invisible.clone();
    member.runtime_visible_annotations = method
        .annotations
        .visible
        .iter()
        .cloned()
        .chain(nullability_annotation(method.nullability))
        .chain(version_metadata(
            method.version.as_ref(),
            &method.alt_visibility,
            &method.alt_modality,
        ))
        .chain(mangled)
        .collect();

    if options.write_parameters && method.parameters.iter().any(|p| p.name.is_some()) {
        member.parameters = method
            .parameters
            .iter()
            .map(|p| MethodParameter {
                name: p.name.clone(),
                access_flags: p.access,
            })
            .collect();
    }
    let visible = method
        .parameters
        .iter()
        .any(|p| !p.annotations.visible.is_empty() || p.nullability != Nullability::Unknown);
    if visible {
        member.runtime_visible_parameter_annotations = method
            .parameters
            .iter()
            .map(|p| {
                p.annotations
                    .visible
                    .iter()
                    .cloned()
                    .chain(nullability_annotation(p.nullability))
                    .collect()
            })
            .collect();
    }
    if method.parameters.iter().any(|p| !p.annotations.invisible.is_empty()) {
        member.runtime_invisible_parameter_annotations = method
            .parameters
            .iter()
            .map(|p| p.annotations.invisible.clone())
            .collect();
    }

    if options.stub_bodies && !method.access.has(ACC_ABSTRACT | ACC_NATIVE) {
        member.body = Some(StubBody {
            exception: STUB_EXCEPTION.to_string(),
            message: STUB_MESSAGE.to_string(),
        });
    }
    member
}
