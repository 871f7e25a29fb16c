use crate::annotation::{Annotation, ConstValue, ElementValue};
use crate::constant_pool::{ConstantPool, CpInfo};
use crate::error::{Error, Result};
use crate::reader::Reader;

pub const CLASSFILE_MAGIC: u32 = 0xCAFEBABE;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<ClassMember>,
    pub methods: Vec<ClassMember>,
    pub signature: Option<String>,
    pub runtime_visible_annotations: Vec<Annotation>,
    pub runtime_invisible_annotations: Vec<Annotation>,
    pub inner_classes: Vec<InnerClassInfo>,
    pub enclosing_method: Option<EnclosingMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMember {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub runtime_visible_annotations: Vec<Annotation>,
    pub runtime_invisible_annotations: Vec<Annotation>,
    /// Methods only: `Exceptions` attribute.
    pub exceptions: Vec<String>,
    /// Methods only: `MethodParameters` attribute.
    pub parameters: Vec<MethodParameter>,
    /// Methods only: one list per declared parameter.
    pub runtime_visible_parameter_annotations: Vec<Vec<Annotation>>,
    pub runtime_invisible_parameter_annotations: Vec<Vec<Annotation>>,
    /// Annotation interface methods only.
    pub annotation_default: Option<ElementValue>,
    /// Fields only.
    pub constant_value: Option<ConstValue>,
    /// Methods only. `Code` attributes are not retained when parsing; this is only set for
    /// classes produced by a writer that wants a body.
    pub body: Option<StubBody>,
}

impl ClassMember {
    pub fn new(access_flags: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            runtime_visible_annotations: Vec::new(),
            runtime_invisible_annotations: Vec::new(),
            exceptions: Vec::new(),
            parameters: Vec::new(),
            runtime_visible_parameter_annotations: Vec::new(),
            runtime_invisible_parameter_annotations: Vec::new(),
            annotation_default: None,
            constant_value: None,
            body: None,
        }
    }

    /// Visible and invisible annotations, visible first.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.runtime_visible_annotations
            .iter()
            .chain(self.runtime_invisible_annotations.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassInfo {
    pub inner_class: String,
    pub outer_class: Option<String>,
    pub inner_name: Option<String>,
    pub access_flags: u16,
}

/// `EnclosingMethod` attribute of local and anonymous classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnclosingMethod {
    pub class: String,
    pub method_name: Option<String>,
    pub method_descriptor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodParameter {
    pub name: Option<String>,
    pub access_flags: u16,
}

/// A method body that throws `exception` (constructed with `message`) when invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubBody {
    pub exception: String,
    pub message: String,
}

impl ClassFile {
    pub fn new(access_flags: u16, this_class: impl Into<String>) -> Self {
        Self {
            minor_version: 0,
            major_version: 52,
            access_flags,
            this_class: this_class.into(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            signature: None,
            runtime_visible_annotations: Vec::new(),
            runtime_invisible_annotations: Vec::new(),
            inner_classes: Vec::new(),
            enclosing_method: None,
        }
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.runtime_visible_annotations
            .iter()
            .chain(self.runtime_invisible_annotations.iter())
    }

    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        match reader.read_u4()? {
            CLASSFILE_MAGIC => {}
            other => return Err(Error::InvalidMagic(other)),
        }
        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let cp = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = cp.get_class_name(reader.read_u2()?)?;
        let super_class = optional_class(&cp, reader.read_u2()?)?;
        let count = reader.read_u2()?;
        let interfaces = counted(count, || cp.get_class_name(reader.read_u2()?))?;
        let count = reader.read_u2()?;
        let fields = counted(count, || parse_member(&mut reader, &cp, AttributeTarget::Field))?;
        let count = reader.read_u2()?;
        let methods = counted(count, || parse_member(&mut reader, &cp, AttributeTarget::Method))?;
        let attrs = parse_attributes(&mut reader, &cp, AttributeTarget::Class)?;
        reader.ensure_empty("class")?;

        Ok(Self {
            minor_version,
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            signature: attrs.signature,
            runtime_visible_annotations: attrs.runtime_visible_annotations,
            runtime_invisible_annotations: attrs.runtime_invisible_annotations,
            inner_classes: attrs.inner_classes,
            enclosing_method: attrs.enclosing_method,
        })
    }
}

/// Runs `item` `count` times, stopping at the first error.
fn counted<T>(count: impl Into<usize>, mut item: impl FnMut() -> Result<T>) -> Result<Vec<T>> {
    (0..count.into()).map(|_| item()).collect()
}

/// Index 0 stands for "absent" in several attribute slots.
fn optional_class(cp: &ConstantPool, index: u16) -> Result<Option<String>> {
    match index {
        0 => Ok(None),
        index => cp.get_class_name(index).map(Some),
    }
}

fn optional_utf8(cp: &ConstantPool, index: u16) -> Result<Option<String>> {
    match index {
        0 => Ok(None),
        index => Ok(Some(cp.get_utf8(index)?.to_string())),
    }
}

fn parse_member(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    target: AttributeTarget,
) -> Result<ClassMember> {
    let access_flags = reader.read_u2()?;
    let name = cp.get_utf8(reader.read_u2()?)?.to_string();
    let descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
    let attrs = parse_attributes(reader, cp, target)?;
    Ok(ClassMember {
        signature: attrs.signature,
        runtime_visible_annotations: attrs.runtime_visible_annotations,
        runtime_invisible_annotations: attrs.runtime_invisible_annotations,
        exceptions: attrs.exceptions,
        parameters: attrs.parameters,
        runtime_visible_parameter_annotations: attrs.runtime_visible_parameter_annotations,
        runtime_invisible_parameter_annotations: attrs.runtime_invisible_parameter_annotations,
        annotation_default: attrs.annotation_default,
        constant_value: attrs.constant_value,
        ..ClassMember::new(access_flags, name, descriptor)
    })
}

#[derive(Default)]
struct ParsedAttributes {
    signature: Option<String>,
    runtime_visible_annotations: Vec<Annotation>,
    runtime_invisible_annotations: Vec<Annotation>,
    inner_classes: Vec<InnerClassInfo>,
    enclosing_method: Option<EnclosingMethod>,
    exceptions: Vec<String>,
    parameters: Vec<MethodParameter>,
    runtime_visible_parameter_annotations: Vec<Vec<Annotation>>,
    runtime_invisible_parameter_annotations: Vec<Vec<Annotation>>,
    annotation_default: Option<ElementValue>,
    constant_value: Option<ConstValue>,
}

#[derive(Clone, Copy)]
enum AttributeTarget {
    Class,
    Field,
    Method,
}

fn parse_annotations(sub: &mut Reader<'_>, cp: &ConstantPool) -> Result<Vec<Annotation>> {
    let count = sub.read_u2()?;
    counted(count, || Annotation::parse(sub, cp))
}

fn parse_parameter_annotations(
    sub: &mut Reader<'_>,
    cp: &ConstantPool,
) -> Result<Vec<Vec<Annotation>>> {
    let count = sub.read_u1()?;
    counted(count, || parse_annotations(sub, cp))
}

fn parse_attributes(
    reader: &mut Reader<'_>,
    cp: &ConstantPool,
    target: AttributeTarget,
) -> Result<ParsedAttributes> {
    let mut parsed = ParsedAttributes::default();
    for _ in 0..reader.read_u2()? {
        let name = cp.get_utf8(reader.read_u2()?)?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?;
        let mut sub = Reader::new(info);
        match (name, target) {
            ("Signature", _) => {
                parsed.signature = Some(cp.get_utf8(sub.read_u2()?)?.to_string());
                sub.ensure_empty("Signature")?;
            }
            ("RuntimeVisibleAnnotations", _) => {
                let annotations = parse_annotations(&mut sub, cp)?;
                parsed.runtime_visible_annotations.extend(annotations);
                sub.ensure_empty("RuntimeVisibleAnnotations")?;
            }
            ("RuntimeInvisibleAnnotations", _) => {
                let annotations = parse_annotations(&mut sub, cp)?;
                parsed.runtime_invisible_annotations.extend(annotations);
                sub.ensure_empty("RuntimeInvisibleAnnotations")?;
            }
            ("InnerClasses", AttributeTarget::Class) => {
                let count = sub.read_u2()?;
                let entries = counted(count, || {
                    let inner_class = cp.get_class_name(sub.read_u2()?)?;
                    let outer_class = optional_class(cp, sub.read_u2()?)?;
                    let inner_name = optional_utf8(cp, sub.read_u2()?)?;
                    Ok(InnerClassInfo {
                        inner_class,
                        outer_class,
                        inner_name,
                        access_flags: sub.read_u2()?,
                    })
                })?;
                parsed.inner_classes.extend(entries);
                sub.ensure_empty("InnerClasses")?;
            }
            ("EnclosingMethod", AttributeTarget::Class) => {
                let class = cp.get_class_name(sub.read_u2()?)?;
                let method_index = sub.read_u2()?;
                let (method_name, method_descriptor) = if method_index == 0 {
                    (None, None)
                } else {
                    match cp.get(method_index)? {
                        CpInfo::NameAndType(name, descriptor) => (
                            Some(cp.get_utf8(*name)?.to_string()),
                            Some(cp.get_utf8(*descriptor)?.to_string()),
                        ),
                        other => {
                            return Err(Error::ConstantPoolTypeMismatch {
                                index: method_index,
                                expected: "NameAndType",
                                found: other.kind(),
                            })
                        }
                    }
                };
                parsed.enclosing_method = Some(EnclosingMethod {
                    class,
                    method_name,
                    method_descriptor,
                });
                sub.ensure_empty("EnclosingMethod")?;
            }
            ("Exceptions", AttributeTarget::Method) => {
                let count = sub.read_u2()?;
                parsed.exceptions = counted(count, || cp.get_class_name(sub.read_u2()?))?;
                sub.ensure_empty("Exceptions")?;
            }
            ("MethodParameters", AttributeTarget::Method) => {
                let count = sub.read_u1()?;
                parsed.parameters = counted(count, || {
                    let name = optional_utf8(cp, sub.read_u2()?)?;
                    Ok(MethodParameter {
                        name,
                        access_flags: sub.read_u2()?,
                    })
                })?;
                sub.ensure_empty("MethodParameters")?;
            }
            ("RuntimeVisibleParameterAnnotations", AttributeTarget::Method) => {
                parsed.runtime_visible_parameter_annotations =
                    parse_parameter_annotations(&mut sub, cp)?;
                sub.ensure_empty("RuntimeVisibleParameterAnnotations")?;
            }
            ("RuntimeInvisibleParameterAnnotations", AttributeTarget::Method) => {
                parsed.runtime_invisible_parameter_annotations =
                    parse_parameter_annotations(&mut sub, cp)?;
                sub.ensure_empty("RuntimeInvisibleParameterAnnotations")?;
            }
            ("AnnotationDefault", AttributeTarget::Method) => {
                parsed.annotation_default = Some(ElementValue::parse(&mut sub, cp)?);
                sub.ensure_empty("AnnotationDefault")?;
            }
            ("ConstantValue", AttributeTarget::Field) => {
                let index = sub.read_u2()?;
                let value = match cp.get(index)? {
                    CpInfo::Integer(v) => ConstValue::Int(*v),
                    CpInfo::Float(v) => ConstValue::Float(*v),
                    CpInfo::Long(v) => ConstValue::Long(*v),
                    CpInfo::Double(v) => ConstValue::Double(*v),
                    CpInfo::String(_) => ConstValue::String(cp.get_string_constant(index)?),
                    _ => return Err(Error::MalformedAttribute("ConstantValue")),
                };
                parsed.constant_value = Some(value);
                sub.ensure_empty("ConstantValue")?;
            }
            // `Code` and anything unknown.
            _ => {}
        }
    }

    Ok(parsed)
}
