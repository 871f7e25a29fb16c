use crate::annotation::{Annotation, ConstValue};
use crate::classfile::{ClassFile, ClassMember, StubBody, CLASSFILE_MAGIC};
use crate::constant_pool::ConstantPoolBuilder;
use crate::descriptor::parse_method_descriptor;
use crate::error::{Error, Result};
use crate::reader::Writer;

const ACC_STATIC: u16 = 0x0008;

const OP_NEW: u8 = 0xBB;
const OP_DUP: u8 = 0x59;
const OP_LDC_W: u8 = 0x13;
const OP_INVOKESPECIAL: u8 = 0xB7;
const OP_ATHROW: u8 = 0xBF;

impl ClassFile {
    /// Serializes the class with a freshly built constant pool.
    ///
    /// Only the attributes modelled by [`ClassFile`] are written; method bodies are emitted
    /// for members carrying a [`StubBody`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cp = ConstantPoolBuilder::new();
        let mut body = Writer::new();

        body.u2(self.access_flags);
        body.u2(cp.class(&self.this_class)?);
        match &self.super_class {
            Some(name) => body.u2(cp.class(name)?),
            None => body.u2(0),
        }
        body.len_u2(self.interfaces.len(), "interfaces")?;
        for iface in &self.interfaces {
            body.u2(cp.class(iface)?);
        }

        body.len_u2(self.fields.len(), "fields")?;
        for field in &self.fields {
            write_member(&mut body, &mut cp, field, false)?;
        }
        body.len_u2(self.methods.len(), "methods")?;
        for method in &self.methods {
            write_member(&mut body, &mut cp, method, true)?;
        }

        let mut attrs = AttributeList::default();
        if let Some(sig) = &self.signature {
            attrs.push(&mut cp, "Signature", |w, cp| {
                w.u2(cp.utf8(sig)?);
                Ok(())
            })?;
        }
        write_annotation_attributes(
            &mut attrs,
            &mut cp,
            &self.runtime_visible_annotations,
            &self.runtime_invisible_annotations,
        )?;
        if let Some(enclosing) = &self.enclosing_method {
            attrs.push(&mut cp, "EnclosingMethod", |w, cp| {
                w.u2(cp.class(&enclosing.class)?);
                match (&enclosing.method_name, &enclosing.method_descriptor) {
                    (Some(name), Some(descriptor)) => {
                        let nat = cp.name_and_type(name, descriptor)?;
                        w.u2(nat);
                    }
                    _ => w.u2(0),
                }
                Ok(())
            })?;
        }
        if !self.inner_classes.is_empty() {
            attrs.push(&mut cp, "InnerClasses", |w, cp| {
                w.len_u2(self.inner_classes.len(), "InnerClasses")?;
                for inner in &self.inner_classes {
                    w.u2(cp.class(&inner.inner_class)?);
                    match &inner.outer_class {
                        Some(outer) => w.u2(cp.class(outer)?),
                        None => w.u2(0),
                    }
                    match &inner.inner_name {
                        Some(name) => w.u2(cp.utf8(name)?),
                        None => w.u2(0),
                    }
                    w.u2(inner.access_flags);
                }
                Ok(())
            })?;
        }
        attrs.write(&mut body)?;

        cp.check_lengths()?;

        let mut out = Writer::new();
        out.u4(CLASSFILE_MAGIC);
        out.u2(self.minor_version);
        out.u2(self.major_version);
        cp.write(&mut out);
        let body = body.into_bytes();
        out.bytes(&body);
        Ok(out.into_bytes())
    }
}

/// Attributes are collected first so the `attributes_count` prefix is known.
#[derive(Default)]
struct AttributeList {
    count: usize,
    bytes: Writer,
}

impl AttributeList {
    fn push(
        &mut self,
        cp: &mut ConstantPoolBuilder,
        name: &str,
        write: impl FnOnce(&mut Writer, &mut ConstantPoolBuilder) -> Result<()>,
    ) -> Result<()> {
        let mut info = Writer::new();
        write(&mut info, cp)?;
        let len = u32::try_from(info.len()).map_err(|_| Error::TooLarge("attribute"))?;
        self.bytes.u2(cp.utf8(name)?);
        self.bytes.u4(len);
        self.bytes.bytes(&info.into_bytes());
        self.count += 1;
        Ok(())
    }

    fn write(self, out: &mut Writer) -> Result<()> {
        out.len_u2(self.count, "attributes")?;
        out.bytes(&self.bytes.into_bytes());
        Ok(())
    }
}

fn write_annotation_attributes(
    attrs: &mut AttributeList,
    cp: &mut ConstantPoolBuilder,
    visible: &[Annotation],
    invisible: &[Annotation],
) -> Result<()> {
    for (name, list) in [
        ("RuntimeVisibleAnnotations", visible),
        ("RuntimeInvisibleAnnotations", invisible),
    ] {
        if list.is_empty() {
            continue;
        }
        attrs.push(cp, name, |w, cp| {
            w.len_u2(list.len(), name)?;
            for ann in list {
                ann.write(w, cp)?;
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn write_parameter_annotations(
    attrs: &mut AttributeList,
    cp: &mut ConstantPoolBuilder,
    name: &'static str,
    params: &[Vec<Annotation>],
) -> Result<()> {
    if params.iter().all(Vec::is_empty) {
        return Ok(());
    }
    let count = u8::try_from(params.len()).map_err(|_| Error::TooLarge(name))?;
    attrs.push(cp, name, |w, cp| {
        w.u1(count);
        for anns in params {
            w.len_u2(anns.len(), name)?;
            for ann in anns {
                ann.write(w, cp)?;
            }
        }
        Ok(())
    })
}

fn write_member(
    out: &mut Writer,
    cp: &mut ConstantPoolBuilder,
    member: &ClassMember,
    is_method: bool,
) -> Result<()> {
    out.u2(member.access_flags);
    out.u2(cp.utf8(&member.name)?);
    out.u2(cp.utf8(&member.descriptor)?);

    let mut attrs = AttributeList::default();
    if is_method {
        if let Some(stub) = &member.body {
            attrs.push(cp, "Code", |w, cp| write_stub_code(w, cp, member, stub))?;
        }
        if !member.exceptions.is_empty() {
            attrs.push(cp, "Exceptions", |w, cp| {
                w.len_u2(member.exceptions.len(), "Exceptions")?;
                for exception in &member.exceptions {
                    w.u2(cp.class(exception)?);
                }
                Ok(())
            })?;
        }
        if !member.parameters.is_empty() {
            let count = u8::try_from(member.parameters.len())
                .map_err(|_| Error::TooLarge("MethodParameters"))?;
            attrs.push(cp, "MethodParameters", |w, cp| {
                w.u1(count);
                for param in &member.parameters {
                    match &param.name {
                        Some(name) => w.u2(cp.utf8(name)?),
                        None => w.u2(0),
                    }
                    w.u2(param.access_flags);
                }
                Ok(())
            })?;
        }
        if let Some(default) = &member.annotation_default {
            attrs.push(cp, "AnnotationDefault", |w, cp| default.write(w, cp))?;
        }
    }
    if let Some(value) = &member.constant_value {
        attrs.push(cp, "ConstantValue", |w, cp| {
            let index = match value {
                ConstValue::Byte(v) => cp.integer(*v as i32)?,
                ConstValue::Char(v) => cp.integer(*v as i32)?,
                ConstValue::Short(v) => cp.integer(*v as i32)?,
                ConstValue::Int(v) => cp.integer(*v)?,
                ConstValue::Boolean(v) => cp.integer(*v as i32)?,
                ConstValue::Long(v) => cp.long(*v)?,
                ConstValue::Float(v) => cp.float(*v)?,
                ConstValue::Double(v) => cp.double(*v)?,
                ConstValue::String(v) => cp.string(v)?,
            };
            w.u2(index);
            Ok(())
        })?;
    }
    if let Some(sig) = &member.signature {
        attrs.push(cp, "Signature", |w, cp| {
            w.u2(cp.utf8(sig)?);
            Ok(())
        })?;
    }
    write_annotation_attributes(
        &mut attrs,
        cp,
        &member.runtime_visible_annotations,
        &member.runtime_invisible_annotations,
    )?;
    write_parameter_annotations(
        &mut attrs,
        cp,
        "RuntimeVisibleParameterAnnotations",
        &member.runtime_visible_parameter_annotations,
    )?;
    write_parameter_annotations(
        &mut attrs,
        cp,
        "RuntimeInvisibleParameterAnnotations",
        &member.runtime_invisible_parameter_annotations,
    )?;
    attrs.write(out)
}

fn write_stub_code(
    w: &mut Writer,
    cp: &mut ConstantPoolBuilder,
    member: &ClassMember,
    stub: &StubBody,
) -> Result<()> {
    let descriptor = parse_method_descriptor(&member.descriptor)?;
    let receiver = if member.access_flags & ACC_STATIC != 0 { 0 } else { 1 };
    let max_locals = descriptor
        .parameter_slots()
        .checked_add(receiver)
        .ok_or(Error::TooLarge("max_locals"))?;

    let class = cp.class(&stub.exception)?;
    let message = cp.string(&stub.message)?;
    let init = cp.method_ref(&stub.exception, "<init>", "(Ljava/lang/String;)V")?;

    let mut code = Writer::new();
    code.u1(OP_NEW);
    code.u2(class);
    code.u1(OP_DUP);
    code.u1(OP_LDC_W);
    code.u2(message);
    code.u1(OP_INVOKESPECIAL);
    code.u2(init);
    code.u1(OP_ATHROW);
    let code = code.into_bytes();

    // new + dup + message
    w.u2(3);
    w.u2(max_locals);
    w.u4(code.len() as u32);
    w.bytes(&code);
    // exception_table_length, attributes_count
    w.u2(0);
    w.u2(0);
    Ok(())
}
