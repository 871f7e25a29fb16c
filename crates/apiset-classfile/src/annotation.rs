use crate::constant_pool::{ConstantPool, ConstantPoolBuilder, CpInfo};
use crate::error::{Error, Result};
use crate::reader::{Reader, Writer};

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub type_descriptor: String,
    pub type_internal_name: Option<String>,
    pub elements: Vec<(String, ElementValue)>,
}

impl Annotation {
    pub fn new(type_descriptor: impl Into<String>, elements: Vec<(String, ElementValue)>) -> Self {
        let type_descriptor = type_descriptor.into();
        let type_internal_name = descriptor_to_internal_name(&type_descriptor);
        Self {
            type_descriptor,
            type_internal_name,
            elements,
        }
    }

    /// Looks up the value of the element called `name`.
    pub fn element(&self, name: &str) -> Option<&ElementValue> {
        self.elements
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub(crate) fn write(&self, out: &mut Writer, cp: &mut ConstantPoolBuilder) -> Result<()> {
        out.u2(cp.utf8(&self.type_descriptor)?);
        out.len_u2(self.elements.len(), "annotation elements")?;
        for (name, value) in &self.elements {
            out.u2(cp.utf8(name)?);
            value.write(out, cp)?;
        }
        Ok(())
    }

    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let type_descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
        let count = reader.read_u2()?;
        let mut elements = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = cp.get_utf8(reader.read_u2()?)?.to_string();
            elements.push((name, ElementValue::parse(reader, cp)?));
        }
        Ok(Self::new(type_descriptor, elements))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    Const(ConstValue),
    Enum {
        type_descriptor: String,
        const_name: String,
    },
    Class(String),
    Annotation(Box<Annotation>),
    Array(Vec<ElementValue>),
}

impl ElementValue {
    pub(crate) fn write(&self, out: &mut Writer, cp: &mut ConstantPoolBuilder) -> Result<()> {
        match self {
            ElementValue::Const(value) => {
                let (tag, index) = match value {
                    ConstValue::Byte(v) => ('B', cp.integer(*v as i32)?),
                    ConstValue::Char(v) => ('C', cp.integer(*v as i32)?),
                    ConstValue::Short(v) => ('S', cp.integer(*v as i32)?),
                    ConstValue::Int(v) => ('I', cp.integer(*v)?),
                    ConstValue::Boolean(v) => ('Z', cp.integer(*v as i32)?),
                    ConstValue::Long(v) => ('J', cp.long(*v)?),
                    ConstValue::Float(v) => ('F', cp.float(*v)?),
                    ConstValue::Double(v) => ('D', cp.double(*v)?),
                    ConstValue::String(v) => ('s', cp.utf8(v)?),
                };
                out.u1(tag as u8);
                out.u2(index);
            }
            ElementValue::Enum {
                type_descriptor,
                const_name,
            } => {
                out.u1(b'e');
                out.u2(cp.utf8(type_descriptor)?);
                out.u2(cp.utf8(const_name)?);
            }
            ElementValue::Class(descriptor) => {
                out.u1(b'c');
                out.u2(cp.utf8(descriptor)?);
            }
            ElementValue::Annotation(annotation) => {
                out.u1(b'@');
                annotation.write(out, cp)?;
            }
            ElementValue::Array(values) => {
                out.u1(b'[');
                out.len_u2(values.len(), "annotation array")?;
                for value in values {
                    value.write(out, cp)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn parse(reader: &mut Reader<'_>, cp: &ConstantPool) -> Result<Self> {
        let tag = reader.read_u1()?;
        Ok(match tag {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
                ElementValue::Const(read_const(tag, reader.read_u2()?, cp)?)
            }
            b'e' => {
                let type_descriptor = cp.get_utf8(reader.read_u2()?)?.to_string();
                let const_name = cp.get_utf8(reader.read_u2()?)?.to_string();
                ElementValue::Enum {
                    type_descriptor,
                    const_name,
                }
            }
            b'c' => ElementValue::Class(cp.get_utf8(reader.read_u2()?)?.to_string()),
            b'@' => ElementValue::Annotation(Box::new(Annotation::parse(reader, cp)?)),
            b'[' => {
                let count = reader.read_u2()?;
                let values = (0..count)
                    .map(|_| ElementValue::parse(reader, cp))
                    .collect::<Result<Vec<_>>>()?;
                ElementValue::Array(values)
            }
            _ => return Err(Error::MalformedAttribute("element_value tag")),
        })
    }
}

/// Reads the constant an element value of type `tag` points at.
fn read_const(tag: u8, index: u16, cp: &ConstantPool) -> Result<ConstValue> {
    if tag == b's' {
        return Ok(ConstValue::String(cp.get_utf8(index)?.to_string()));
    }
    Ok(match (tag, cp.get(index)?) {
        (b'B', CpInfo::Integer(v)) => ConstValue::Byte(*v as i8),
        (b'S', CpInfo::Integer(v)) => ConstValue::Short(*v as i16),
        (b'I', CpInfo::Integer(v)) => ConstValue::Int(*v),
        (b'Z', CpInfo::Integer(v)) => ConstValue::Boolean(*v != 0),
        (b'C', CpInfo::Integer(v)) => ConstValue::Char(
            char::from_u32(*v as u32).ok_or(Error::MalformedAttribute("char element value"))?,
        ),
        (b'J', CpInfo::Long(v)) => ConstValue::Long(*v),
        (b'F', CpInfo::Float(v)) => ConstValue::Float(*v),
        (b'D', CpInfo::Double(v)) => ConstValue::Double(*v),
        (_, other) => {
            return Err(Error::ConstantPoolTypeMismatch {
                index,
                expected: match tag {
                    b'J' => "Long",
                    b'F' => "Float",
                    b'D' => "Double",
                    _ => "Integer",
                },
                found: other.kind(),
            })
        }
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
}

pub fn descriptor_to_internal_name(desc: &str) -> Option<String> {
    desc.strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .map(|name| name.to_string())
}

