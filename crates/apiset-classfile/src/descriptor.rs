use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    const ALL: [BaseType; 8] = [
        BaseType::Byte,
        BaseType::Char,
        BaseType::Double,
        BaseType::Float,
        BaseType::Int,
        BaseType::Long,
        BaseType::Short,
        BaseType::Boolean,
    ];

    pub fn from_descriptor_char(c: char) -> Option<Self> {
        Self::ALL.into_iter().find(|base| base.descriptor_char() == c)
    }

    pub fn descriptor_char(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    /// Local variable slots taken by a value of this type.
    pub fn slot_size(self) -> u16 {
        match self {
            BaseType::Long | BaseType::Double => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Base(BaseType),
    Object(String),
    Array(Box<FieldType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    Void,
    Type(FieldType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<FieldType>,
    pub return_type: ReturnType,
}

impl FieldType {
    pub fn slot_size(&self) -> u16 {
        match self {
            FieldType::Base(base) => base.slot_size(),
            FieldType::Object(_) | FieldType::Array(_) => 1,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Base(base) => write!(f, "{}", base.descriptor_char()),
            FieldType::Object(name) => write!(f, "L{name};"),
            FieldType::Array(component) => write!(f, "[{component}"),
        }
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => f.write_str("V"),
            ReturnType::Type(ty) => ty.fmt(f),
        }
    }
}

impl MethodDescriptor {
    /// Local variable slots taken by the parameters (receiver excluded).
    pub fn parameter_slots(&self) -> u16 {
        self.params.iter().map(FieldType::slot_size).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            param.fmt(f)?;
        }
        f.write_str(")")?;
        self.return_type.fmt(f)
    }
}

fn invalid(desc: &str) -> Error {
    Error::InvalidDescriptor(desc.to_string())
}

/// Splits one field type off the front of `input`.
fn split_field_type(input: &str) -> Option<(FieldType, &str)> {
    let mut chars = input.chars();
    let tag = chars.next()?;
    let rest = chars.as_str();
    match tag {
        'L' => {
            let (name, rest) = rest.split_once(';')?;
            (!name.is_empty()).then(|| (FieldType::Object(name.to_string()), rest))
        }
        '[' => {
            let (component, rest) = split_field_type(rest)?;
            Some((FieldType::Array(Box::new(component)), rest))
        }
        _ => BaseType::from_descriptor_char(tag).map(|base| (FieldType::Base(base), rest)),
    }
}

pub fn parse_field_descriptor(desc: &str) -> Result<FieldType> {
    match split_field_type(desc) {
        Some((ty, "")) => Ok(ty),
        _ => Err(invalid(desc)),
    }
}

pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor> {
    let mut rest = desc.strip_prefix('(').ok_or_else(|| invalid(desc))?;
    let mut params = Vec::new();
    let return_part = loop {
        if let Some(tail) = rest.strip_prefix(')') {
            break tail;
        }
        let (param, tail) = split_field_type(rest).ok_or_else(|| invalid(desc))?;
        params.push(param);
        rest = tail;
    };

    let return_type = match return_part {
        "V" => ReturnType::Void,
        _ => ReturnType::Type(parse_field_descriptor(return_part).map_err(|_| invalid(desc))?),
    };
    Ok(MethodDescriptor { params, return_type })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_field_descriptor_primitives_and_arrays() {
        assert_eq!(parse_field_descriptor("I").unwrap(), FieldType::Base(BaseType::Int));
        assert_eq!(
            parse_field_descriptor("[[Ljava/lang/String;").unwrap(),
            FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Object(
                "java/lang/String".to_string()
            )))))
        );
    }

    #[test]
    fn parse_method_descriptor_basic() {
        let desc = parse_method_descriptor("(ILjava/lang/String;)[I").unwrap();
        assert_eq!(
            desc.params,
            vec![
                FieldType::Base(BaseType::Int),
                FieldType::Object("java/lang/String".to_string())
            ]
        );
        assert_eq!(
            desc.return_type,
            ReturnType::Type(FieldType::Array(Box::new(FieldType::Base(BaseType::Int))))
        );
    }

    #[test]
    fn descriptors_print_back_to_their_source() {
        for text in ["(ILjava/lang/String;)[I", "()V", "([[JD)Ljava/util/List;"] {
            assert_eq!(parse_method_descriptor(text).unwrap().to_string(), text);
        }
        assert_eq!(parse_method_descriptor("(JIZ)V").unwrap().parameter_slots(), 4);
    }

    #[test]
    fn rejects_truncated_descriptors() {
        assert!(parse_field_descriptor("Ljava/lang/String").is_err());
        assert!(parse_method_descriptor("(I").is_err());
        assert!(parse_method_descriptor("I)V").is_err());
        assert!(parse_method_descriptor("()").is_err());
        assert!(parse_field_descriptor("L;").is_err());
    }
}
