use std::fmt;

use crate::descriptor::BaseType;
use crate::error::{Error, Result};

/// A reference or primitive type as written in a `Signature` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSignature {
    Base(BaseType),
    Array(Box<TypeSignature>),
    Class(ClassTypeSignature),
    TypeVariable(String),
}

/// Field signatures are plain type signatures; the alias keeps call sites self-describing.
pub type FieldTypeSignature = TypeSignature;

/// `Lpkg/Outer<A>.Inner<B>;`
///
/// The first segment carries the full internal name of the outermost class; each following
/// segment is the simple name of a nested class with its own type arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassTypeSignature {
    pub segments: Vec<ClassTypeSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassTypeSegment {
    pub name: String,
    pub type_arguments: Vec<TypeArgument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeArgument {
    /// `*`
    Any,
    Exact(Box<TypeSignature>),
    /// `+T`
    Extends(Box<TypeSignature>),
    /// `-T`
    Super(Box<TypeSignature>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParameter {
    pub name: String,
    pub class_bound: Option<TypeSignature>,
    pub interface_bounds: Vec<TypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub super_class: ClassTypeSignature,
    pub interfaces: Vec<ClassTypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<TypeSignature>,
    /// `None` for `V`.
    pub return_type: Option<TypeSignature>,
    pub throws: Vec<TypeSignature>,
}

impl ClassTypeSignature {
    pub fn simple(internal_name: impl Into<String>) -> Self {
        Self {
            segments: vec![ClassTypeSegment {
                name: internal_name.into(),
                type_arguments: Vec::new(),
            }],
        }
    }

    /// Internal name of the outermost class (`java/util/Map` for `Map.Entry`).
    pub fn outer_name(&self) -> &str {
        self.segments.first().map(|s| s.name.as_str()).unwrap_or("")
    }

    /// Binary internal name of the denoted class, nested segments joined with `$`.
    pub fn internal_name(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('$');
            }
            out.push_str(&seg.name);
        }
        out
    }
}

pub fn parse_class_signature(sig: &str) -> Result<ClassSignature> {
    let mut p = Parser::new(sig);
    let type_parameters = p.type_parameters()?;
    let super_class = p.class_type()?;
    let mut interfaces = Vec::new();
    while !p.at_end() {
        interfaces.push(p.class_type()?);
    }
    Ok(ClassSignature {
        type_parameters,
        super_class,
        interfaces,
    })
}

pub fn parse_method_signature(sig: &str) -> Result<MethodSignature> {
    let mut p = Parser::new(sig);
    let type_parameters = p.type_parameters()?;
    p.expect(b'(')?;
    let mut parameters = Vec::new();
    while p.peek()? != b')' {
        parameters.push(p.java_type()?);
    }
    p.expect(b')')?;
    let return_type = if p.peek()? == b'V' {
        p.bump();
        None
    } else {
        Some(p.java_type()?)
    };
    let mut throws = Vec::new();
    while !p.at_end() {
        p.expect(b'^')?;
        throws.push(p.reference_type()?);
    }
    Ok(MethodSignature {
        type_parameters,
        parameters,
        return_type,
        throws,
    })
}

pub fn parse_field_signature(sig: &str) -> Result<FieldTypeSignature> {
    let mut p = Parser::new(sig);
    let ty = p.reference_type()?;
    if !p.at_end() {
        return Err(p.error());
    }
    Ok(ty)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self) -> Error {
        Error::InvalidSignature(self.input.to_string())
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Result<u8> {
        self.input
            .as_bytes()
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error())
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn expect(&mut self, b: u8) -> Result<()> {
        if self.peek()? != b {
            return Err(self.error());
        }
        self.bump();
        Ok(())
    }

    fn identifier(&mut self, stop: &[u8]) -> Result<&'a str> {
        let start = self.pos;
        while let Some(&b) = self.input.as_bytes().get(self.pos) {
            if stop.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start || self.at_end() {
            return Err(self.error());
        }
        Ok(&self.input[start..self.pos])
    }

    fn type_parameters(&mut self) -> Result<Vec<TypeParameter>> {
        let mut params = Vec::new();
        if self.at_end() || self.peek()? != b'<' {
            return Ok(params);
        }
        self.bump();
        while self.peek()? != b'>' {
            let name = self.identifier(b":")?.to_string();
            self.expect(b':')?;
            let class_bound = match self.peek()? {
                b':' => None,
                _ => Some(self.reference_type()?),
            };
            let mut interface_bounds = Vec::new();
            while self.peek()? == b':' {
                self.bump();
                interface_bounds.push(self.reference_type()?);
            }
            params.push(TypeParameter {
                name,
                class_bound,
                interface_bounds,
            });
        }
        self.bump();
        if params.is_empty() {
            return Err(self.error());
        }
        Ok(params)
    }

    fn java_type(&mut self) -> Result<TypeSignature> {
        let b = self.peek()?;
        if let Some(base) = BaseType::from_descriptor_char(b as char) {
            self.bump();
            return Ok(TypeSignature::Base(base));
        }
        self.reference_type()
    }

    fn reference_type(&mut self) -> Result<TypeSignature> {
        match self.peek()? {
            b'L' => Ok(TypeSignature::Class(self.class_type()?)),
            b'T' => {
                self.bump();
                let name = self.identifier(b";")?.to_string();
                self.expect(b';')?;
                Ok(TypeSignature::TypeVariable(name))
            }
            b'[' => {
                self.bump();
                Ok(TypeSignature::Array(Box::new(self.java_type()?)))
            }
            _ => Err(self.error()),
        }
    }

    fn class_type(&mut self) -> Result<ClassTypeSignature> {
        self.expect(b'L')?;
        let mut segments = Vec::new();
        loop {
            let name = self.identifier(b"<.;")?.to_string();
            let type_arguments = self.type_arguments()?;
            segments.push(ClassTypeSegment {
                name,
                type_arguments,
            });
            match self.peek()? {
                b'.' => self.bump(),
                b';' => {
                    self.bump();
                    break;
                }
                _ => return Err(self.error()),
            }
        }
        Ok(ClassTypeSignature { segments })
    }

    fn type_arguments(&mut self) -> Result<Vec<TypeArgument>> {
        let mut args = Vec::new();
        if self.peek()? != b'<' {
            return Ok(args);
        }
        self.bump();
        while self.peek()? != b'>' {
            let arg = match self.peek()? {
                b'*' => {
                    self.bump();
                    TypeArgument::Any
                }
                b'+' => {
                    self.bump();
                    TypeArgument::Extends(Box::new(self.reference_type()?))
                }
                b'-' => {
                    self.bump();
                    TypeArgument::Super(Box::new(self.reference_type()?))
                }
                _ => TypeArgument::Exact(Box::new(self.reference_type()?)),
            };
            args.push(arg);
        }
        self.bump();
        if args.is_empty() {
            return Err(self.error());
        }
        Ok(args)
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Base(base) => write!(f, "{}", base.descriptor_char()),
            TypeSignature::Array(component) => write!(f, "[{component}"),
            TypeSignature::Class(class) => class.fmt(f),
            TypeSignature::TypeVariable(name) => write!(f, "T{name};"),
        }
    }
}

impl fmt::Display for ClassTypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("L")?;
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&seg.name)?;
            if !seg.type_arguments.is_empty() {
                f.write_str("<")?;
                for arg in &seg.type_arguments {
                    arg.fmt(f)?;
                }
                f.write_str(">")?;
            }
        }
        f.write_str(";")
    }
}

impl fmt::Display for TypeArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArgument::Any => f.write_str("*"),
            TypeArgument::Exact(ty) => ty.fmt(f),
            TypeArgument::Extends(ty) => write!(f, "+{ty}"),
            TypeArgument::Super(ty) => write!(f, "-{ty}"),
        }
    }
}

fn write_type_parameters(f: &mut fmt::Formatter<'_>, params: &[TypeParameter]) -> fmt::Result {
    if params.is_empty() {
        return Ok(());
    }
    f.write_str("<")?;
    for param in params {
        write!(f, "{}:", param.name)?;
        if let Some(bound) = &param.class_bound {
            fmt::Display::fmt(bound, f)?;
        }
        for bound in &param.interface_bounds {
            write!(f, ":{bound}")?;
        }
    }
    f.write_str(">")
}

impl fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type_parameters(f, &self.type_parameters)?;
        self.super_class.fmt(f)?;
        for iface in &self.interfaces {
            iface.fmt(f)?;
        }
        Ok(())
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type_parameters(f, &self.type_parameters)?;
        f.write_str("(")?;
        for param in &self.parameters {
            param.fmt(f)?;
        }
        f.write_str(")")?;
        match &self.return_type {
            Some(ty) => ty.fmt(f)?,
            None => f.write_str("V")?,
        }
        for ty in &self.throws {
            write!(f, "^{ty}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn class_signature_with_bounds_and_interfaces() {
        let text = "<T:Ljava/lang/Object;:Ljava/lang/Comparable<TT;>;>Ljava/lang/Object;Ljava/io/Serializable;";
        let sig = parse_class_signature(text).unwrap();
        assert_eq!(sig.type_parameters.len(), 1);
        let t = &sig.type_parameters[0];
        assert_eq!(t.name, "T");
        assert_eq!(
            t.class_bound,
            Some(TypeSignature::Class(ClassTypeSignature::simple("java/lang/Object")))
        );
        assert_eq!(t.interface_bounds.len(), 1);
        assert_eq!(sig.interfaces[0].internal_name(), "java/io/Serializable");
        assert_eq!(sig.to_string(), text);
    }

    #[test]
    fn interface_only_bound_has_no_class_bound() {
        let sig = parse_class_signature("<T::Ljava/io/Serializable;>Ljava/lang/Object;").unwrap();
        assert_eq!(sig.type_parameters[0].class_bound, None);
        assert_eq!(
            sig.to_string(),
            "<T::Ljava/io/Serializable;>Ljava/lang/Object;"
        );
    }

    #[test]
    fn method_signature_with_wildcards_and_throws() {
        let text = "<E:Ljava/lang/Exception;>(Ljava/util/List<+Ljava/lang/Number;>;[I*)V^TE;";
        assert!(parse_method_signature(text).is_err());

        let text = "<E:Ljava/lang/Exception;>(Ljava/util/List<+Ljava/lang/Number;>;[ILjava/util/Map<*-TE;>;)V^TE;^Ljava/io/IOException;";
        let sig = parse_method_signature(text).unwrap();
        assert_eq!(sig.parameters.len(), 3);
        assert_eq!(sig.return_type, None);
        assert_eq!(sig.throws.len(), 2);
        assert_eq!(sig.to_string(), text);
    }

    #[test]
    fn nested_generic_class_types_keep_segment_arguments() {
        let text = "Lp/Outer<Ljava/lang/String;>.Inner<TT;>;";
        let ty = parse_field_signature(text).unwrap();
        let TypeSignature::Class(class) = &ty else {
            panic!("expected class type, got {ty:?}");
        };
        assert_eq!(class.segments.len(), 2);
        assert_eq!(class.outer_name(), "p/Outer");
        assert_eq!(class.internal_name(), "p/Outer$Inner");
        assert_eq!(ty.to_string(), text);
    }

    #[test]
    fn rejects_malformed_signatures() {
        assert!(parse_field_signature("Ljava/util/List<>;").is_err());
        assert!(parse_field_signature("Ljava/util/List").is_err());
        assert!(parse_method_signature("(I").is_err());
        assert!(parse_class_signature("<>Ljava/lang/Object;").is_err());
    }
}
