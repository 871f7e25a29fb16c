#![forbid(unsafe_code)]

mod annotation;
mod classfile;
mod constant_pool;
mod descriptor;
mod error;
mod reader;
mod signature;
mod writer;

pub use crate::annotation::{descriptor_to_internal_name, Annotation, ConstValue, ElementValue};
pub use crate::classfile::{
    ClassFile, ClassMember, EnclosingMethod, InnerClassInfo, MethodParameter, StubBody,
    CLASSFILE_MAGIC,
};
pub use crate::descriptor::{parse_field_descriptor, parse_method_descriptor};
pub use crate::descriptor::{BaseType, FieldType, MethodDescriptor, ReturnType};
pub use crate::error::{Error, Result};
pub use crate::signature::{
    parse_class_signature, parse_field_signature, parse_method_signature, ClassSignature,
    ClassTypeSegment, ClassTypeSignature, FieldTypeSignature, MethodSignature, TypeArgument,
    TypeParameter, TypeSignature,
};
