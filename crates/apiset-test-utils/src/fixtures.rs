use apiset_classfile::{Annotation, ClassFile, ClassMember, EnclosingMethod, InnerClassInfo};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;

/// Builder for in-memory class files.
///
/// ```
/// use apiset_test_utils::ClassFixture;
///
/// let class = ClassFixture::class("p/A")
///     .method(0x0001, "run", "()V")
///     .field(0x0001, "size", "I")
///     .build();
/// assert_eq!(class.methods.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ClassFixture {
    class: ClassFile,
}

impl ClassFixture {
    /// A public class extending `java/lang/Object`.
    pub fn class(name: &str) -> Self {
        Self {
            class: ClassFile::new(ACC_PUBLIC, name),
        }
    }

    pub fn interface(name: &str) -> Self {
        Self {
            class: ClassFile::new(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT, name),
        }
    }

    pub fn access(mut self, access_flags: u16) -> Self {
        self.class.access_flags = access_flags;
        self
    }

    pub fn extends(mut self, super_class: &str) -> Self {
        self.class.super_class = Some(super_class.to_string());
        self
    }

    pub fn signature(mut self, signature: &str) -> Self {
        self.class.signature = Some(signature.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.class.interfaces.push(interface.to_string());
        self
    }

    pub fn method(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.class
            .methods
            .push(ClassMember::new(access_flags, name, descriptor));
        self
    }

    pub fn generic_method(
        mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        signature: &str,
    ) -> Self {
        let mut method = ClassMember::new(access_flags, name, descriptor);
        method.signature = Some(signature.to_string());
        self.class.methods.push(method);
        self
    }

    /// Adds a fully configured member to the method table.
    pub fn member(mut self, method: ClassMember) -> Self {
        self.class.methods.push(method);
        self
    }

    pub fn field(mut self, access_flags: u16, name: &str, descriptor: &str) -> Self {
        self.class
            .fields
            .push(ClassMember::new(access_flags, name, descriptor));
        self
    }

    /// Adds an invisible marker annotation without elements.
    pub fn annotation(mut self, type_descriptor: &str) -> Self {
        self.class
            .runtime_invisible_annotations
            .push(Annotation::new(type_descriptor, Vec::new()));
        self
    }

    pub fn inner_class(mut self, inner: &str, outer: &str, simple_name: &str, access_flags: u16) -> Self {
        self.class.inner_classes.push(InnerClassInfo {
            inner_class: inner.to_string(),
            outer_class: Some(outer.to_string()),
            inner_name: Some(simple_name.to_string()),
            access_flags,
        });
        self
    }

    /// Marks the class as local to `owner`.
    pub fn enclosed_by(mut self, owner: &str) -> Self {
        self.class.enclosing_method = Some(EnclosingMethod {
            class: owner.to_string(),
            method_name: None,
            method_descriptor: None,
        });
        self
    }

    pub fn build(self) -> ClassFile {
        self.class
    }

    pub fn bytes(self) -> Vec<u8> {
        let name = self.class.this_class.clone();
        self.class
            .to_bytes()
            .unwrap_or_else(|err| panic!("failed to serialize fixture {name}: {err}"))
    }
}
