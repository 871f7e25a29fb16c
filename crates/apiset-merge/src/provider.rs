//! Version lookups over a superset.
//!
//! Tools that check code against the superset only need to ask "in which versions does this
//! entity exist". The answer can come from an in-memory [`Superset`] or from class files
//! previously written by the codec.

use std::collections::HashMap;

use apiset_classfile::{Annotation, ClassFile, ConstValue, ElementValue};

use crate::codec::{EXISTS_IN, MANGLED_NAME};
use crate::error::CodecError;
use crate::model::{member_key, MethodSlot};
use crate::superset::Superset;
use crate::version::{plus_opt, Version, VersionLoader};

pub trait VersionInfoProvider<V> {
    fn for_class(&self, name: &str) -> Option<V>;

    fn for_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<V>;

    fn for_field(&self, owner: &str, name: &str, descriptor: &str) -> Option<V>;
}

/// A reference made from code that exists in `scope` to an entity existing in `target` is sound
/// only if the target exists everywhere the referencing code does.
///
/// Entities the provider knows nothing about are outside the superset and always allowed.
pub fn is_reference_allowed<V: Version>(target: Option<&V>, scope: &V) -> bool {
    target.map_or(true, |target| target.contains(scope))
}

impl<V: Version> VersionInfoProvider<V> for Superset<V> {
    fn for_class(&self, name: &str) -> Option<V> {
        self.get(name).map(|class| class.version.clone())
    }

    fn for_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<V> {
        let class = self.get(owner)?;
        let slot = class.method(name, descriptor)?;
        let versions = match slot {
            MethodSlot::Single(method) => vec![method.version.as_ref()],
            MethodSlot::Group(variants) => variants.iter().map(|m| m.version.as_ref()).collect(),
        };
        versions
            .into_iter()
            .map(|version| version.unwrap_or(&class.version))
            .fold(None, |acc, version| plus_opt(acc.as_ref(), Some(version)))
    }

    fn for_field(&self, owner: &str, name: &str, descriptor: &str) -> Option<V> {
        let class = self.get(owner)?;
        let field = class.field(name, descriptor)?;
        Some(field.version.clone().unwrap_or_else(|| class.version.clone()))
    }
}

/// Version information read back from emitted class files.
#[derive(Debug)]
pub struct ClassReadVersionInfo<V> {
    classes: HashMap<String, V>,
    methods: HashMap<String, V>,
    fields: HashMap<String, V>,
}

impl<V> Default for ClassReadVersionInfo<V> {
    fn default() -> Self {
        Self {
            classes: HashMap::new(),
            methods: HashMap::new(),
            fields: HashMap::new(),
        }
    }
}

fn string_element<'a>(annotation: &'a Annotation, name: &str) -> Option<&'a str> {
    match annotation.element(name)? {
        ElementValue::Const(ConstValue::String(value)) => Some(value),
        _ => None,
    }
}

fn find<'a>(
    mut annotations: impl Iterator<Item = &'a Annotation>,
    desc: &str,
) -> Option<&'a Annotation> {
    annotations.find(|annotation| annotation.type_descriptor == desc)
}

fn read_version<'a, V>(
    annotations: impl Iterator<Item = &'a Annotation>,
    loader: &impl VersionLoader<V>,
) -> Option<V> {
    find(annotations, EXISTS_IN)
        .and_then(|a| string_element(a, "version"))
        .map(|literal| loader.load(literal))
}

fn member_path(owner: &str, name: &str, descriptor: &str) -> String {
    format!("{owner}.{}", member_key(name, descriptor))
}

impl<V: Version> ClassReadVersionInfo<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class_bytes(
        &mut self,
        bytes: &[u8],
        loader: &impl VersionLoader<V>,
    ) -> Result<(), CodecError> {
        let class = ClassFile::parse(bytes)?;
        self.add_class_file(&class, loader);
        Ok(())
    }

    /// Classes without version metadata are skipped. Members without their own metadata inherit
    /// the class version; grouped method variants are recorded under their original name.
    pub fn add_class_file(&mut self, class: &ClassFile, loader: &impl VersionLoader<V>) {
        let Some(class_version) = read_version(class.annotations(), loader) else {
            return;
        };

        for field in &class.fields {
            let version = read_version(field.annotations(), loader)
                .unwrap_or_else(|| class_version.clone());
            self.fields
                .insert(member_path(&class.this_class, &field.name, &field.descriptor), version);
        }
        for method in &class.methods {
            let version = read_version(method.annotations(), loader)
                .unwrap_or_else(|| class_version.clone());
            let name = find(method.annotations(), MANGLED_NAME)
                .and_then(|a| string_element(a, "original"))
                .unwrap_or(&method.name);
            let path = member_path(&class.this_class, name, &method.descriptor);
            if let Some(joined) = plus_opt(self.methods.get(&path), Some(&version)) {
                self.methods.insert(path, joined);
            }
        }
        self.classes.insert(class.this_class.clone(), class_version);
    }
}

impl<V: Version> VersionInfoProvider<V> for ClassReadVersionInfo<V> {
    fn for_class(&self, name: &str) -> Option<V> {
        self.classes.get(name).cloned()
    }

    fn for_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<V> {
        self.methods.get(&member_path(owner, name, descriptor)).cloned()
    }

    fn for_field(&self, owner: &str, name: &str, descriptor: &str) -> Option<V> {
        self.fields.get(&member_path(owner, name, descriptor)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{ACC_PUBLIC, ACC_STATIC};
    use crate::codec::{to_class_file, EncodeOptions};
    use crate::model::{ClassEntry, MethodEntry};
    use crate::version::{TagSet, TagSetLoader};
    use pretty_assertions::assert_eq;

    fn superset() -> Superset<TagSet> {
        let mut superset = Superset::default();
        for tag in ["1", "2"] {
            let version = TagSet::single(tag);
            let mut class = ClassEntry::new(ACC_PUBLIC, "p/A", version.clone());
            let mut method = MethodEntry::new(ACC_PUBLIC, "m", "()V");
            if tag == "2" {
                method.access.0 |= ACC_STATIC;
            }
            method.version = Some(version.clone());
            class.methods.insert(method.key(), MethodSlot::Single(method));
            if tag == "2" {
                let mut added = MethodEntry::new(ACC_PUBLIC, "added", "()V");
                added.version = Some(version);
                class.methods.insert(added.key(), MethodSlot::Single(added));
            }
            superset.append(class);
        }
        superset.cleanup_versions();
        superset
    }

    #[test]
    fn superset_answers_member_versions() {
        let superset = superset();
        assert_eq!(superset.for_class("p/A"), Some(TagSet::of(["1", "2"])));
        assert_eq!(superset.for_method("p/A", "added", "()V"), Some(TagSet::single("2")));
        assert_eq!(superset.for_method("p/A", "m", "()V"), Some(TagSet::of(["1", "2"])));
        assert_eq!(superset.for_method("p/A", "gone", "()V"), None);
    }

    #[test]
    fn emitted_classes_answer_the_same() {
        let superset = superset();
        let mut info = ClassReadVersionInfo::new();
        for class in superset.classes() {
            let bytes = to_class_file(class, &EncodeOptions::default()).to_bytes().unwrap();
            info.add_class_bytes(&bytes, &TagSetLoader).unwrap();
        }
        assert_eq!(info.for_class("p/A"), superset.for_class("p/A"));
        assert_eq!(info.for_method("p/A", "added", "()V"), Some(TagSet::single("2")));
        assert_eq!(info.for_method("p/A", "m", "()V"), Some(TagSet::of(["1", "2"])));
    }

    #[test]
    fn references_must_cover_their_scope() {
        let both = TagSet::of(["1", "2"]);
        let one = TagSet::single("1");
        assert!(is_reference_allowed(Some(&both), &one));
        assert!(!is_reference_allowed(Some(&one), &both));
        assert!(is_reference_allowed(None, &both));
    }
}
