//! In-memory form of one class across versions.
//!
//! A freshly decoded [`ClassEntry`] describes a single snapshot; after merging it describes the
//! union of every snapshot fed to the superset, with each entity carrying the versions it was
//! observed in.

use std::collections::BTreeMap;

use apiset_classfile::{Annotation, ConstValue, ElementValue, EnclosingMethod};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::access::{Access, Modality, Visibility};
use crate::version::Version;

/// Map key for a member: its name joined with its erased descriptor.
pub fn member_key(name: &str, descriptor: &str) -> String {
    format!("{name}{descriptor}")
}

/// Nullability marker, ordered so that merging keeps the weakest guarantee.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Nullability {
    NotNull,
    Nullable,
    #[default]
    Unknown,
}

impl Nullability {
    pub fn merge(self, other: Nullability) -> Nullability {
        self.max(other)
    }
}

/// How the class was produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Plain,
    /// Carried a Kotlin metadata annotation.
    Kotlin,
}

/// Per-value record of which versions a facet (visibility, modality) took that value in.
///
/// Empty while every observed version agrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternatives<K: Ord, V> {
    entries: BTreeMap<K, V>,
}

impl<K: Ord, V> Default for Alternatives<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Copy, V: Version> Alternatives<K, V> {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: K) -> Option<&V> {
        self.entries.get(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.keys().copied()
    }

    /// Records `version` under `key`, joining with whatever was already there.
    pub fn insert(&mut self, key: K, version: &V) {
        match self.entries.get_mut(&key) {
            Some(existing) => *existing = existing.plus(version),
            None => {
                self.entries.insert(key, version.clone());
            }
        }
    }

    fn absorb(&mut self, other: &Self) {
        for (key, version) in other.iter() {
            self.insert(key, version);
        }
    }

    /// What one operand knows about the facet: its table if it has one, otherwise its current
    /// value in its own version.
    fn absorb_side(&mut self, table: &Self, current: K, version: Option<&V>) {
        if !table.is_empty() {
            self.absorb(table);
        } else if let Some(version) = version {
            self.insert(current, version);
        }
    }

    /// Combined table for two operands, or `None` when both agree and neither has history.
    pub fn combine(
        left: (&Self, K, Option<&V>),
        right: (&Self, K, Option<&V>),
    ) -> Option<Self> {
        if left.1 == right.1 && left.0.is_empty() && right.0.is_empty() {
            return None;
        }
        let mut out = Self::default();
        out.absorb_side(left.0, left.1, left.2);
        out.absorb_side(right.0, right.1, right.2);
        Some(out)
    }
}

/// Annotations of one element, kept apart by the attribute they were read from so that
/// retention survives a round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    /// `RuntimeVisible*Annotations`.
    pub visible: Vec<Annotation>,
    /// `RuntimeInvisible*Annotations`.
    pub invisible: Vec<Annotation>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty() && self.invisible.is_empty()
    }

    pub fn len(&self) -> usize {
        self.visible.len() + self.invisible.len()
    }

    /// Visible first.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.visible.iter().chain(&self.invisible)
    }

    pub fn find(&self, type_descriptor: &str) -> Option<&Annotation> {
        self.iter()
            .find(|annotation| annotation.type_descriptor == type_descriptor)
    }
}

/// Per-position parameter metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterInfo {
    pub name: Option<String>,
    pub access: u16,
    pub annotations: Annotations,
    pub nullability: Nullability,
}

/// Nested-class reference recorded in an `InnerClasses` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerClassRef {
    pub outer: Option<String>,
    pub inner_name: Option<String>,
    pub access: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry<V> {
    pub access: Access,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub constant_value: Option<ConstValue>,
    /// `None` inherits the owning class's version.
    pub version: Option<V>,
    pub alt_visibility: Alternatives<Visibility, V>,
    pub alt_modality: Alternatives<Modality, V>,
    pub nullability: Nullability,
    pub annotations: Annotations,
}

impl<V: Version> FieldEntry<V> {
    pub fn new(access: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access: Access(access),
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            constant_value: None,
            version: None,
            alt_visibility: Alternatives::default(),
            alt_modality: Alternatives::default(),
            nullability: Nullability::Unknown,
            annotations: Annotations::default(),
        }
    }

    pub fn key(&self) -> String {
        member_key(&self.name, &self.descriptor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodEntry<V> {
    pub access: Access,
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
    /// `None` inherits the owning class's version.
    pub version: Option<V>,
    pub alt_visibility: Alternatives<Visibility, V>,
    pub alt_modality: Alternatives<Modality, V>,
    /// Nullability of the return value.
    pub nullability: Nullability,
    pub parameters: Vec<ParameterInfo>,
    pub annotations: Annotations,
    pub annotation_default: Option<ElementValue>,
}

impl<V: Version> MethodEntry<V> {
    pub fn new(access: u16, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            access: Access(access),
            name: name.into(),
            descriptor: descriptor.into(),
            signature: None,
            exceptions: Vec::new(),
            version: None,
            alt_visibility: Alternatives::default(),
            alt_modality: Alternatives::default(),
            nullability: Nullability::Unknown,
            parameters: Vec::new(),
            annotations: Annotations::default(),
            annotation_default: None,
        }
    }

    pub fn key(&self) -> String {
        member_key(&self.name, &self.descriptor)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

/// All methods sharing one erased key.
///
/// Usually a single entry. When versions disagree irreconcilably (different generic shapes or
/// method kinds behind the same erasure) every irreconcilable variant is kept, and the emitted
/// class mangles their names apart.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodSlot<V> {
    Single(MethodEntry<V>),
    Group(Vec<MethodEntry<V>>),
}

impl<V> MethodSlot<V> {
    pub fn from_variants(mut variants: Vec<MethodEntry<V>>) -> Option<Self> {
        match variants.len() {
            0 => None,
            1 => variants.pop().map(MethodSlot::Single),
            _ => Some(MethodSlot::Group(variants)),
        }
    }

    pub fn variants(&self) -> &[MethodEntry<V>] {
        match self {
            MethodSlot::Single(method) => std::slice::from_ref(method),
            MethodSlot::Group(variants) => variants,
        }
    }

    pub fn variants_mut(&mut self) -> &mut [MethodEntry<V>] {
        match self {
            MethodSlot::Single(method) => std::slice::from_mut(method),
            MethodSlot::Group(variants) => variants,
        }
    }

    pub fn into_variants(self) -> Vec<MethodEntry<V>> {
        match self {
            MethodSlot::Single(method) => vec![method],
            MethodSlot::Group(variants) => variants,
        }
    }

    /// Adds another variant, turning a single method into a group.
    pub fn push(&mut self, method: MethodEntry<V>) {
        match self {
            MethodSlot::Group(variants) => variants.push(method),
            MethodSlot::Single(_) => {
                let mut variants = std::mem::replace(self, MethodSlot::Group(Vec::new())).into_variants();
                variants.push(method);
                *self = MethodSlot::Group(variants);
            }
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, MethodSlot::Group(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry<V> {
    /// Internal name (`java/util/List`), the superset key.
    pub name: String,
    pub access: Access,
    pub signature: Option<String>,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub enclosing: Option<EnclosingMethod>,
    pub version: V,
    pub alt_visibility: Alternatives<Visibility, V>,
    pub alt_modality: Alternatives<Modality, V>,
    pub origin: Origin,
    /// The origin-marker annotation itself, re-emitted verbatim.
    pub origin_metadata: Option<Annotation>,
    pub annotations: Annotations,
    pub inner_classes: IndexMap<String, InnerClassRef>,
    pub fields: IndexMap<String, FieldEntry<V>>,
    pub methods: IndexMap<String, MethodSlot<V>>,
}

impl<V: Version> ClassEntry<V> {
    pub fn new(access: u16, name: impl Into<String>, version: V) -> Self {
        Self {
            name: name.into(),
            access: Access(access),
            signature: None,
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            enclosing: None,
            version,
            alt_visibility: Alternatives::default(),
            alt_modality: Alternatives::default(),
            origin: Origin::Plain,
            origin_metadata: None,
            annotations: Annotations::default(),
            inner_classes: IndexMap::new(),
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// Dotted fully qualified name.
    pub fn fqn(&self) -> String {
        self.name.replace('/', ".")
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodSlot<V>> {
        self.methods.get(&member_key(name, descriptor))
    }

    pub fn field(&self, name: &str, descriptor: &str) -> Option<&FieldEntry<V>> {
        self.fields.get(&member_key(name, descriptor))
    }

    /// Nested or local class that is not visible outside its package.
    pub fn is_package_private_member_class(&self) -> bool {
        self.enclosing.is_some() && self.access.visibility() == Visibility::PackagePrivate
    }

    pub fn all_methods(&self) -> impl Iterator<Item = &MethodEntry<V>> {
        self.methods.values().flat_map(|slot| slot.variants().iter())
    }

    /// Every version value recorded anywhere in this class.
    pub fn versions(&self) -> impl Iterator<Item = &V> {
        let fields = self.fields.values().filter_map(|f| f.version.as_ref());
        let methods = self.all_methods().filter_map(|m| m.version.as_ref());
        std::iter::once(&self.version).chain(fields).chain(methods)
    }
}
