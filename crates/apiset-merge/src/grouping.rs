//! Splitting incompatible snapshots of one class into separately named classes.
//!
//! Some classes change so much between versions that they cannot be merged at all (a class
//! that became an interface, a changed superclass). Instead of dropping the later snapshots,
//! [`ClassGrouper`] partitions the snapshots of each class into groups of pairwise mergeable
//! snapshots, and [`ClassGrouper::rewrite`] renames every group of a split class to
//! `<name>V<index>`, rewriting all references so that each snapshot points at the group that
//! exists in its own version.
//!
//! Whether two snapshots are mergeable depends on which groups their references resolve to,
//! which in turn depends on how the referenced classes were grouped. Regrouping a class
//! therefore regroups every class that looked it up, until nothing changes.

use std::collections::{HashMap, HashSet, VecDeque};

use apiset_classfile::{
    parse_class_signature, parse_field_descriptor, parse_field_signature, parse_method_descriptor,
    parse_method_signature, ClassSignature, ClassTypeSegment, ClassTypeSignature, FieldType,
    MethodDescriptor, MethodSignature, ReturnType, TypeArgument, TypeParameter, TypeSignature,
};
use indexmap::IndexMap;

use crate::generics::canonicalize_class;
use crate::model::{ClassEntry, InnerClassRef, MethodSlot};
use crate::version::Version;

#[derive(Debug, Clone, PartialEq)]
struct Group<V> {
    /// Indices into the snapshots of the class, in arrival order.
    members: Vec<usize>,
    version: V,
}

/// Resolves class names to groups while recording which names were looked up.
struct Resolver<'g, V> {
    groups: &'g HashMap<String, Vec<Group<V>>>,
    looked_up: HashSet<String>,
}

impl<V: Version> Resolver<'_, V> {
    fn resolve(&mut self, name: &str, version: &V) -> Option<usize> {
        self.looked_up.insert(name.to_string());
        self.groups
            .get(name)?
            .iter()
            .position(|group| group.version.contains(version))
    }

    fn same_class(&mut self, a: &str, va: &V, b: &str, vb: &V) -> bool {
        a == b && self.resolve(a, va) == self.resolve(b, vb)
    }

    fn same_class_type(
        &mut self,
        a: &ClassTypeSignature,
        va: &V,
        b: &ClassTypeSignature,
        vb: &V,
    ) -> bool {
        if a.segments.len() != b.segments.len()
            || !self.same_class(&a.internal_name(), va, &b.internal_name(), vb)
        {
            return false;
        }
        a.segments.iter().zip(&b.segments).all(|(x, y)| {
            x.type_arguments.len() == y.type_arguments.len()
                && x
                    .type_arguments
                    .iter()
                    .zip(&y.type_arguments)
                    .all(|(p, q)| self.same_argument(p, va, q, vb))
        })
    }

    fn same_argument(&mut self, a: &TypeArgument, va: &V, b: &TypeArgument, vb: &V) -> bool {
        match (a, b) {
            (TypeArgument::Any, TypeArgument::Any) => true,
            (TypeArgument::Exact(x), TypeArgument::Exact(y))
            | (TypeArgument::Extends(x), TypeArgument::Extends(y))
            | (TypeArgument::Super(x), TypeArgument::Super(y)) => self.same_type(x, va, y, vb),
            _ => false,
        }
    }

    fn same_type(&mut self, a: &TypeSignature, va: &V, b: &TypeSignature, vb: &V) -> bool {
        match (a, b) {
            (TypeSignature::Class(x), TypeSignature::Class(y)) => self.same_class_type(x, va, y, vb),
            (TypeSignature::Array(x), TypeSignature::Array(y)) => self.same_type(x, va, y, vb),
            (TypeSignature::Base(x), TypeSignature::Base(y)) => x == y,
            (TypeSignature::TypeVariable(x), TypeSignature::TypeVariable(y)) => x == y,
            _ => false,
        }
    }

    fn same_types(&mut self, a: &[TypeSignature], va: &V, b: &[TypeSignature], vb: &V) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.same_type(x, va, y, vb))
    }

    fn same_type_parameters(
        &mut self,
        a: &[TypeParameter],
        va: &V,
        b: &[TypeParameter],
        vb: &V,
    ) -> bool {
        a.len() == b.len()
            && a.iter().zip(b).all(|(x, y)| {
                let class_bounds = match (&x.class_bound, &y.class_bound) {
                    (Some(p), Some(q)) => self.same_type(p, va, q, vb),
                    (None, None) => true,
                    _ => false,
                };
                class_bounds && self.same_types(&x.interface_bounds, va, &y.interface_bounds, vb)
            })
    }

    /// Interfaces present on only one side do not prevent merging.
    fn same_class_signature(
        &mut self,
        a: &ClassSignature,
        va: &V,
        b: &ClassSignature,
        vb: &V,
    ) -> bool {
        let (a, _) = canonicalize_class(a);
        let (b, _) = canonicalize_class(b);
        if !self.same_type_parameters(&a.type_parameters, va, &b.type_parameters, vb)
            || !self.same_class_type(&a.super_class, va, &b.super_class, vb)
        {
            return false;
        }
        a.interfaces.iter().all(|x| {
            let name = x.internal_name();
            match b.interfaces.iter().find(|y| y.internal_name() == name) {
                Some(y) => self.same_class_type(x, va, y, vb),
                None => true,
            }
        })
    }
}

fn snapshots_mergeable<V: Version>(
    resolver: &mut Resolver<'_, V>,
    a: &ClassEntry<V>,
    b: &ClassEntry<V>,
) -> bool {
    let (va, vb) = (&a.version, &b.version);
    if a.access.class_kind() != b.access.class_kind() {
        return false;
    }
    let owners = match (&a.enclosing, &b.enclosing) {
        (None, None) => true,
        (Some(x), Some(y)) => {
            x.method_name == y.method_name
                && x.method_descriptor == y.method_descriptor
                && resolver.same_class(&x.class, va, &y.class, vb)
        }
        _ => false,
    };
    if !owners {
        return false;
    }
    let supers = match (&a.super_class, &b.super_class) {
        (None, None) => true,
        (Some(x), Some(y)) => resolver.same_class(x, va, y, vb),
        _ => false,
    };
    if !supers {
        return false;
    }
    match (&a.signature, &b.signature) {
        (None, None) => true,
        (Some(x), Some(y)) => match (parse_class_signature(x), parse_class_signature(y)) {
            (Ok(p), Ok(q)) => resolver.same_class_signature(&p, va, &q, vb),
            _ => x == y,
        },
        _ => false,
    }
}

#[derive(Debug)]
pub struct ClassGrouper<V> {
    snapshots: IndexMap<String, Vec<ClassEntry<V>>>,
    groups: HashMap<String, Vec<Group<V>>>,
    /// Class name to the classes whose grouping looked it up.
    dependents: HashMap<String, HashSet<String>>,
}

impl<V> Default for ClassGrouper<V> {
    fn default() -> Self {
        Self {
            snapshots: IndexMap::new(),
            groups: HashMap::new(),
            dependents: HashMap::new(),
        }
    }
}

impl<V: Version> ClassGrouper<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, snapshot: ClassEntry<V>) {
        self.snapshots
            .entry(snapshot.name.clone())
            .or_default()
            .push(snapshot);
    }

    /// Number of groups `name` was split into; zero for unknown classes.
    pub fn group_count(&self, name: &str) -> usize {
        self.groups.get(name).map_or(0, Vec::len)
    }

    fn compute_groups(&self, name: &str) -> (Vec<Group<V>>, HashSet<String>) {
        let mut resolver = Resolver {
            groups: &self.groups,
            looked_up: HashSet::new(),
        };
        let snapshots = self.snapshots.get(name).map(Vec::as_slice).unwrap_or_default();
        let mut groups: Vec<Group<V>> = Vec::new();
        'snapshots: for (index, snapshot) in snapshots.iter().enumerate() {
            for group in &mut groups {
                let fits = group
                    .members
                    .iter()
                    .all(|&member| snapshots_mergeable(&mut resolver, &snapshots[member], snapshot));
                if fits {
                    group.members.push(index);
                    group.version = group.version.plus(&snapshot.version);
                    continue 'snapshots;
                }
            }
            groups.push(Group {
                members: vec![index],
                version: snapshot.version.clone(),
            });
        }
        (groups, resolver.looked_up)
    }

    /// Groups every class, regrouping dependents until the grouping is stable.
    pub fn group_all(&mut self) {
        let mut queue: VecDeque<String> = self.snapshots.keys().cloned().collect();
        let mut queued: HashSet<String> = queue.iter().cloned().collect();
        // Each class can only be split into at most one group per snapshot.
        let mut budget = self.snapshots.values().map(Vec::len).sum::<usize>().max(1)
            * self.snapshots.len().max(1);

        while let Some(name) = queue.pop_front() {
            queued.remove(&name);
            let (groups, looked_up) = self.compute_groups(&name);
            for target in looked_up {
                self.dependents.entry(target).or_default().insert(name.clone());
            }
            if self.groups.get(&name) == Some(&groups) {
                continue;
            }
            self.groups.insert(name.clone(), groups);

            if budget == 0 {
                tracing::warn!(target: "apiset.merge", class = %name, "class grouping did not settle");
                break;
            }
            budget -= 1;
            for dependent in self.dependents.get(&name).into_iter().flatten() {
                if queued.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
    }

    /// Renames every group of a split class and rewrites references in all snapshots.
    ///
    /// Snapshots come back in arrival order, ready for the normal merger.
    pub fn rewrite(mut self) -> Vec<ClassEntry<V>> {
        if self.groups.is_empty() {
            self.group_all();
        }
        let renamer = Renamer {
            groups: &self.groups,
        };
        let mut out = Vec::new();
        for snapshots in self.snapshots.values() {
            for snapshot in snapshots {
                out.push(renamer.rewrite_class(snapshot));
            }
        }
        let split = self.groups.values().filter(|groups| groups.len() > 1).count();
        tracing::debug!(target: "apiset.merge", split, "rewrote split classes");
        out
    }
}

struct Renamer<'g, V> {
    groups: &'g HashMap<String, Vec<Group<V>>>,
}

impl<V: Version> Renamer<'_, V> {
    fn rename(&self, name: &str, version: &V) -> String {
        let Some(groups) = self.groups.get(name).filter(|groups| groups.len() > 1) else {
            return name.to_string();
        };
        match groups.iter().position(|group| group.version.contains(version)) {
            Some(index) => format!("{name}V{index}"),
            None => name.to_string(),
        }
    }

    fn field_type(&self, ty: &FieldType, version: &V) -> FieldType {
        match ty {
            FieldType::Base(_) => ty.clone(),
            FieldType::Object(name) => FieldType::Object(self.rename(name, version)),
            FieldType::Array(component) => {
                FieldType::Array(Box::new(self.field_type(component, version)))
            }
        }
    }

    fn field_descriptor(&self, desc: &str, version: &V) -> String {
        match parse_field_descriptor(desc) {
            Ok(ty) => self.field_type(&ty, version).to_string(),
            Err(_) => desc.to_string(),
        }
    }

    fn method_descriptor(&self, desc: &str, version: &V) -> String {
        match parse_method_descriptor(desc) {
            Ok(parsed) => MethodDescriptor {
                params: parsed
                    .params
                    .iter()
                    .map(|p| self.field_type(p, version))
                    .collect(),
                return_type: match &parsed.return_type {
                    ReturnType::Void => ReturnType::Void,
                    ReturnType::Type(ty) => ReturnType::Type(self.field_type(ty, version)),
                },
            }
            .to_string(),
            Err(_) => desc.to_string(),
        }
    }

    fn class_type(&self, ty: &ClassTypeSignature, version: &V) -> ClassTypeSignature {
        let mut original = String::new();
        let mut renamed = String::new();
        let segments = ty
            .segments
            .iter()
            .enumerate()
            .map(|(i, seg)| {
                let name = if i == 0 {
                    original = seg.name.clone();
                    renamed = self.rename(&original, version);
                    renamed.clone()
                } else {
                    original = format!("{original}${}", seg.name);
                    let full = self.rename(&original, version);
                    let name = full
                        .strip_prefix(&format!("{renamed}$"))
                        .map(str::to_string)
                        .unwrap_or_else(|| seg.name.clone());
                    renamed = format!("{renamed}${name}");
                    name
                };
                ClassTypeSegment {
                    name,
                    type_arguments: seg
                        .type_arguments
                        .iter()
                        .map(|arg| self.argument(arg, version))
                        .collect(),
                }
            })
            .collect();
        ClassTypeSignature { segments }
    }

    fn argument(&self, arg: &TypeArgument, version: &V) -> TypeArgument {
        match arg {
            TypeArgument::Any => TypeArgument::Any,
            TypeArgument::Exact(t) => TypeArgument::Exact(Box::new(self.type_sig(t, version))),
            TypeArgument::Extends(t) => TypeArgument::Extends(Box::new(self.type_sig(t, version))),
            TypeArgument::Super(t) => TypeArgument::Super(Box::new(self.type_sig(t, version))),
        }
    }

    fn type_sig(&self, ty: &TypeSignature, version: &V) -> TypeSignature {
        match ty {
            TypeSignature::Class(class) => TypeSignature::Class(self.class_type(class, version)),
            TypeSignature::Array(component) => {
                TypeSignature::Array(Box::new(self.type_sig(component, version)))
            }
            TypeSignature::Base(_) | TypeSignature::TypeVariable(_) => ty.clone(),
        }
    }

    fn type_parameter(&self, param: &TypeParameter, version: &V) -> TypeParameter {
        TypeParameter {
            name: param.name.clone(),
            class_bound: param.class_bound.as_ref().map(|b| self.type_sig(b, version)),
            interface_bounds: param
                .interface_bounds
                .iter()
                .map(|b| self.type_sig(b, version))
                .collect(),
        }
    }

    fn class_signature(&self, sig: &str, version: &V) -> String {
        let Ok(parsed) = parse_class_signature(sig) else {
            return sig.to_string();
        };
        ClassSignature {
            type_parameters: parsed
                .type_parameters
                .iter()
                .map(|p| self.type_parameter(p, version))
                .collect(),
            super_class: self.class_type(&parsed.super_class, version),
            interfaces: parsed
                .interfaces
                .iter()
                .map(|i| self.class_type(i, version))
                .collect(),
        }
        .to_string()
    }

    fn method_signature(&self, sig: &str, version: &V) -> String {
        let Ok(parsed) = parse_method_signature(sig) else {
            return sig.to_string();
        };
        MethodSignature {
            type_parameters: parsed
                .type_parameters
                .iter()
                .map(|p| self.type_parameter(p, version))
                .collect(),
            parameters: parsed
                .parameters
                .iter()
                .map(|t| self.type_sig(t, version))
                .collect(),
            return_type: parsed.return_type.as_ref().map(|t| self.type_sig(t, version)),
            throws: parsed.throws.iter().map(|t| self.type_sig(t, version)).collect(),
        }
        .to_string()
    }

    fn field_signature(&self, sig: &str, version: &V) -> String {
        match parse_field_signature(sig) {
            Ok(parsed) => self.type_sig(&parsed, version).to_string(),
            Err(_) => sig.to_string(),
        }
    }

    fn rewrite_class(&self, snapshot: &ClassEntry<V>) -> ClassEntry<V> {
        let version = &snapshot.version;
        let mut class = snapshot.clone();
        class.name = self.rename(&snapshot.name, version);
        class.super_class = snapshot.super_class.as_deref().map(|s| self.rename(s, version));
        class.interfaces = snapshot
            .interfaces
            .iter()
            .map(|i| self.rename(i, version))
            .collect();
        if let Some(enclosing) = &mut class.enclosing {
            enclosing.class = self.rename(&enclosing.class, version);
            if let Some(desc) = &enclosing.method_descriptor {
                enclosing.method_descriptor = Some(self.method_descriptor(desc, version));
            }
        }
        class.signature = snapshot
            .signature
            .as_deref()
            .map(|s| self.class_signature(s, version));

        class.inner_classes = snapshot
            .inner_classes
            .iter()
            .map(|(name, inner)| {
                (
                    self.rename(name, version),
                    InnerClassRef {
                        outer: inner.outer.as_deref().map(|o| self.rename(o, version)),
                        inner_name: inner.inner_name.clone(),
                        access: inner.access,
                    },
                )
            })
            .collect();

        class.fields = snapshot
            .fields
            .values()
            .map(|field| {
                let mut field = field.clone();
                field.descriptor = self.field_descriptor(&field.descriptor, version);
                field.signature = field
                    .signature
                    .as_deref()
                    .map(|s| self.field_signature(s, version));
                (field.key(), field)
            })
            .collect();

        let mut methods: IndexMap<String, MethodSlot<V>> = IndexMap::new();
        for method in snapshot.all_methods() {
            let mut method = method.clone();
            method.descriptor = self.method_descriptor(&method.descriptor, version);
            method.signature = method
                .signature
                .as_deref()
                .map(|s| self.method_signature(s, version));
            method.exceptions = method
                .exceptions
                .iter()
                .map(|e| self.rename(e, version))
                .collect();
            let key = method.key();
            match methods.get_mut(&key) {
                Some(slot) => slot.push(method),
                None => {
                    methods.insert(key, MethodSlot::Single(method));
                }
            }
        }
        class.methods = methods;
        class
    }
}
