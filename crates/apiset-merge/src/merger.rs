//! Pairwise merging of class snapshots.
//!
//! [`Merger::merge_classes`] folds an incoming snapshot into an existing entry. Class-level
//! preconditions are checked before anything is touched; a failed precondition leaves the target
//! exactly as it was. Members are then merged one by one, each attempt recorded in its own scope.

use apiset_classfile::Annotation;
use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::access::{Access, Modality, Visibility};
use crate::generics::{merge_class_signatures, merge_field_signatures, merge_method_signatures};
use crate::model::{
    Alternatives, Annotations, ClassEntry, FieldEntry, InnerClassRef, MethodEntry, MethodSlot,
    ParameterInfo,
};
use crate::report::{Conflict, ConflictKind, MergeReport, MergeScope};
use crate::version::{plus_opt, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOptions {
    /// Unify structurally different method signatures instead of rejecting them. Constructors
    /// are unified regardless.
    pub deep_signature_merge: bool,
    /// Drop nested or local classes that are package-private.
    pub skip_package_private_member_classes: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            deep_signature_merge: true,
            skip_package_private_member_classes: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct Merger {
    options: MergeOptions,
    report: MergeReport,
}

impl Merger {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            report: MergeReport::default(),
        }
    }

    /// Continues from a report accumulated elsewhere.
    pub fn with_report(options: MergeOptions, report: MergeReport) -> Self {
        Self { options, report }
    }

    pub fn options(&self) -> MergeOptions {
        self.options
    }

    pub fn report(&self) -> &MergeReport {
        &self.report
    }

    pub fn into_report(self) -> MergeReport {
        self.report
    }

    /// Folds `incoming` into `target`. Returns `false` when a class-level precondition failed;
    /// the target is then unchanged and the failure is recorded under classes.
    pub fn merge_classes<V: Version>(
        &mut self,
        target: &mut ClassEntry<V>,
        mut incoming: ClassEntry<V>,
    ) -> bool {
        let subject = target.name.clone();
        let checked = check_classes(target, &incoming);
        let Some(signature) = self.report.classes.record(&subject, checked) else {
            return false;
        };

        if target.origin != incoming.origin {
            self.report.classes.warn(
                &subject,
                Conflict::new(
                    ConflictKind::OriginMismatch,
                    format!("{:?} vs {:?}", target.origin, incoming.origin),
                ),
            );
        }

        materialize_member_versions(target);
        materialize_member_versions(&mut incoming);

        target.signature = signature;
        widen_visibility(
            (&mut target.access, &mut target.alt_visibility, Some(&target.version)),
            (incoming.access, &incoming.alt_visibility, Some(&incoming.version)),
        );
        widen_modality(
            (&mut target.access, &mut target.alt_modality, Some(&target.version)),
            (incoming.access, &incoming.alt_modality, Some(&incoming.version)),
        );

        for iface in incoming.interfaces {
            if !target.interfaces.contains(&iface) {
                target.interfaces.push(iface);
            }
        }
        if target.origin_metadata.is_none() {
            target.origin_metadata = incoming.origin_metadata;
        }

        merge_annotations(
            &mut self.report.annotations,
            &subject,
            &mut target.annotations,
            incoming.annotations,
        );
        self.merge_inner_classes(&subject, &mut target.inner_classes, incoming.inner_classes);

        for (key, field) in incoming.fields {
            match target.fields.entry(key) {
                Entry::Occupied(mut existing) => self.merge_fields(&subject, existing.get_mut(), field),
                Entry::Vacant(slot) => {
                    slot.insert(field);
                }
            }
        }

        for (key, slot) in incoming.methods {
            match target.methods.entry(key) {
                Entry::Occupied(mut existing) => {
                    for method in slot.into_variants() {
                        self.merge_method_into_slot(&subject, existing.get_mut(), method);
                    }
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(slot);
                }
            }
        }

        target.version = target.version.plus(&incoming.version);
        tracing::trace!(target: "apiset.merge", class = %subject, "merged class snapshot");
        true
    }

    fn merge_fields<V: Version>(
        &mut self,
        owner: &str,
        target: &mut FieldEntry<V>,
        incoming: FieldEntry<V>,
    ) {
        let subject = format!("{owner}.{}:{}", incoming.name, incoming.descriptor);
        let checked = if target.access.modality() != incoming.access.modality() {
            Err(Conflict::new(
                ConflictKind::FieldModalityMismatch,
                format!(
                    "{:?} vs {:?}",
                    target.access.modality(),
                    incoming.access.modality()
                ),
            ))
        } else {
            merge_field_signatures(target.signature.as_deref(), incoming.signature.as_deref())
        };
        let Some(signature) = self.report.fields.record(&subject, checked) else {
            return;
        };

        target.signature = signature;
        widen_visibility(
            (&mut target.access, &mut target.alt_visibility, target.version.as_ref()),
            (incoming.access, &incoming.alt_visibility, incoming.version.as_ref()),
        );
        if target.constant_value.is_none() {
            target.constant_value = incoming.constant_value;
        }
        target.nullability = target.nullability.merge(incoming.nullability);
        merge_annotations(
            &mut self.report.annotations,
            &subject,
            &mut target.annotations,
            incoming.annotations,
        );
        target.version = plus_opt(target.version.as_ref(), incoming.version.as_ref());
    }

    /// Merges `incoming` into the first compatible variant of `slot`, or keeps it as a new
    /// variant when none accepts it.
    fn merge_method_into_slot<V: Version>(
        &mut self,
        owner: &str,
        slot: &mut MethodSlot<V>,
        incoming: MethodEntry<V>,
    ) {
        let subject = format!("{owner}.{}{}", incoming.name, incoming.descriptor);
        for variant in slot.variants_mut() {
            let checked = self.check_methods(variant, &incoming);
            if let Some(signature) = self.report.methods.record(&subject, checked) {
                self.apply_method(&subject, variant, incoming, signature);
                return;
            }
        }
        tracing::debug!(
            target: "apiset.merge",
            method = %subject,
            "keeping irreconcilable method as a separate variant"
        );
        slot.push(incoming);
    }

    fn check_methods<V: Version>(
        &self,
        target: &MethodEntry<V>,
        incoming: &MethodEntry<V>,
    ) -> Result<Option<String>, Conflict> {
        if target.access.method_kind() != incoming.access.method_kind() {
            return Err(Conflict::new(
                ConflictKind::MethodKindMismatch,
                format!(
                    "{:#06x} vs {:#06x}",
                    target.access.method_kind(),
                    incoming.access.method_kind()
                ),
            ));
        }
        let deep = target.is_constructor() || self.options.deep_signature_merge;
        merge_method_signatures(
            target.signature.as_deref(),
            incoming.signature.as_deref(),
            deep,
        )
    }

    fn apply_method<V: Version>(
        &mut self,
        subject: &str,
        target: &mut MethodEntry<V>,
        incoming: MethodEntry<V>,
        signature: Option<String>,
    ) {
        target.signature = signature;
        widen_visibility(
            (&mut target.access, &mut target.alt_visibility, target.version.as_ref()),
            (incoming.access, &incoming.alt_visibility, incoming.version.as_ref()),
        );
        widen_modality(
            (&mut target.access, &mut target.alt_modality, target.version.as_ref()),
            (incoming.access, &incoming.alt_modality, incoming.version.as_ref()),
        );
        for exception in incoming.exceptions {
            if !target.exceptions.contains(&exception) {
                target.exceptions.push(exception);
            }
        }
        target.nullability = target.nullability.merge(incoming.nullability);
        self.merge_parameters(subject, &mut target.parameters, incoming.parameters);
        merge_annotations(
            &mut self.report.annotations,
            subject,
            &mut target.annotations,
            incoming.annotations,
        );
        if target.annotation_default.is_none() {
            target.annotation_default = incoming.annotation_default;
        }
        target.version = plus_opt(target.version.as_ref(), incoming.version.as_ref());
    }

    fn merge_parameters(
        &mut self,
        subject: &str,
        target: &mut Vec<ParameterInfo>,
        incoming: Vec<ParameterInfo>,
    ) {
        for (index, param) in incoming.into_iter().enumerate() {
            let Some(existing) = target.get_mut(index) else {
                target.push(param);
                continue;
            };
            if existing.name.is_none() {
                existing.name = param.name;
            }
            existing.access |= param.access;
            existing.nullability = existing.nullability.merge(param.nullability);
            merge_annotations(
                &mut self.report.annotations,
                &format!("{subject}#{index}"),
                &mut existing.annotations,
                param.annotations,
            );
        }
    }

    fn merge_inner_classes(
        &mut self,
        owner: &str,
        target: &mut IndexMap<String, InnerClassRef>,
        incoming: IndexMap<String, InnerClassRef>,
    ) {
        for (name, inner) in incoming {
            let subject = format!("{owner}->{name}");
            let checked = match target.get(&name) {
                None => {
                    target.insert(name, inner);
                    Ok(())
                }
                Some(existing) if *existing == inner => Ok(()),
                Some(existing) => Err(Conflict::new(
                    ConflictKind::DifferentInnerRefsSameDescriptor,
                    format!("{existing:?} vs {inner:?}"),
                )),
            };
            self.report.inner_class_refs.record(&subject, checked);
        }
    }
}

fn check_classes<V: Version>(
    target: &ClassEntry<V>,
    incoming: &ClassEntry<V>,
) -> Result<Option<String>, Conflict> {
    let (target_kind, incoming_kind) = (target.access.class_kind(), incoming.access.class_kind());
    if target_kind != incoming_kind {
        return Err(Conflict::new(
            ConflictKind::ClassKindMismatch,
            format!("{target_kind} vs {incoming_kind}"),
        ));
    }
    if target.enclosing != incoming.enclosing {
        return Err(Conflict::new(
            ConflictKind::OwnerMismatch,
            format!("{:?} vs {:?}", target.enclosing, incoming.enclosing),
        ));
    }
    if target.super_class != incoming.super_class {
        return Err(Conflict::new(
            ConflictKind::SuperTypeMismatch,
            format!(
                "{} vs {}",
                target.super_class.as_deref().unwrap_or("<none>"),
                incoming.super_class.as_deref().unwrap_or("<none>")
            ),
        ));
    }
    merge_class_signatures(target.signature.as_deref(), incoming.signature.as_deref())
}

/// Gives every member that inherits its class version an explicit one.
fn materialize_member_versions<V: Version>(class: &mut ClassEntry<V>) {
    let version = &class.version;
    for field in class.fields.values_mut() {
        field.version.get_or_insert_with(|| version.clone());
    }
    for slot in class.methods.values_mut() {
        for method in slot.variants_mut() {
            method.version.get_or_insert_with(|| version.clone());
        }
    }
}

type FacetTarget<'a, K, V> = (&'a mut Access, &'a mut Alternatives<K, V>, Option<&'a V>);
type FacetSource<'a, K, V> = (Access, &'a Alternatives<K, V>, Option<&'a V>);

fn widen_visibility<V: Version>(
    (access, table, version): FacetTarget<'_, Visibility, V>,
    (other, other_table, other_version): FacetSource<'_, Visibility, V>,
) {
    let Some(combined) = Alternatives::combine(
        (&*table, access.visibility(), version),
        (other_table, other.visibility(), other_version),
    ) else {
        return;
    };
    if let Some(widest) = combined.keys().max() {
        *access = access.with_visibility(widest);
    }
    *table = combined;
}

fn widen_modality<V: Version>(
    (access, table, version): FacetTarget<'_, Modality, V>,
    (other, other_table, other_version): FacetSource<'_, Modality, V>,
) {
    let Some(combined) = Alternatives::combine(
        (&*table, access.modality(), version),
        (other_table, other.modality(), other_version),
    ) else {
        return;
    };
    if let Some(widest) = combined.keys().reduce(Modality::widen) {
        *access = access.with_modality(widest);
    }
    *table = combined;
}

/// Annotations are matched by type descriptor within the same retention; when two versions carry
/// different payloads the first one seen is kept and the conflict is reported.
fn merge_annotations(
    scope: &mut MergeScope,
    subject: &str,
    target: &mut Annotations,
    incoming: Annotations,
) {
    merge_annotation_list(scope, subject, &mut target.visible, incoming.visible);
    merge_annotation_list(scope, subject, &mut target.invisible, incoming.invisible);
}

fn merge_annotation_list(
    scope: &mut MergeScope,
    subject: &str,
    target: &mut Vec<Annotation>,
    incoming: Vec<Annotation>,
) {
    for annotation in incoming {
        let checked = match target
            .iter()
            .find(|existing| existing.type_descriptor == annotation.type_descriptor)
        {
            None => {
                target.push(annotation);
                Ok(())
            }
            Some(existing) if *existing == annotation => Ok(()),
            Some(existing) => Err(Conflict::new(
                ConflictKind::DifferentAnnotationsSameDescriptor,
                format!("{} payloads differ ({existing:?})", existing.type_descriptor),
            )),
        };
        scope.record(subject, checked);
    }
}
