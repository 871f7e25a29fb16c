//! Unification of generic signatures observed in different versions.
//!
//! Signatures are compared after renaming each member's own type variables to positional
//! placeholders, so `<T>` and `<E>` at the same position compare equal. When they still differ
//! structurally the two trees are unified node by node; unification succeeds only when both
//! trees have the same shape, and only loosens type arguments.
//!
//! The result is printed back with the original variable names. Where both sides named the same
//! placeholder differently, the target's name wins.

use std::collections::HashMap;

use apiset_classfile::{
    parse_class_signature, parse_field_signature, parse_method_signature, ClassSignature,
    ClassTypeSegment, ClassTypeSignature, MethodSignature, TypeArgument, TypeParameter,
    TypeSignature,
};

use crate::report::{Conflict, ConflictKind};

fn mismatch(message: impl Into<String>) -> Conflict {
    Conflict::new(ConflictKind::GenericsMismatch, message)
}

fn placeholder(index: usize) -> String {
    format!("T{index}")
}

/// Joins two method signatures.
///
/// A method that lost (or gained) its generic signature between versions keeps only its erased
/// shape. With `deep` disabled, signatures that differ after canonicalization are rejected
/// instead of unified.
pub fn merge_method_signatures(
    target: Option<&str>,
    source: Option<&str>,
    deep: bool,
) -> Result<Option<String>, Conflict> {
    let (target, source) = match (target, source) {
        (Some(t), Some(s)) if t == s => return Ok(Some(t.to_string())),
        (Some(t), Some(s)) => (t, s),
        _ => return Ok(None),
    };

    let target_sig = parse_method_signature(target)
        .map_err(|err| mismatch(format!("unreadable signature {target}: {err}")))?;
    let source_sig = parse_method_signature(source)
        .map_err(|err| mismatch(format!("unreadable signature {source}: {err}")))?;

    let (target_canon, target_names) = canonicalize_method(&target_sig);
    let (source_canon, source_names) = canonicalize_method(&source_sig);
    if target_canon == source_canon {
        return Ok(Some(target.to_string()));
    }
    if !deep {
        return Err(mismatch(format!("{target} vs {source}")));
    }

    let merged = unify_method(&target_canon, &source_canon)
        .ok_or_else(|| mismatch(format!("{target} vs {source}")))?;
    let names = rename_table(&target_names, &source_names);
    Ok(Some(rename_method(&merged, &names).to_string()))
}

/// Joins two field signatures; a field must be generic in both versions or in neither.
pub fn merge_field_signatures(
    target: Option<&str>,
    source: Option<&str>,
) -> Result<Option<String>, Conflict> {
    let (target, source) = match (target, source) {
        (None, None) => return Ok(None),
        (Some(t), Some(s)) if t == s => return Ok(Some(t.to_string())),
        (Some(t), Some(s)) => (t, s),
        (t, s) => {
            return Err(mismatch(format!(
                "{} vs {}",
                t.unwrap_or("<erased>"),
                s.unwrap_or("<erased>")
            )))
        }
    };
    let target_sig = parse_field_signature(target)
        .map_err(|err| mismatch(format!("unreadable signature {target}: {err}")))?;
    let source_sig = parse_field_signature(source)
        .map_err(|err| mismatch(format!("unreadable signature {source}: {err}")))?;
    let merged = unify_type(&target_sig, &source_sig)
        .ok_or_else(|| mismatch(format!("{target} vs {source}")))?;
    Ok(Some(merged.to_string()))
}

/// Joins two class signatures; a class must be generic in both versions or in neither.
pub fn merge_class_signatures(
    target: Option<&str>,
    source: Option<&str>,
) -> Result<Option<String>, Conflict> {
    let (target, source) = match (target, source) {
        (None, None) => return Ok(None),
        (Some(t), Some(s)) if t == s => return Ok(Some(t.to_string())),
        (Some(t), Some(s)) => (t, s),
        (t, s) => {
            return Err(mismatch(format!(
                "{} vs {}",
                t.unwrap_or("<erased>"),
                s.unwrap_or("<erased>")
            )))
        }
    };
    let target_sig = parse_class_signature(target)
        .map_err(|err| mismatch(format!("unreadable signature {target}: {err}")))?;
    let source_sig = parse_class_signature(source)
        .map_err(|err| mismatch(format!("unreadable signature {source}: {err}")))?;

    let (target_canon, target_names) = canonicalize_class(&target_sig);
    let (source_canon, source_names) = canonicalize_class(&source_sig);
    if target_canon == source_canon {
        return Ok(Some(target.to_string()));
    }
    let merged = unify_class(&target_canon, &source_canon)
        .ok_or_else(|| mismatch(format!("{target} vs {source}")))?;
    let names = rename_table(&target_names, &source_names);
    Ok(Some(rename_class(&merged, &names).to_string()))
}

/// Placeholder to original name, target names taking precedence.
fn rename_table(target_names: &[String], source_names: &[String]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for (i, name) in source_names.iter().enumerate() {
        names.insert(placeholder(i), name.clone());
    }
    for (i, name) in target_names.iter().enumerate() {
        names.insert(placeholder(i), name.clone());
    }
    names
}

fn own_names(params: &[TypeParameter]) -> (Vec<String>, HashMap<String, String>) {
    let names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
    let map = names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), placeholder(i)))
        .collect();
    (names, map)
}

/// Renames the method's own type variables to `T0, T1, ...`; variables declared by the
/// enclosing class are left alone.
pub fn canonicalize_method(sig: &MethodSignature) -> (MethodSignature, Vec<String>) {
    let (names, map) = own_names(&sig.type_parameters);
    (rename_method(sig, &map), names)
}

pub fn canonicalize_class(sig: &ClassSignature) -> (ClassSignature, Vec<String>) {
    let (names, map) = own_names(&sig.type_parameters);
    (rename_class(sig, &map), names)
}

fn rename_method(sig: &MethodSignature, map: &HashMap<String, String>) -> MethodSignature {
    MethodSignature {
        type_parameters: sig
            .type_parameters
            .iter()
            .map(|p| rename_type_parameter(p, map))
            .collect(),
        parameters: sig.parameters.iter().map(|t| rename_type(t, map)).collect(),
        return_type: sig.return_type.as_ref().map(|t| rename_type(t, map)),
        throws: sig.throws.iter().map(|t| rename_type(t, map)).collect(),
    }
}

fn rename_class(sig: &ClassSignature, map: &HashMap<String, String>) -> ClassSignature {
    ClassSignature {
        type_parameters: sig
            .type_parameters
            .iter()
            .map(|p| rename_type_parameter(p, map))
            .collect(),
        super_class: rename_class_type(&sig.super_class, map),
        interfaces: sig
            .interfaces
            .iter()
            .map(|i| rename_class_type(i, map))
            .collect(),
    }
}

fn rename_type_parameter(param: &TypeParameter, map: &HashMap<String, String>) -> TypeParameter {
    TypeParameter {
        name: map.get(&param.name).cloned().unwrap_or_else(|| param.name.clone()),
        class_bound: param.class_bound.as_ref().map(|b| rename_type(b, map)),
        interface_bounds: param
            .interface_bounds
            .iter()
            .map(|b| rename_type(b, map))
            .collect(),
    }
}

fn rename_type(ty: &TypeSignature, map: &HashMap<String, String>) -> TypeSignature {
    match ty {
        TypeSignature::Base(_) => ty.clone(),
        TypeSignature::Array(component) => TypeSignature::Array(Box::new(rename_type(component, map))),
        TypeSignature::Class(class) => TypeSignature::Class(rename_class_type(class, map)),
        TypeSignature::TypeVariable(name) => {
            TypeSignature::TypeVariable(map.get(name).cloned().unwrap_or_else(|| name.clone()))
        }
    }
}

fn rename_class_type(ty: &ClassTypeSignature, map: &HashMap<String, String>) -> ClassTypeSignature {
    ClassTypeSignature {
        segments: ty
            .segments
            .iter()
            .map(|seg| ClassTypeSegment {
                name: seg.name.clone(),
                type_arguments: seg
                    .type_arguments
                    .iter()
                    .map(|arg| match arg {
                        TypeArgument::Any => TypeArgument::Any,
                        TypeArgument::Exact(t) => TypeArgument::Exact(Box::new(rename_type(t, map))),
                        TypeArgument::Extends(t) => {
                            TypeArgument::Extends(Box::new(rename_type(t, map)))
                        }
                        TypeArgument::Super(t) => TypeArgument::Super(Box::new(rename_type(t, map))),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn unify_all(a: &[TypeSignature], b: &[TypeSignature]) -> Option<Vec<TypeSignature>> {
    if a.len() != b.len() {
        return None;
    }
    a.iter().zip(b).map(|(a, b)| unify_type(a, b)).collect()
}

fn unify_type_parameters(a: &[TypeParameter], b: &[TypeParameter]) -> Option<Vec<TypeParameter>> {
    if a.len() != b.len() {
        return None;
    }
    a.iter()
        .zip(b)
        .map(|(a, b)| {
            let class_bound = match (&a.class_bound, &b.class_bound) {
                (Some(a), Some(b)) => Some(unify_type(a, b)?),
                (None, None) => None,
                _ => return None,
            };
            Some(TypeParameter {
                name: a.name.clone(),
                class_bound,
                interface_bounds: unify_all(&a.interface_bounds, &b.interface_bounds)?,
            })
        })
        .collect()
}

fn unify_method(a: &MethodSignature, b: &MethodSignature) -> Option<MethodSignature> {
    let return_type = match (&a.return_type, &b.return_type) {
        (Some(a), Some(b)) => Some(unify_type(a, b)?),
        (None, None) => None,
        _ => return None,
    };
    Some(MethodSignature {
        type_parameters: unify_type_parameters(&a.type_parameters, &b.type_parameters)?,
        parameters: unify_all(&a.parameters, &b.parameters)?,
        return_type,
        throws: unify_all(&a.throws, &b.throws)?,
    })
}

fn unify_class(a: &ClassSignature, b: &ClassSignature) -> Option<ClassSignature> {
    let type_parameters = unify_type_parameters(&a.type_parameters, &b.type_parameters)?;
    let super_class = unify_class_type(&a.super_class, &b.super_class)?;

    // Interfaces present on only one side are kept as they are.
    let mut interfaces = Vec::with_capacity(a.interfaces.len());
    for iface in &a.interfaces {
        let name = iface.internal_name();
        match b.interfaces.iter().find(|other| other.internal_name() == name) {
            Some(other) => interfaces.push(unify_class_type(iface, other)?),
            None => interfaces.push(iface.clone()),
        }
    }
    for iface in &b.interfaces {
        let name = iface.internal_name();
        if !a.interfaces.iter().any(|other| other.internal_name() == name) {
            interfaces.push(iface.clone());
        }
    }

    Some(ClassSignature {
        type_parameters,
        super_class,
        interfaces,
    })
}

/// Unifies two type nodes of the same shape.
pub fn unify_type(a: &TypeSignature, b: &TypeSignature) -> Option<TypeSignature> {
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (TypeSignature::Class(a), TypeSignature::Class(b)) => {
            unify_class_type(a, b).map(TypeSignature::Class)
        }
        (TypeSignature::Array(a), TypeSignature::Array(b)) => {
            unify_type(a, b).map(|c| TypeSignature::Array(Box::new(c)))
        }
        _ => None,
    }
}

fn unify_class_type(a: &ClassTypeSignature, b: &ClassTypeSignature) -> Option<ClassTypeSignature> {
    if a.segments.len() != b.segments.len() {
        return None;
    }
    let segments = a
        .segments
        .iter()
        .zip(&b.segments)
        .map(|(a, b)| {
            if a.name != b.name || a.type_arguments.len() != b.type_arguments.len() {
                return None;
            }
            Some(ClassTypeSegment {
                name: a.name.clone(),
                type_arguments: a
                    .type_arguments
                    .iter()
                    .zip(&b.type_arguments)
                    .map(|(a, b)| unify_argument(a, b))
                    .collect(),
            })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(ClassTypeSignature { segments })
}

fn is_object(ty: &TypeSignature) -> bool {
    matches!(ty, TypeSignature::Class(class)
        if class.segments.len() == 1
            && class.segments[0].name == "java/lang/Object"
            && class.segments[0].type_arguments.is_empty())
}

/// Joins two type arguments. Never fails: the fallback is the unbounded wildcard.
pub fn unify_argument(a: &TypeArgument, b: &TypeArgument) -> TypeArgument {
    use TypeArgument::{Any, Exact, Extends, Super};

    if a == b {
        return a.clone();
    }
    match (a, b) {
        (Any, _) | (_, Any) => Any,
        (Exact(x), Exact(y)) => unify_type(x, y).map_or(Any, |t| Exact(Box::new(t))),
        (Extends(x), Extends(y)) => unify_type(x, y).map_or(Any, |t| Extends(Box::new(t))),
        (Super(x), Super(y)) => unify_type(x, y).map_or(Any, |t| Super(Box::new(t))),
        // The bounded side keeps its variance over the joined node. `? extends Object` already
        // admits any exact argument, so it survives even when the nodes do not unify.
        (Extends(x), Exact(y)) | (Exact(y), Extends(x)) => match unify_type(x, y) {
            Some(t) => Extends(Box::new(t)),
            None if is_object(x) => Extends(x.clone()),
            None => Any,
        },
        (Super(x), Exact(y)) | (Exact(y), Super(x)) => {
            unify_type(x, y).map_or(Any, |t| Super(Box::new(t)))
        }
        (Extends(_), Super(_)) | (Super(_), Extends(_)) => Any,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renamed_type_variables_compare_equal() {
        let merged = merge_method_signatures(
            Some("<T:Ljava/lang/Object;>(TT;)TT;"),
            Some("<E:Ljava/lang/Object;>(TE;)TE;"),
            false,
        )
        .unwrap();
        assert_eq!(merged.as_deref(), Some("<T:Ljava/lang/Object;>(TT;)TT;"));
    }

    #[test]
    fn class_type_variables_are_not_renamed() {
        let sig = parse_method_signature("<U:Ljava/lang/Object;>(TE;TU;)V").unwrap();
        let (canon, names) = canonicalize_method(&sig);
        assert_eq!(names, vec!["U".to_string()]);
        assert_eq!(canon.to_string(), "<T0:Ljava/lang/Object;>(TE;TT0;)V");
    }

    #[test]
    fn exact_against_bounded_keeps_the_bound() {
        let merged = merge_method_signatures(
            Some("(Ljava/util/List<Ljava/lang/String;>;)V"),
            Some("(Ljava/util/List<+Ljava/lang/Object;>;)V"),
            true,
        )
        .unwrap();
        assert_eq!(
            merged.as_deref(),
            Some("(Ljava/util/List<+Ljava/lang/Object;>;)V")
        );
    }

    #[test]
    fn exact_against_unrelated_bound_degrades_to_wildcard() {
        let merged = merge_method_signatures(
            Some("(Ljava/util/List<Ljava/lang/String;>;)V"),
            Some("(Ljava/util/List<+Ljava/lang/Integer;>;)V"),
            true,
        )
        .unwrap();
        assert_eq!(merged.as_deref(), Some("(Ljava/util/List<*>;)V"));

        let merged = merge_method_signatures(
            Some("(Ljava/util/List<-Ljava/lang/Integer;>;)V"),
            Some("(Ljava/util/List<Ljava/lang/String;>;)V"),
            true,
        )
        .unwrap();
        assert_eq!(merged.as_deref(), Some("(Ljava/util/List<*>;)V"));
    }

    #[test]
    fn exact_against_bound_joins_the_inner_nodes() {
        let merged = merge_method_signatures(
            Some("(Ljava/util/List<Ljava/util/List<Ljava/lang/String;>;>;)V"),
            Some("(Ljava/util/List<+Ljava/util/List<Ljava/lang/Integer;>;>;)V"),
            true,
        )
        .unwrap();
        assert_eq!(
            merged.as_deref(),
            Some("(Ljava/util/List<+Ljava/util/List<*>;>;)V")
        );
    }

    #[test]
    fn conflicting_exact_arguments_degrade_to_wildcard() {
        let merged = merge_field_signatures(
            Some("Ljava/util/Map<Ljava/lang/String;Ljava/lang/Integer;>;"),
            Some("Ljava/util/Map<Ljava/lang/String;Ljava/lang/Long;>;"),
        )
        .unwrap();
        assert_eq!(
            merged.as_deref(),
            Some("Ljava/util/Map<Ljava/lang/String;*>;")
        );
    }

    #[test]
    fn wildcard_absorbs() {
        let a = TypeArgument::Exact(Box::new(TypeSignature::TypeVariable("T".into())));
        assert_eq!(unify_argument(&TypeArgument::Any, &a), TypeArgument::Any);
        assert_eq!(unify_argument(&a, &TypeArgument::Any), TypeArgument::Any);
    }

    #[test]
    fn opposite_variances_degrade_to_wildcard() {
        let object = TypeSignature::Class(ClassTypeSignature::simple("java/lang/Object"));
        assert_eq!(
            unify_argument(
                &TypeArgument::Extends(Box::new(object.clone())),
                &TypeArgument::Super(Box::new(object))
            ),
            TypeArgument::Any
        );
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let err = merge_method_signatures(
            Some("<T::Ljava/lang/Comparable<TT;>;>(TT;)V"),
            Some("(Ljava/lang/Comparable<Ljava/lang/String;>;)V"),
            true,
        )
        .unwrap_err();
        assert_eq!(err.kind, ConflictKind::GenericsMismatch);
    }

    #[test]
    fn shallow_mode_rejects_structural_differences() {
        let err = merge_method_signatures(
            Some("(Ljava/util/List<Ljava/lang/String;>;)V"),
            Some("(Ljava/util/List<Ljava/lang/Integer;>;)V"),
            false,
        )
        .unwrap_err();
        assert_eq!(err.kind, ConflictKind::GenericsMismatch);
    }

    #[test]
    fn erased_method_side_drops_signature() {
        assert_eq!(
            merge_method_signatures(Some("<T:Ljava/lang/Object;>()TT;"), None, true).unwrap(),
            None
        );
    }

    #[test]
    fn erased_field_side_is_a_mismatch() {
        let err = merge_field_signatures(Some("Ljava/util/List<TT;>;"), None).unwrap_err();
        assert_eq!(err.kind, ConflictKind::GenericsMismatch);
    }

    #[test]
    fn target_names_win_when_renaming_back() {
        let merged = merge_method_signatures(
            Some("<K:Ljava/lang/Object;>(Ljava/util/List<TK;>;)V"),
            Some("<E:Ljava/lang/Object;>(Ljava/util/Collection<TE;>;)V"),
            true,
        );
        // Different raw types at the same position never unify.
        assert!(merged.is_err());

        let merged = merge_method_signatures(
            Some("<K:Ljava/lang/Object;>(Ljava/util/Map<TK;Ljava/lang/String;>;)V"),
            Some("<E:Ljava/lang/Object;>(Ljava/util/Map<TE;Ljava/lang/Integer;>;)V"),
            true,
        )
        .unwrap();
        assert_eq!(
            merged.as_deref(),
            Some("<K:Ljava/lang/Object;>(Ljava/util/Map<TK;*>;)V")
        );
    }

    #[test]
    fn class_interfaces_unify_by_name() {
        let merged = merge_class_signatures(
            Some("<T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Comparable<TT;>;"),
            Some("<E:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Comparable<Ljava/lang/String;>;Ljava/io/Serializable;"),
        )
        .unwrap();
        assert_eq!(
            merged.as_deref(),
            Some("<T:Ljava/lang/Object;>Ljava/lang/Object;Ljava/lang/Comparable<*>;Ljava/io/Serializable;")
        );
    }
}
