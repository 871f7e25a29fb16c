//! Compact source-like listing of a merged class.

use std::fmt;

use crate::access::{Access, Modality, Visibility, ACC_INTERFACE};
use crate::model::{Alternatives, ClassEntry, FieldEntry, MethodEntry, MethodSlot, Nullability};
use crate::version::Version;

fn version_prefix<V: Version>(f: &mut fmt::Formatter<'_>, version: Option<&V>) -> fmt::Result {
    match version {
        Some(version) => write!(f, "[{}] ", version.literal().unwrap_or_else(|| "*".into())),
        None => Ok(()),
    }
}

fn alternatives<K: Ord + Copy + fmt::Debug, V: Version>(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    table: &Alternatives<K, V>,
) -> fmt::Result {
    if table.is_empty() {
        return Ok(());
    }
    write!(f, " /* {label}:")?;
    for (key, version) in table.iter() {
        write!(f, " {key:?}={}", version.literal().unwrap_or_else(|| "*".into()))?;
    }
    f.write_str(" */")
}

fn access_words(f: &mut fmt::Formatter<'_>, access: Access) -> fmt::Result {
    let words = access.to_string();
    if !words.is_empty() {
        write!(f, "{words} ")?;
    }
    Ok(())
}

fn nullability(f: &mut fmt::Formatter<'_>, value: Nullability) -> fmt::Result {
    match value {
        Nullability::NotNull => f.write_str("@NotNull "),
        Nullability::Nullable => f.write_str("@Nullable "),
        Nullability::Unknown => Ok(()),
    }
}

fn field<V: Version>(f: &mut fmt::Formatter<'_>, field: &FieldEntry<V>) -> fmt::Result {
    f.write_str("  ")?;
    version_prefix(f, field.version.as_ref())?;
    nullability(f, field.nullability)?;
    access_words(f, field.access)?;
    write!(f, "field {}:{}", field.name, field.descriptor)?;
    if let Some(signature) = &field.signature {
        write!(f, " <{signature}>")?;
    }
    alternatives::<Visibility, V>(f, "visibility", &field.alt_visibility)?;
    writeln!(f)
}

fn method<V: Version>(f: &mut fmt::Formatter<'_>, indent: &str, method: &MethodEntry<V>) -> fmt::Result {
    f.write_str(indent)?;
    version_prefix(f, method.version.as_ref())?;
    nullability(f, method.nullability)?;
    access_words(f, method.access)?;
    write!(f, "method {}{}", method.name, method.descriptor)?;
    if let Some(signature) = &method.signature {
        write!(f, " <{signature}>")?;
    }
    if !method.exceptions.is_empty() {
        write!(f, " throws {}", method.exceptions.join(", "))?;
    }
    alternatives::<Visibility, V>(f, "visibility", &method.alt_visibility)?;
    alternatives::<Modality, V>(f, "modality", &method.alt_modality)?;
    writeln!(f)
}

impl<V: Version> fmt::Display for ClassEntry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        version_prefix(f, Some(&self.version))?;
        access_words(f, self.access)?;
        write!(f, "{} {}", self.access.class_kind(), self.name)?;
        if let Some(signature) = &self.signature {
            write!(f, " <{signature}>")?;
        }
        if let Some(super_class) = &self.super_class {
            if !self.access.has(ACC_INTERFACE) {
                write!(f, " extends {super_class}")?;
            }
        }
        if !self.interfaces.is_empty() {
            write!(f, " implements {}", self.interfaces.join(", "))?;
        }
        alternatives::<Visibility, V>(f, "visibility", &self.alt_visibility)?;
        alternatives::<Modality, V>(f, "modality", &self.alt_modality)?;
        writeln!(f, " {{")?;

        for entry in self.fields.values() {
            field(f, entry)?;
        }
        for slot in self.methods.values() {
            match slot {
                MethodSlot::Single(entry) => method(f, "  ", entry)?,
                MethodSlot::Group(variants) => {
                    let first = &variants[0];
                    writeln!(f, "  group {}{} {{", first.name, first.descriptor)?;
                    for entry in variants {
                        method(f, "    ", entry)?;
                    }
                    writeln!(f, "  }}")?;
                }
            }
        }
        f.write_str("}")
    }
}
