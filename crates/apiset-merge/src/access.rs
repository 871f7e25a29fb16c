//! Access-flag facets.
//!
//! A raw JVM access word mixes several independent facts. The merger treats visibility,
//! modality and kind separately, so this module projects them out of the word and writes them
//! back without disturbing the other bits.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_NATIVE: u16 = 0x0100;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_STRICT: u16 = 0x0800;
pub const ACC_SYNTHETIC: u16 = 0x1000;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

pub const VISIBILITY_MASK: u16 = ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED;
pub const MODALITY_MASK: u16 = ACC_ABSTRACT | ACC_FINAL;
pub const CLASS_KIND_MASK: u16 = ACC_INTERFACE | ACC_ANNOTATION | ACC_ENUM;
/// Method flags that must agree between versions for two methods to be the same member.
pub const METHOD_KIND_MASK: u16 =
    ACC_BRIDGE | ACC_SYNTHETIC | ACC_STATIC | ACC_NATIVE | ACC_SYNCHRONIZED | ACC_STRICT | ACC_VARARGS;

/// Ordered from narrowest to widest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Private,
    PackagePrivate,
    Protected,
    Public,
}

impl Visibility {
    pub fn from_access(access: u16) -> Self {
        if access & ACC_PUBLIC != 0 {
            Visibility::Public
        } else if access & ACC_PROTECTED != 0 {
            Visibility::Protected
        } else if access & ACC_PRIVATE != 0 {
            Visibility::Private
        } else {
            Visibility::PackagePrivate
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            Visibility::Private => ACC_PRIVATE,
            Visibility::PackagePrivate => 0,
            Visibility::Protected => ACC_PROTECTED,
            Visibility::Public => ACC_PUBLIC,
        }
    }

    /// Enum constant name used in emitted metadata.
    pub fn constant_name(self) -> &'static str {
        match self {
            Visibility::Private => "PRIVATE",
            Visibility::PackagePrivate => "PACKAGE_PRIVATE",
            Visibility::Protected => "PROTECTED",
            Visibility::Public => "PUBLIC",
        }
    }

    pub fn from_constant_name(name: &str) -> Option<Self> {
        match name {
            "PRIVATE" => Some(Visibility::Private),
            "PACKAGE_PRIVATE" => Some(Visibility::PackagePrivate),
            "PROTECTED" => Some(Visibility::Protected),
            "PUBLIC" => Some(Visibility::Public),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Final,
    Open,
    Abstract,
}

impl Modality {
    pub fn from_access(access: u16) -> Self {
        if access & ACC_ABSTRACT != 0 {
            Modality::Abstract
        } else if access & ACC_FINAL != 0 {
            Modality::Final
        } else {
            Modality::Open
        }
    }

    pub fn bits(self) -> u16 {
        match self {
            Modality::Final => ACC_FINAL,
            Modality::Open => 0,
            Modality::Abstract => ACC_ABSTRACT,
        }
    }

    /// Two different modalities only ever widen to [`Modality::Open`].
    pub fn widen(self, other: Modality) -> Modality {
        if self == other {
            self
        } else {
            Modality::Open
        }
    }

    /// Whether `self` permits at least everything `other` permits.
    pub fn is_at_least(self, other: Modality) -> bool {
        self == other || self == Modality::Open
    }

    pub fn constant_name(self) -> &'static str {
        match self {
            Modality::Final => "FINAL",
            Modality::Open => "OPEN",
            Modality::Abstract => "ABSTRACT",
        }
    }

    pub fn from_constant_name(name: &str) -> Option<Self> {
        match name {
            "FINAL" => Some(Modality::Final),
            "OPEN" => Some(Modality::Open),
            "ABSTRACT" => Some(Modality::Abstract),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Class,
    Interface,
    Annotation,
    Enum,
}

impl ClassKind {
    pub fn from_access(access: u16) -> Self {
        if access & ACC_ANNOTATION != 0 {
            ClassKind::Annotation
        } else if access & ACC_INTERFACE != 0 {
            ClassKind::Interface
        } else if access & ACC_ENUM != 0 {
            ClassKind::Enum
        } else {
            ClassKind::Class
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Annotation => "@interface",
            ClassKind::Enum => "enum",
        })
    }
}

/// A JVM access word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Access(pub u16);

impl Access {
    pub fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn visibility(self) -> Visibility {
        Visibility::from_access(self.0)
    }

    pub fn with_visibility(self, visibility: Visibility) -> Self {
        Access((self.0 & !VISIBILITY_MASK) | visibility.bits())
    }

    pub fn modality(self) -> Modality {
        Modality::from_access(self.0)
    }

    pub fn with_modality(self, modality: Modality) -> Self {
        Access((self.0 & !MODALITY_MASK) | modality.bits())
    }

    pub fn class_kind(self) -> ClassKind {
        ClassKind::from_access(self.0)
    }

    pub fn method_kind(self) -> u16 {
        self.0 & METHOD_KIND_MASK
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut words = Vec::new();
        match self.visibility() {
            Visibility::Public => words.push("public"),
            Visibility::Protected => words.push("protected"),
            Visibility::Private => words.push("private"),
            Visibility::PackagePrivate => {}
        }
        if self.has(ACC_STATIC) {
            words.push("static");
        }
        // Interfaces are implicitly abstract.
        if self.has(ACC_ABSTRACT) && !self.has(ACC_INTERFACE) {
            words.push("abstract");
        }
        if self.has(ACC_FINAL) {
            words.push("final");
        }
        if self.has(ACC_NATIVE) {
            words.push("native");
        }
        if self.has(ACC_SYNCHRONIZED) {
            words.push("synchronized");
        }
        f.write_str(&words.join(" "))
    }
}
