//! Merging of per-version JVM class snapshots into one API superset.
//!
//! Each input version contributes class snapshots decoded from its class files. The
//! [`Superset`] folds them together by class name; every class, field and method ends up
//! annotated with the versions it exists in, visibility and modality are widened to the most
//! permissive variant (remembering which versions were narrower), and generic signatures that
//! drifted between versions are unified. The result is written back as class files carrying
//! that version evidence.

#![forbid(unsafe_code)]

pub mod access;
pub mod codec;
mod error;
pub mod generics;
pub mod grouping;
pub mod merger;
pub mod model;
mod presentation;
pub mod provider;
pub mod report;
pub mod superset;
pub mod version;

pub use crate::access::{Access, ClassKind, Modality, Visibility};
pub use crate::codec::{decode_class, encode_class, from_class_file, to_class_file, EncodeOptions};
pub use crate::error::CodecError;
pub use crate::grouping::ClassGrouper;
pub use crate::merger::{MergeOptions, Merger};
pub use crate::model::{
    member_key, Alternatives, Annotations, ClassEntry, FieldEntry, InnerClassRef, MethodEntry,
    MethodSlot, Nullability, Origin, ParameterInfo,
};
pub use crate::provider::{is_reference_allowed, ClassReadVersionInfo, VersionInfoProvider};
pub use crate::report::{
    Conflict, ConflictKind, MergeFailure, MergeReport, MergeScope, MergeStatistics, ScopeKind,
    ScopeStatistics,
};
pub use crate::superset::{merge_sharded, AppendOutcome, Superset};
pub use crate::version::{plus_opt, TagSet, TagSetLoader, Version, VersionLoader};
