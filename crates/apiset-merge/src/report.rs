//! Merge outcome bookkeeping.
//!
//! Every merge attempt is recorded in the scope for the kind of entity being merged. A conflict
//! is caught at the boundary of its own attempt, so one bad method never aborts the rest of its
//! class.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Why a merge attempt was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    GenericsMismatch,
    ClassKindMismatch,
    MethodKindMismatch,
    FieldModalityMismatch,
    OwnerMismatch,
    SuperTypeMismatch,
    OriginMismatch,
    DifferentAnnotationsSameDescriptor,
    DifferentInnerRefsSameDescriptor,
}

impl ConflictKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictKind::GenericsMismatch => "genericsMismatch",
            ConflictKind::ClassKindMismatch => "classKindMismatch",
            ConflictKind::MethodKindMismatch => "methodKindMismatch",
            ConflictKind::FieldModalityMismatch => "fieldModalityMismatch",
            ConflictKind::OwnerMismatch => "ownerMismatch",
            ConflictKind::SuperTypeMismatch => "superTypeMismatch",
            ConflictKind::OriginMismatch => "originMismatch",
            ConflictKind::DifferentAnnotationsSameDescriptor => {
                "differentAnnotationsSameDescriptor"
            }
            ConflictKind::DifferentInnerRefsSameDescriptor => "differentInnerRefsSameDescriptor",
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected merge, before it is attributed to a subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub message: String,
}

impl Conflict {
    pub fn new(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A conflict attributed to the entity it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeFailure {
    pub kind: ConflictKind,
    pub subject: String,
    pub message: String,
}

impl fmt::Display for MergeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}: {}", self.kind, self.subject, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Classes,
    Fields,
    Methods,
    Annotations,
    InnerClassRefs,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 5] = [
        ScopeKind::Classes,
        ScopeKind::Fields,
        ScopeKind::Methods,
        ScopeKind::Annotations,
        ScopeKind::InnerClassRefs,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ScopeKind::Classes => "Classes",
            ScopeKind::Fields => "Fields",
            ScopeKind::Methods => "Methods",
            ScopeKind::Annotations => "Annotations",
            ScopeKind::InnerClassRefs => "Inner class refs",
        }
    }
}

/// Outcomes of every attempt for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeScope {
    success: usize,
    failures: Vec<MergeFailure>,
    /// Conflicts that were reported but did not stop the merge.
    warnings: Vec<MergeFailure>,
}

impl MergeScope {
    /// Counts `result` against this scope, converting a conflict into a recorded failure.
    pub fn record<T>(&mut self, subject: &str, result: Result<T, Conflict>) -> Option<T> {
        match result {
            Ok(value) => {
                self.success += 1;
                Some(value)
            }
            Err(conflict) => {
                tracing::debug!(
                    target: "apiset.merge",
                    kind = conflict.kind.as_str(),
                    subject,
                    message = %conflict.message,
                    "merge attempt rejected"
                );
                self.failures.push(MergeFailure {
                    kind: conflict.kind,
                    subject: subject.to_string(),
                    message: conflict.message,
                });
                None
            }
        }
    }

    pub fn warn(&mut self, subject: &str, conflict: Conflict) {
        tracing::debug!(
            target: "apiset.merge",
            kind = conflict.kind.as_str(),
            subject,
            message = %conflict.message,
            "merge conflict tolerated"
        );
        self.warnings.push(MergeFailure {
            kind: conflict.kind,
            subject: subject.to_string(),
            message: conflict.message,
        });
    }

    pub fn success(&self) -> usize {
        self.success
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.success + self.failures.len()
    }

    pub fn failures(&self) -> &[MergeFailure] {
        &self.failures
    }

    pub fn warnings(&self) -> &[MergeFailure] {
        &self.warnings
    }

    fn absorb(&mut self, other: MergeScope) {
        self.success += other.success;
        self.failures.extend(other.failures);
        self.warnings.extend(other.warnings);
    }

    fn statistics(&self) -> ScopeStatistics {
        let mut by_category = BTreeMap::new();
        for failure in self.failures.iter().chain(self.warnings.iter()) {
            *by_category.entry(failure.kind.as_str().to_string()).or_insert(0) += 1;
        }
        ScopeStatistics {
            success: self.success,
            failed: self.failed(),
            total: self.total(),
            by_category,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub classes: MergeScope,
    pub fields: MergeScope,
    pub methods: MergeScope,
    pub annotations: MergeScope,
    pub inner_class_refs: MergeScope,
}

impl MergeReport {
    pub fn scope(&self, kind: ScopeKind) -> &MergeScope {
        match kind {
            ScopeKind::Classes => &self.classes,
            ScopeKind::Fields => &self.fields,
            ScopeKind::Methods => &self.methods,
            ScopeKind::Annotations => &self.annotations,
            ScopeKind::InnerClassRefs => &self.inner_class_refs,
        }
    }

    /// Every failure and warning across all scopes.
    pub fn conflicts(&self) -> impl Iterator<Item = (ScopeKind, &MergeFailure)> {
        ScopeKind::ALL.into_iter().flat_map(move |kind| {
            let scope = self.scope(kind);
            scope
                .failures
                .iter()
                .chain(scope.warnings.iter())
                .map(move |failure| (kind, failure))
        })
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts().next().is_some()
    }

    /// Folds a report produced by another shard into this one.
    pub fn absorb(&mut self, other: MergeReport) {
        self.classes.absorb(other.classes);
        self.fields.absorb(other.fields);
        self.methods.absorb(other.methods);
        self.annotations.absorb(other.annotations);
        self.inner_class_refs.absorb(other.inner_class_refs);
    }

    pub fn statistics(&self) -> MergeStatistics {
        MergeStatistics {
            scopes: ScopeKind::ALL
                .into_iter()
                .map(|kind| (kind, self.scope(kind).statistics()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeStatistics {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
}

/// Serializable per-scope tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeStatistics {
    pub scopes: BTreeMap<ScopeKind, ScopeStatistics>,
}

impl fmt::Display for MergeStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, stats) in &self.scopes {
            writeln!(f, "{}:", kind.title())?;
            for (category, count) in &stats.by_category {
                writeln!(f, "{category} - {count}")?;
            }
            writeln!(f, "s:{} f:{} t:{}", stats.success, stats.failed, stats.total)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_counts_success_and_failure() {
        let mut scope = MergeScope::default();
        assert_eq!(scope.record::<()>("A", Ok(())), Some(()));
        assert_eq!(
            scope.record::<()>(
                "B",
                Err(Conflict::new(ConflictKind::ClassKindMismatch, "class vs interface"))
            ),
            None
        );
        assert_eq!((scope.success(), scope.failed(), scope.total()), (1, 1, 2));
        assert_eq!(scope.failures()[0].subject, "B");
    }

    #[test]
    fn statistics_render_per_scope() {
        let mut report = MergeReport::default();
        report.classes.record::<()>("A", Ok(()));
        report.classes.record::<()>(
            "B",
            Err(Conflict::new(ConflictKind::SuperTypeMismatch, "x vs y")),
        );
        report
            .classes
            .warn("A", Conflict::new(ConflictKind::OriginMismatch, "plain vs kotlin"));

        let text = report.statistics().to_string();
        assert!(text.starts_with(
            "Classes:\noriginMismatch - 1\nsuperTypeMismatch - 1\ns:1 f:1 t:2\n"
        ));
        assert!(text.contains("Methods:\ns:0 f:0 t:0\n"));
        assert!(report.has_conflicts());
    }

    #[test]
    fn statistics_serialize_to_json() {
        let mut report = MergeReport::default();
        report.methods.record::<()>("m", Ok(()));
        let json = serde_json::to_value(report.statistics()).unwrap();
        assert_eq!(json["scopes"]["methods"]["success"], 1);
        assert_eq!(json["scopes"]["classes"]["total"], 0);
    }
}
