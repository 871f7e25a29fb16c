use thiserror::Error;

/// Failure turning class bytes into a snapshot, or a superset entry back into bytes.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Classfile(#[from] apiset_classfile::Error),

    /// Two members with the same name and descriptor inside one class file.
    #[error("duplicate member `{member}` in `{class}`")]
    DuplicateMember { class: String, member: String },
}
