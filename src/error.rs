use thiserror::Error;




/**
 * Error type for invalid boxes, patch layouts, and attribute usage. Every
 * error is raised by the call that detects the violation; nothing is retried
 * and nothing is partially applied.
 */
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid index range: {0}")]
    InvalidRange(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("patch box {new} overlaps sibling patch {sibling} with box {existing}")]
    Overlap {
        new: String,
        sibling: usize,
        existing: String,
    },

    #[error("refinement factor must be at least 1 on every axis, got {0:?}")]
    InvalidFactor(Vec<i64>),

    #[error("node {0} does not belong to this tree")]
    UnknownNode(usize),

    #[error("attribute storage is not allocated; call alloc() first")]
    UnallocatedAttribute,

    #[error("attribute storage is already allocated")]
    AlreadyAllocated,

    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    #[error("no field named '{0}'")]
    UnknownField(String),

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("encoding error: {0}")]
    Encode(String),
}




/**
 * Result alias used throughout the crate.
 */
pub type Result<T, E = Error> = std::result::Result<T, E>;
