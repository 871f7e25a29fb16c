//! Library half of the `apiset` binary: reading version roots and running the merge.

pub mod input;
pub mod pipeline;
