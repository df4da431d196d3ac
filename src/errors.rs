//! Fatal conditions a Boolean operation can report.

/// All the ways a CSG call can fail.
///
/// Neither variant is recoverable: both indicate a malformed input tree or
/// an internal bookkeeping bug, so callers should treat them as fatal.
/// Missing cursors and degenerate geometry are absorbed silently and never
/// surface here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsgError {
    /// Classification against a BSP tree exceeded its iteration bound,
    /// which only happens on a pathological (e.g. cyclic or degenerate)
    /// tree.
    #[error("malformed BSP tree: classification exceeded {iterations} iterations")]
    MalformedTree { iterations: usize },

    /// Batch deletion was asked to remove a triangle past the end of the
    /// index buffer. Offsets are collected by the operation resolver, so
    /// this is a resolver bookkeeping bug.
    #[error("triangle offset {offset} out of range (index buffer len = {len})")]
    TriangleOutOfRange { offset: usize, len: usize },
}
