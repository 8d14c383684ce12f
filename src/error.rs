use thiserror::Error;

/// Errors surfaced by the text engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TextError {
    /// An integer range outside the visible document, or an inverted range.
    #[error("range {from}..{to} out of bounds for document of length {len}")]
    InvalidPosition { from: usize, to: usize, len: usize },

    /// An internal invariant no longer holds. The document cannot repair
    /// itself; the owning replica should discard it.
    #[error("corrupt document state: {0}")]
    CorruptState(&'static str),
}
