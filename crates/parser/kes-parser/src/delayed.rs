//! Delayed-parsing policy
//!
//! The parser consults the active policy at each deferrable body boundary.
//! Deferred spans are realized later by an explicit pass over the finished
//! module.

use kes_span::{BufferId, Span};

/// Strategy selecting which bodies are parsed eagerly vs. deferred
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DelayedPolicy {
    /// Parse every body eagerly
    None,
    /// Defer bodies that provably cannot contain the completion target
    CodeCompletion {
        /// Buffer holding the completion target
        buffer: BufferId,
        /// Byte offset of the target within that buffer
        offset: u32,
    },
    /// Defer every deferrable body
    AlwaysDelayed,
}

impl DelayedPolicy {
    /// Whether a body at `span` within `buffer` should be deferred
    pub fn should_delay(&self, buffer: BufferId, span: Span) -> bool {
        match *self {
            Self::None => false,
            Self::CodeCompletion {
                buffer: target_buffer,
                offset,
            } => target_buffer != buffer || !span.contains(offset),
            Self::AlwaysDelayed => true,
        }
    }

    /// Whether the policy defers anything at all
    pub fn defers(&self) -> bool {
        !matches!(self, Self::None)
    }
}
