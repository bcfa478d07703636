//! Buffer identities and byte spans

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A unique identifier for an admitted input buffer
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BufferId(pub u32);

impl BufferId {
    /// Creates a buffer id from its raw index
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw index of this buffer in the owning registry
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A byte offset span within a buffer
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: u32,
    /// End byte offset (exclusive)
    pub end: u32,
}

impl Span {
    /// Creates a span from start and end offsets
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// The span as a `usize` range
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Length of the span in bytes
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span covers no bytes
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the given offset falls inside the span
    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// A span with its owning buffer
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BufferSpan {
    /// The buffer the span points into
    pub buffer: BufferId,
    /// Byte span within the buffer
    pub span: Span,
}

impl BufferSpan {
    /// Creates a buffer span
    pub fn new(buffer: BufferId, span: Span) -> Self {
        Self { buffer, span }
    }

    /// The span as a `usize` range
    pub fn range(&self) -> Range<usize> {
        self.span.range()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_contains_is_half_open() {
        let span = Span::new(4, 8);
        assert!(!span.contains(3));
        assert!(span.contains(4));
        assert!(span.contains(7));
        assert!(!span.contains(8));
    }
}
