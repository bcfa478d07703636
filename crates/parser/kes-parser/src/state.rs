//! Re-entrant parser bookkeeping
//!
//! One [`ParseState`] exists per frontend run and is threaded through every
//! parse call for every file, in file-processing order. For the main file it
//! also survives across repeated pump calls. Never shared across sessions and
//! not re-entrant from multiple threads.

use kes_intern::Symbol;
use kes_span::{BufferId, Span};
use rustc_hash::{FxHashMap, FxHashSet};

/// Top-level names visible so far in the main file
///
/// Shared continuation between the parser and the incremental checker:
/// bindings made by earlier chunks are visible to later ones.
#[derive(Debug, Default)]
pub struct TopLevelScope {
    names: FxHashSet<Symbol>,
}

impl TopLevelScope {
    /// Creates an empty scope
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Introduces a name; returns `false` if it was already present
    pub fn insert(&mut self, name: Symbol) -> bool {
        self.names.insert(name)
    }

    /// Whether a name has been introduced
    pub fn contains(&self, name: Symbol) -> bool {
        self.names.contains(&name)
    }

    /// Number of introduced names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no names have been introduced
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A function body deferred by the delayed-parsing policy
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DelayedBody {
    /// Buffer the body lives in
    pub buffer: BufferId,
    /// Span of the brace-delimited body
    pub span: Span,
}

/// Parser bookkeeping threaded across all files of one frontend run
#[derive(Debug, Default)]
pub struct ParseState {
    offsets: FxHashMap<BufferId, usize>,
    delayed: Vec<DelayedBody>,
    /// Top-level continuation for the main file's chunked checking
    pub top_level: TopLevelScope,
}

impl ParseState {
    /// Creates fresh state for one run
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset at which the next pump over the buffer resumes
    pub fn resume_offset(&self, buffer: BufferId) -> usize {
        self.offsets.get(&buffer).copied().unwrap_or(0)
    }

    /// Stores the pump resume offset for a buffer
    pub fn set_resume_offset(&mut self, buffer: BufferId, offset: usize) {
        self.offsets.insert(buffer, offset);
    }

    /// Records a deferred body for the delayed pass
    pub fn record_delayed(&mut self, body: DelayedBody) {
        self.delayed.push(body);
    }

    /// Bodies deferred so far, in the order they were encountered
    pub fn delayed_bodies(&self) -> &[DelayedBody] {
        &self.delayed
    }
}
