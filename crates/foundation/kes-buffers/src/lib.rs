//! Buffer registry for session inputs
//!
//! Owns immutable input content and assigns stable identities. Memory inputs
//! are never deduplicated, even when identifiers collide; file inputs are
//! deduplicated by identifier against everything admitted before them, and a
//! deduplicated file is never opened.

use kes_span::BufferId;
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Where a buffer's content came from
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferOrigin {
    /// Read from the file system during admission
    Disk,
    /// Supplied in memory by the caller
    Memory,
}

/// An immutable named slice of input content
#[derive(Clone, Debug)]
pub struct Buffer {
    /// Stable identity within the owning registry
    pub id: BufferId,
    /// Path or synthetic name identifying the buffer
    pub identifier: String,
    /// Immutable content, copied on admission
    contents: Arc<[u8]>,
    /// Content provenance
    pub origin: BufferOrigin,
}

impl Buffer {
    /// The buffer's raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.contents
    }

    /// The buffer decoded as text, with invalid UTF-8 replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.contents)
    }

    /// Content length in bytes
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

/// Errors raised while admitting buffers
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A file input could not be opened or read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path of the failing input
        path: PathBuf,
        /// Underlying OS error
        source: std::io::Error,
    },
}

/// Append-only registry of admitted input buffers
///
/// Single-writer; the session admits buffers during setup and everything
/// afterwards only reads.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: Vec<Buffer>,
    by_identifier: FxHashMap<String, BufferId>,
    code_completion: Option<(BufferId, u32)>,
}

impl BufferRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits an in-memory input, always under a fresh identity
    ///
    /// The bytes are copied, so the caller may reuse its storage. The
    /// identifier claims the deduplication slot only if no earlier buffer
    /// claimed it; memory inputs themselves are never deduplicated.
    pub fn register_memory(&mut self, bytes: &[u8], identifier: &str) -> BufferId {
        let id = BufferId::new(self.buffers.len() as u32);
        self.buffers.push(Buffer {
            id,
            identifier: identifier.to_string(),
            contents: Arc::from(bytes),
            origin: BufferOrigin::Memory,
        });
        self.by_identifier.entry(identifier.to_string()).or_insert(id);
        id
    }

    /// Admits a file input, deduplicating by identifier
    ///
    /// If the path was already claimed as an identifier (by a prior memory
    /// or file registration) the existing buffer id is returned and the file
    /// is not opened.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Io`] when the file cannot be read.
    pub fn register_file(&mut self, path: &Path) -> Result<BufferId, RegistryError> {
        let identifier = path.display().to_string();
        if let Some(&existing) = self.by_identifier.get(&identifier) {
            return Ok(existing);
        }

        let bytes = std::fs::read(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let id = BufferId::new(self.buffers.len() as u32);
        self.buffers.push(Buffer {
            id,
            identifier: identifier.clone(),
            contents: Arc::from(bytes.as_slice()),
            origin: BufferOrigin::Disk,
        });
        self.by_identifier.insert(identifier, id);
        Ok(id)
    }

    /// Looks up an admitted buffer
    ///
    /// # Panics
    ///
    /// Panics if the id does not belong to this registry.
    #[must_use]
    pub fn get(&self, id: BufferId) -> &Buffer {
        &self.buffers[id.index()]
    }

    /// Buffer id claimed by the given identifier, if any
    pub fn buffer_id_for_identifier(&self, identifier: &str) -> Option<BufferId> {
        self.by_identifier.get(identifier).copied()
    }

    /// Number of admitted buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffers were admitted
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Iterates admitted buffers in admission order
    pub fn iter(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }

    /// Records the code-completion target location
    pub fn set_code_completion_point(&mut self, buffer: BufferId, offset: u32) {
        self.code_completion = Some((buffer, offset));
    }

    /// The recorded code-completion target, if any
    pub fn code_completion_point(&self) -> Option<(BufferId, u32)> {
        self.code_completion
    }
}
