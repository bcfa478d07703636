//! Session test infrastructure
//!
//! [`SessionFixture`] assembles an invocation from in-memory and on-disk
//! inputs, materializing the latter in a temporary directory that doubles as
//! the import search path. Tests drive the resulting [`Harness`] through
//! setup and parse themselves, so intermediate states stay observable.

use anyhow::{Context as _, Result};
use kes_frontend::{FrontendInvocation, InputKind, InputOrigin, Session};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Declarative builder for a session under test
#[derive(Debug)]
pub struct SessionFixture {
    module_name: String,
    kind: InputKind,
    disk_files: Vec<(String, Vec<u8>)>,
    file_inputs: Vec<String>,
    memory_inputs: Vec<(Vec<u8>, String)>,
    primary: Option<(InputOrigin, usize)>,
    completion: Option<(Vec<u8>, String, u32)>,
    target_triple: Option<String>,
    sdk_path: Option<PathBuf>,
    parse_only: bool,
    delay_all_bodies: bool,
    allow_raw_source_import: bool,
}

impl SessionFixture {
    /// Creates a main-kind fixture for the given module name
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            kind: InputKind::Main,
            disk_files: Vec::new(),
            file_inputs: Vec::new(),
            memory_inputs: Vec::new(),
            primary: None,
            completion: None,
            target_triple: None,
            sdk_path: None,
            parse_only: false,
            delay_all_bodies: false,
            allow_raw_source_import: false,
        }
    }

    /// Sets the input kind
    #[must_use]
    pub fn kind(mut self, kind: InputKind) -> Self {
        self.kind = kind;
        self
    }

    /// Writes a file into the fixture directory and adds it as a file input
    #[must_use]
    pub fn file_input(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        self.disk_files.push((name.clone(), contents.into()));
        self.file_inputs.push(name);
        self
    }

    /// Adds a file input without creating it on disk
    #[must_use]
    pub fn missing_file_input(mut self, name: impl Into<String>) -> Self {
        self.file_inputs.push(name.into());
        self
    }

    /// Writes a file into the fixture directory without making it an input
    ///
    /// Loaders find such files through the import search path.
    #[must_use]
    pub fn disk_only(mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.disk_files.push((name.into(), contents.into()));
        self
    }

    /// Adds an in-memory input
    #[must_use]
    pub fn memory_input(
        mut self,
        contents: impl Into<Vec<u8>>,
        identifier: impl Into<String>,
    ) -> Self {
        self.memory_inputs.push((contents.into(), identifier.into()));
        self
    }

    /// Selects the primary input
    #[must_use]
    pub fn primary(mut self, origin: InputOrigin, index: usize) -> Self {
        self.primary = Some((origin, index));
        self
    }

    /// Sets a code-completion target
    #[must_use]
    pub fn completion(
        mut self,
        contents: impl Into<Vec<u8>>,
        identifier: impl Into<String>,
        offset: u32,
    ) -> Self {
        self.completion = Some((contents.into(), identifier.into(), offset));
        self
    }

    /// Overrides the target triple
    #[must_use]
    pub fn target_triple(mut self, triple: impl Into<String>) -> Self {
        self.target_triple = Some(triple.into());
        self
    }

    /// Configures an SDK path for the foreign bridge
    #[must_use]
    pub fn sdk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sdk_path = Some(path.into());
        self
    }

    /// Enables parse-only mode
    #[must_use]
    pub fn parse_only(mut self) -> Self {
        self.parse_only = true;
        self
    }

    /// Defers every deferrable body
    #[must_use]
    pub fn delay_all_bodies(mut self) -> Self {
        self.delay_all_bodies = true;
        self
    }

    /// Enables the embedded-source import loader
    #[must_use]
    pub fn allow_raw_source_import(mut self) -> Self {
        self.allow_raw_source_import = true;
        self
    }

    /// Materializes the fixture directory and builds the session
    ///
    /// The session is returned unconfigured; tests drive `setup` and
    /// `perform_parse` themselves.
    ///
    /// # Errors
    ///
    /// Fails when the fixture directory cannot be created or written.
    pub fn build(self) -> Result<Harness> {
        let dir = TempDir::new().context("creating fixture directory")?;
        for (name, contents) in &self.disk_files {
            let path = dir.path().join(name);
            fs::write(&path, contents).with_context(|| format!("writing fixture file {name}"))?;
        }

        let mut invocation = FrontendInvocation::new(self.module_name, self.kind);
        invocation.import_search_paths.push(dir.path().to_path_buf());
        for (contents, identifier) in &self.memory_inputs {
            invocation = invocation.with_memory_input(contents, identifier.clone());
        }
        for name in &self.file_inputs {
            invocation = invocation.with_file_input(dir.path().join(name));
        }
        if let Some((origin, index)) = self.primary {
            invocation = invocation.with_primary_input(origin, index);
        }
        if let Some((contents, identifier, offset)) = &self.completion {
            invocation = invocation.with_code_completion(contents, identifier.clone(), *offset);
        }
        if let Some(triple) = self.target_triple {
            invocation = invocation.with_target_triple(triple);
        }
        invocation.sdk_path = self.sdk_path;
        invocation.parse_only = self.parse_only;
        invocation.delay_all_bodies = self.delay_all_bodies;
        invocation.allow_raw_source_import = self.allow_raw_source_import;

        Ok(Harness {
            session: Session::new(invocation),
            dir,
        })
    }
}

/// A session plus the fixture directory backing its file inputs
///
/// The directory must outlive the session: loaders read import files from it
/// lazily during the parse phase.
#[derive(Debug)]
pub struct Harness {
    /// The session under test
    pub session: Session,
    dir: TempDir,
}

impl Harness {
    /// Absolute path of a fixture file, as used for buffer identifiers
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
