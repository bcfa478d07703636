//! Frontend invocation configuration
//!
//! Plain data assembled by callers; command-line and config-file loading
//! live outside the frontend.

use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// What kind of input the session compiles
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputKind {
    /// A program with a main file whose top-level statements run in order
    Main,
    /// Library sources only; no main file semantics
    Library,
    /// Low-level-IR input pumped alongside ordinary declarations
    LowLevelIr,
    /// Interactive evaluation, one line at a time
    Repl,
}

/// Which input list a [`PrimaryInput`] index points into
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputOrigin {
    /// `memory_inputs`
    Memory,
    /// `file_inputs`
    File,
}

/// Selects the input singled out for focused checking and diagnostics
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PrimaryInput {
    /// Input list the index refers to
    pub origin: InputOrigin,
    /// Index into that list, in original input order
    pub index: usize,
}

/// An in-memory input
#[derive(Clone, Debug)]
pub struct MemoryInput {
    /// Input bytes; copied on admission
    pub contents: Vec<u8>,
    /// Path-like or synthetic name identifying the buffer
    pub identifier: String,
}

/// A code-completion request: a buffer and the offset the cursor sits at
#[derive(Clone, Debug)]
pub struct CodeCompletionTarget {
    /// Contents of the buffer being completed in
    pub contents: Vec<u8>,
    /// Identifier of that buffer
    pub identifier: String,
    /// Byte offset of the completion point
    pub offset: u32,
}

/// Language configuration derived during setup
#[derive(Clone, Debug, Default)]
pub struct LangConfig {
    /// Build-configuration options, e.g. `os` and `arch` from the triple
    pub target_options: FxHashMap<String, String>,
}

/// Everything a session needs to run
#[derive(Clone, Debug)]
pub struct FrontendInvocation {
    /// Name of the module being compiled; must be a legal identifier
    pub module_name: String,
    /// Kind of input being compiled
    pub input_kind: InputKind,
    /// In-memory inputs, admitted before file inputs
    pub memory_inputs: Vec<MemoryInput>,
    /// File inputs, in order
    pub file_inputs: Vec<PathBuf>,
    /// Optional primary-input selector
    pub primary_input: Option<PrimaryInput>,
    /// Optional code-completion target
    pub code_completion: Option<CodeCompletionTarget>,
    /// Arguments passed through to the low-level toolchain
    pub backend_args: Vec<String>,
    /// Target platform triple, e.g. `x86_64-unknown-linux`
    pub target_triple: String,
    /// SDK path for the foreign module bridge
    pub sdk_path: Option<PathBuf>,
    /// Directories probed when resolving imports
    pub import_search_paths: Vec<PathBuf>,
    /// Stop after parsing; perform no checking
    pub parse_only: bool,
    /// Defer every deferrable body
    pub delay_all_bodies: bool,
    /// Enable the embedded-source import loader
    pub allow_raw_source_import: bool,
}

impl FrontendInvocation {
    /// Creates an invocation with empty inputs and default options
    #[must_use]
    pub fn new(module_name: impl Into<String>, input_kind: InputKind) -> Self {
        Self {
            module_name: module_name.into(),
            input_kind,
            memory_inputs: Vec::new(),
            file_inputs: Vec::new(),
            primary_input: None,
            code_completion: None,
            backend_args: Vec::new(),
            target_triple: "x86_64-unknown-linux".to_string(),
            sdk_path: None,
            import_search_paths: Vec::new(),
            parse_only: false,
            delay_all_bodies: false,
            allow_raw_source_import: false,
        }
    }

    /// Adds an in-memory input
    #[must_use]
    pub fn with_memory_input(mut self, contents: &[u8], identifier: impl Into<String>) -> Self {
        self.memory_inputs.push(MemoryInput {
            contents: contents.to_vec(),
            identifier: identifier.into(),
        });
        self
    }

    /// Adds a file input
    #[must_use]
    pub fn with_file_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_inputs.push(path.into());
        self
    }

    /// Selects the primary input
    #[must_use]
    pub fn with_primary_input(mut self, origin: InputOrigin, index: usize) -> Self {
        self.primary_input = Some(PrimaryInput { origin, index });
        self
    }

    /// Sets the code-completion target
    #[must_use]
    pub fn with_code_completion(
        mut self,
        contents: &[u8],
        identifier: impl Into<String>,
        offset: u32,
    ) -> Self {
        self.code_completion = Some(CodeCompletionTarget {
            contents: contents.to_vec(),
            identifier: identifier.into(),
            offset,
        });
        self
    }

    /// Sets the target triple
    #[must_use]
    pub fn with_target_triple(mut self, triple: impl Into<String>) -> Self {
        self.target_triple = triple.into();
        self
    }

    /// Adds an import search path
    #[must_use]
    pub fn with_import_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.import_search_paths.push(path.into());
        self
    }

    /// Whether the invocation is interactive/interpreted
    ///
    /// Interactive invocations make the embedded-source loader eager.
    pub fn is_interactive(&self) -> bool {
        self.input_kind == InputKind::Repl
    }
}
