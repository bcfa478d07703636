//! Source files, modules and the low-level-IR container

use crate::decl::Decl;
use indexmap::IndexMap;
use kes_intern::Symbol;
use kes_span::{BufferId, Span};

/// What role a source file plays within its module
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SourceFileKind {
    /// The file whose top-level statements run sequentially
    Main,
    /// A non-main file, fully parsed and bound before the main file
    Library,
    /// One interactively evaluated line
    ReplLine,
    /// Low-level-IR input pumped alongside ordinary declarations
    LowLevelIr,
}

/// An in-memory source file being built by the frontend
#[derive(Clone, Debug)]
pub struct SourceFile {
    /// Role of the file
    pub kind: SourceFileKind,
    /// Backing buffer; `None` for files with no input yet (REPL)
    pub buffer: Option<BufferId>,
    /// Parsed declarations, appended in source order
    pub decls: Vec<Decl>,
    /// Whether the parser has consumed the whole buffer
    pub parse_complete: bool,
}

impl SourceFile {
    /// Creates an empty source file over an optional buffer
    #[must_use]
    pub fn new(kind: SourceFileKind, buffer: Option<BufferId>) -> Self {
        Self {
            kind,
            buffer,
            decls: Vec::new(),
            parse_complete: false,
        }
    }
}

/// Where a name in a module namespace is defined
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DefinitionSite {
    /// A declaration in one of the module's source files
    File {
        /// Index into `Module::files`
        file: usize,
        /// Index into that file's `decls`
        decl: usize,
    },
    /// An export merged from a serialized module image
    Serialized {
        /// Identifier of the image the export came from
        image: String,
    },
    /// An export provided by the foreign module bridge
    Foreign {
        /// Name of the foreign module providing the export
        module: String,
    },
}

/// A module under construction
///
/// File order is significant: the main file, when present, is first in the
/// list even though it is parsed last.
#[derive(Debug)]
pub struct Module {
    /// Module name
    pub name: Symbol,
    /// Files in attachment order
    pub files: Vec<SourceFile>,
    /// Top-level names bound so far, in binding order
    pub namespace: IndexMap<Symbol, DefinitionSite>,
    /// Identifiers of serialized images merged into this module
    pub loaded_binaries: Vec<String>,
}

impl Module {
    /// Creates an empty module
    #[must_use]
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            files: Vec::new(),
            namespace: IndexMap::new(),
            loaded_binaries: Vec::new(),
        }
    }

    /// Attaches a file, returning its index in the file list
    pub fn add_file(&mut self, file: SourceFile) -> usize {
        self.files.push(file);
        self.files.len() - 1
    }
}

/// Identifier of a module in the session's module arena
pub type ModuleId = la_arena::Idx<Module>;

/// Arena owning every module materialized during a session
pub type ModuleMap = la_arena::Arena<Module>;

/// One low-level-IR definition captured by the pump
#[derive(Clone, Debug)]
pub struct IrDef {
    /// Definition name
    pub name: Symbol,
    /// Span of the whole definition
    pub span: Span,
    /// Span of the brace-delimited body
    pub body: Span,
}

/// Container for low-level-IR definitions parsed from the main file
#[derive(Debug, Default)]
pub struct IrModule {
    /// Definitions in source order
    pub definitions: Vec<IrDef>,
}

impl IrModule {
    /// Creates an empty container
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
