//! The shared symbol/diagnostics context

use crate::module::{Module, ModuleId, ModuleMap};
use indexmap::IndexMap;
use kes_buffers::BufferRegistry;
use kes_diag::DiagnosticEngine;
use kes_intern::{Interner, Symbol};

/// Shared state threaded explicitly through every frontend phase
///
/// Bound to the buffer registry at construction. Sessions construct one
/// context each, so they stay independently constructible and destroyable;
/// nothing here is ambient or global. All mutation is single-writer and
/// monotonic: buffers, modules and diagnostics are appended, never removed.
#[derive(Debug)]
pub struct FrontendContext {
    /// Registry of admitted input buffers
    pub buffers: BufferRegistry,
    /// Interner for identifiers and module names
    pub interner: Interner,
    /// Collected diagnostics
    pub diagnostics: DiagnosticEngine,
    /// Every module materialized during the session
    pub modules: ModuleMap,
    /// Global module namespace, in registration order
    pub module_names: IndexMap<Symbol, ModuleId>,
}

impl FrontendContext {
    /// Creates a context bound to the given registry
    #[must_use]
    pub fn new(buffers: BufferRegistry) -> Self {
        Self {
            buffers,
            interner: Interner::new(),
            diagnostics: DiagnosticEngine::new(),
            modules: ModuleMap::default(),
            module_names: IndexMap::new(),
        }
    }

    /// Materializes an empty module and registers it in the global namespace
    pub fn create_module(&mut self, name: Symbol) -> ModuleId {
        let id = self.modules.alloc(Module::new(name));
        self.module_names.insert(name, id);
        id
    }

    /// Looks up a registered module by name
    pub fn module_by_name(&self, name: Symbol) -> Option<ModuleId> {
        self.module_names.get(&name).copied()
    }
}
