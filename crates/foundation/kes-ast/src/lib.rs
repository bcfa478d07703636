//! In-memory artifacts built by the frontend
//!
//! Declarations, source files and modules are the artifacts a session
//! produces; [`FrontendContext`] is the shared symbol/diagnostics context
//! threaded explicitly through every phase.

mod context;
mod decl;
mod module;

pub use context::FrontendContext;
pub use decl::{BinOp, Block, Body, Decl, Expr, Param, Stmt};
pub use module::{
    DefinitionSite, IrDef, IrModule, Module, ModuleId, ModuleMap, SourceFile, SourceFileKind,
};
