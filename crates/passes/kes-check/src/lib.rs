//! Scope checking over parsed files
//!
//! Stands in for type checking in the pipeline: it resolves every name
//! reference and import, with the entry points the driver interleaves with
//! parsing. Chunk-scoped checking threads a [`TopLevelScope`] continuation so
//! later top-level statements of the main file see the effects of earlier
//! ones; whole-file checking resolves library files against their module's
//! fully-bound namespace only.

use kes_ast::{Block, Body, Decl, Expr, FrontendContext, ModuleId, Stmt};
use kes_intern::Symbol;
use kes_parser::TopLevelScope;
use kes_span::{BufferId, BufferSpan, Span};
use rustc_hash::FxHashSet;

/// On-demand import resolution, implemented by the driver's loader chain
pub trait ImportResolver {
    /// Resolves a module by name, materializing it if a loader can
    fn resolve_import(&mut self, name: Symbol, ctx: &mut FrontendContext) -> Option<ModuleId>;
}

/// Resolver that never finds anything; for contexts without a loader chain
#[derive(Debug, Default)]
pub struct NoImports;

impl ImportResolver for NoImports {
    fn resolve_import(&mut self, _name: Symbol, _ctx: &mut FrontendContext) -> Option<ModuleId> {
        None
    }
}

/// Checks the declarations appended since the previous chunk boundary
///
/// `since` is the declaration index the previous boundary ended at. Top-level
/// bindings and functions are introduced into `scope` as they are checked.
pub fn type_check_chunk(
    module: ModuleId,
    file_index: usize,
    since: usize,
    ctx: &mut FrontendContext,
    resolver: &mut dyn ImportResolver,
    scope: &mut TopLevelScope,
) {
    let count = ctx.modules[module].files[file_index].decls.len();
    let mut checker = Checker::new(module, file_index, ctx, resolver, Some(scope));
    for index in since..count {
        checker.check_decl_at(index);
    }
}

/// Checks a whole file, without any sequential top-level scope
pub fn type_check_file(
    module: ModuleId,
    file_index: usize,
    ctx: &mut FrontendContext,
    resolver: &mut dyn ImportResolver,
) {
    let count = ctx.modules[module].files[file_index].decls.len();
    let mut checker = Checker::new(module, file_index, ctx, resolver, None);
    for index in 0..count {
        checker.check_decl_at(index);
    }
}

/// Checks only the given declarations; used after delayed bodies are realized
pub fn type_check_decls(
    module: ModuleId,
    file_index: usize,
    indices: &[usize],
    ctx: &mut FrontendContext,
    resolver: &mut dyn ImportResolver,
    scope: Option<&mut TopLevelScope>,
) {
    let mut checker = Checker::new(module, file_index, ctx, resolver, scope);
    for &index in indices {
        checker.check_decl_at(index);
    }
}

struct Checker<'run> {
    module: ModuleId,
    file_index: usize,
    buffer: Option<BufferId>,
    ctx: &'run mut FrontendContext,
    resolver: &'run mut dyn ImportResolver,
    scope: Option<&'run mut TopLevelScope>,
}

impl<'run> Checker<'run> {
    fn new(
        module: ModuleId,
        file_index: usize,
        ctx: &'run mut FrontendContext,
        resolver: &'run mut dyn ImportResolver,
        scope: Option<&'run mut TopLevelScope>,
    ) -> Self {
        let buffer = ctx.modules[module].files[file_index].buffer;
        Self {
            module,
            file_index,
            buffer,
            ctx,
            resolver,
            scope,
        }
    }

    fn check_decl_at(&mut self, index: usize) {
        // Declarations are appended-only, so a clone of the current entry
        // stays valid while the context is mutated underneath.
        let decl = self.ctx.modules[self.module].files[self.file_index].decls[index].clone();
        match decl {
            Decl::Import { name, span } => self.check_import(name, span),
            Decl::Function {
                name, params, body, ..
            } => {
                if let Body::Parsed(block) = &body {
                    let mut locals: FxHashSet<Symbol> =
                        params.iter().map(|param| param.name).collect();
                    self.check_block(block, &mut locals);
                }
                if let Some(scope) = self.scope.as_deref_mut() {
                    scope.insert(name);
                }
            }
            Decl::Binding { name, value, .. } => {
                self.check_expr(&value, &FxHashSet::default());
                if let Some(scope) = self.scope.as_deref_mut() {
                    scope.insert(name);
                }
            }
            Decl::Expression { value, .. } => {
                self.check_expr(&value, &FxHashSet::default());
            }
        }
    }

    fn check_import(&mut self, name: Symbol, span: Span) {
        if self.ctx.module_by_name(name).is_some() {
            return;
        }
        if self.resolver.resolve_import(name, self.ctx).is_none() {
            let message = format!("cannot find module `{}`", self.ctx.interner.resolve(&name));
            self.error("checker::unresolved_import", message, span);
        }
    }

    fn check_block(&mut self, block: &Block, locals: &mut FxHashSet<Symbol>) {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let { name, value, .. } => {
                    self.check_expr(value, locals);
                    locals.insert(*name);
                }
                Stmt::Expr { value, .. } => self.check_expr(value, locals),
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr, locals: &FxHashSet<Symbol>) {
        match expr {
            Expr::Name { name, span } => {
                if !self.resolves(*name, locals) {
                    let message =
                        format!("cannot find `{}` in this scope", self.ctx.interner.resolve(name));
                    self.error("checker::unknown_name", message, *span);
                }
            }
            Expr::Call { callee, args, .. } => {
                self.check_expr(callee, locals);
                for arg in args {
                    self.check_expr(arg, locals);
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.check_expr(lhs, locals);
                self.check_expr(rhs, locals);
            }
            Expr::Int { .. } | Expr::Str { .. } | Expr::Error { .. } => {}
        }
    }

    /// Name lookup order: locals, the main file's top-level scope, the owning
    /// module's namespace, then the exports and names of loaded modules.
    fn resolves(&self, name: Symbol, locals: &FxHashSet<Symbol>) -> bool {
        if locals.contains(&name) {
            return true;
        }
        if self.scope.as_deref().is_some_and(|scope| scope.contains(name)) {
            return true;
        }
        if self.ctx.modules[self.module].namespace.contains_key(&name) {
            return true;
        }
        self.ctx.module_names.iter().any(|(&module_name, &id)| {
            module_name == name
                || (id != self.module && self.ctx.modules[id].namespace.contains_key(&name))
        })
    }

    fn error(&mut self, code: &'static str, message: String, span: Span) {
        self.ctx.diagnostics.error(
            code,
            message,
            self.buffer.map(|id| BufferSpan::new(id, span)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kes_ast::{SourceFile, SourceFileKind};
    use kes_buffers::BufferRegistry;
    use kes_parser::{DelayedPolicy, ParseState};

    fn context_with_library(source: &str) -> (FrontendContext, ModuleId) {
        let mut ctx = FrontendContext::new(BufferRegistry::new());
        let buffer_id = ctx.buffers.register_memory(source.as_bytes(), "lib.kes");
        let name = ctx.interner.intern("app");
        let module_id = ctx.create_module(name);

        let mut file = SourceFile::new(SourceFileKind::Library, Some(buffer_id));
        let buffer = ctx.buffers.get(buffer_id).clone();
        let mut state = ParseState::new();
        kes_parser::parse_source_file(
            &mut file,
            &buffer,
            &mut state,
            &DelayedPolicy::None,
            &mut ctx.diagnostics,
            &ctx.interner,
        );

        let file_index = ctx.modules[module_id].add_file(file);
        let interner = ctx.interner.clone();
        kes_bind::bind_top_level_names(
            &mut ctx.modules[module_id],
            file_index,
            &mut ctx.diagnostics,
            &interner,
        );
        (ctx, module_id)
    }

    #[test]
    fn library_functions_see_sibling_declarations() {
        let (mut ctx, module) =
            context_with_library("fn caller() { callee(); }\nfn callee() {}");
        type_check_file(module, 0, &mut ctx, &mut NoImports);
        assert!(!ctx.diagnostics.has_errors());
    }

    #[test]
    fn unknown_names_are_diagnosed() {
        let (mut ctx, module) = context_with_library("fn broken() { missing(); }");
        type_check_file(module, 0, &mut ctx, &mut NoImports);
        assert!(ctx.diagnostics.has_errors());
        assert_eq!(ctx.diagnostics.diagnostics()[0].code, "checker::unknown_name");
    }

    #[test]
    fn chunk_checking_threads_the_top_level_scope() {
        let mut ctx = FrontendContext::new(BufferRegistry::new());
        let buffer_id = ctx
            .buffers
            .register_memory(b"let a = 1;\nlet b = a + 1;", "main.kes");
        let name = ctx.interner.intern("app");
        let module_id = ctx.create_module(name);

        let mut file = SourceFile::new(SourceFileKind::Main, Some(buffer_id));
        let buffer = ctx.buffers.get(buffer_id).clone();
        let mut state = ParseState::new();
        let outcome = kes_parser::parse_chunk(
            &mut file,
            &buffer,
            None,
            &mut state,
            &DelayedPolicy::None,
            &mut ctx.diagnostics,
            &ctx.interner,
        );
        assert!(outcome.exhausted);
        ctx.modules[module_id].add_file(file);

        type_check_chunk(module_id, 0, 0, &mut ctx, &mut NoImports, &mut state.top_level);
        assert!(!ctx.diagnostics.has_errors());
        assert_eq!(state.top_level.len(), 2);
    }

    #[test]
    fn imports_resolve_through_the_resolver() {
        struct OneModule {
            exported: &'static str,
        }

        impl ImportResolver for OneModule {
            fn resolve_import(
                &mut self,
                name: Symbol,
                ctx: &mut FrontendContext,
            ) -> Option<ModuleId> {
                let id = ctx.create_module(name);
                let export = ctx.interner.intern(self.exported);
                ctx.modules[id].namespace.insert(
                    export,
                    kes_ast::DefinitionSite::Serialized {
                        image: "core.kesm".to_string(),
                    },
                );
                Some(id)
            }
        }

        let (mut ctx, module) =
            context_with_library("import core;\nfn caller() { core_fn(); }");
        let mut resolver = OneModule {
            exported: "core_fn",
        };
        type_check_file(module, 0, &mut ctx, &mut resolver);
        assert!(!ctx.diagnostics.has_errors());

        let unresolved = ctx.interner.intern("core");
        assert!(ctx.module_by_name(unresolved).is_some());
    }

    #[test]
    fn unresolved_imports_are_diagnosed() {
        let (mut ctx, module) = context_with_library("import ghost;");
        type_check_file(module, 0, &mut ctx, &mut NoImports);
        assert!(ctx.diagnostics.has_errors());
        assert_eq!(
            ctx.diagnostics.diagnostics()[0].code,
            "checker::unresolved_import"
        );
    }

    #[test]
    fn delayed_bodies_are_skipped_until_realized() {
        let mut ctx = FrontendContext::new(BufferRegistry::new());
        let buffer_id = ctx
            .buffers
            .register_memory(b"fn broken() { missing(); }", "lib.kes");
        let name = ctx.interner.intern("app");
        let module_id = ctx.create_module(name);

        let mut file = SourceFile::new(SourceFileKind::Library, Some(buffer_id));
        let buffer = ctx.buffers.get(buffer_id).clone();
        let mut state = ParseState::new();
        kes_parser::parse_source_file(
            &mut file,
            &buffer,
            &mut state,
            &DelayedPolicy::AlwaysDelayed,
            &mut ctx.diagnostics,
            &ctx.interner,
        );
        let file_index = ctx.modules[module_id].add_file(file);

        type_check_file(module_id, file_index, &mut ctx, &mut NoImports);
        assert!(!ctx.diagnostics.has_errors());

        let realized = kes_parser::realize_delayed_bodies(
            &mut ctx.modules[module_id].files[file_index],
            &buffer,
            &mut ctx.diagnostics,
            &ctx.interner,
        );
        type_check_decls(
            module_id,
            file_index,
            &realized,
            &mut ctx,
            &mut NoImports,
            None,
        );
        assert!(ctx.diagnostics.has_errors());
    }
}
