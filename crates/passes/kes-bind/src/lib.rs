//! Top-level name binding
//!
//! Binding is file-local: it inserts one file's named declarations into the
//! owning module's namespace and never looks at other files. The driver
//! binds each library file immediately after its parse completes, before the
//! next file is parsed, so a library file's bindings can never depend on the
//! main file's declarations.

use kes_ast::{DefinitionSite, Module};
use kes_diag::DiagnosticEngine;
use kes_intern::Interner;
use kes_span::BufferSpan;

/// Binds the named top-level declarations of `module.files[file_index]`
///
/// Duplicate names keep their first binding; later ones are diagnosed.
pub fn bind_top_level_names(
    module: &mut Module,
    file_index: usize,
    diagnostics: &mut DiagnosticEngine,
    interner: &Interner,
) {
    let buffer = module.files[file_index].buffer;
    let named: Vec<_> = module.files[file_index]
        .decls
        .iter()
        .enumerate()
        .filter_map(|(decl_index, decl)| {
            decl.name().map(|name| (decl_index, name, decl.span()))
        })
        .collect();

    for (decl_index, name, span) in named {
        if module.namespace.contains_key(&name) {
            diagnostics.error(
                "binder::duplicate_definition",
                format!("the name `{}` is defined multiple times", interner.resolve(&name)),
                buffer.map(|id| BufferSpan::new(id, span)),
            );
            continue;
        }
        module.namespace.insert(
            name,
            DefinitionSite::File {
                file: file_index,
                decl: decl_index,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kes_ast::{SourceFile, SourceFileKind};
    use kes_buffers::BufferRegistry;
    use kes_parser::{DelayedPolicy, ParseState};

    fn parsed_library(source: &str) -> (Module, DiagnosticEngine, Interner) {
        let mut buffers = BufferRegistry::new();
        let id = buffers.register_memory(source.as_bytes(), "lib.kes");
        let mut diagnostics = DiagnosticEngine::new();
        let interner = Interner::new();
        let mut state = ParseState::new();

        let mut file = SourceFile::new(SourceFileKind::Library, Some(id));
        let buffer = buffers.get(id).clone();
        kes_parser::parse_source_file(
            &mut file,
            &buffer,
            &mut state,
            &DelayedPolicy::None,
            &mut diagnostics,
            &interner,
        );

        let mut module = Module::new(interner.intern("app"));
        module.add_file(file);
        (module, diagnostics, interner)
    }

    #[test]
    fn binds_names_in_declaration_order() {
        let (mut module, mut diagnostics, interner) =
            parsed_library("fn first() {}\nfn second() {}");
        bind_top_level_names(&mut module, 0, &mut diagnostics, &interner);

        let names: Vec<_> = module
            .namespace
            .keys()
            .map(|name| interner.resolve(name))
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn duplicate_names_keep_the_first_binding() {
        let (mut module, mut diagnostics, interner) =
            parsed_library("fn twice() {}\nfn twice() {}");
        bind_top_level_names(&mut module, 0, &mut diagnostics, &interner);

        assert_eq!(module.namespace.len(), 1);
        let name = interner.intern("twice");
        assert_eq!(
            module.namespace.get(&name),
            Some(&DefinitionSite::File { file: 0, decl: 0 })
        );
        assert!(diagnostics.has_errors());
        assert_eq!(
            diagnostics.diagnostics()[0].code,
            "binder::duplicate_definition"
        );
    }
}
