//! Frontend session orchestration
//!
//! A session runs in two steps. [`Session::setup`] admits every input buffer
//! under the identity/precedence rules and builds the module loader chain.
//! [`Session::perform_parse`] then processes files in a deterministic order:
//! library files are parsed and bound one after another, the main file is
//! pump-parsed in chunks interleaved with incremental checking, remaining
//! files are checked whole, and deferred bodies are realized last.

use crate::error::FrontendError;
use crate::invocation::{FrontendInvocation, InputKind, InputOrigin, LangConfig};
use crate::loader::{LoaderChain, SerializedLoader};
use crate::target;
use kes_ast::{FrontendContext, IrModule, Module, ModuleId, SourceFile, SourceFileKind};
use kes_buffers::BufferRegistry;
use kes_parser::{DelayedPolicy, ParseState, is_identifier};
use kes_span::BufferId;

/// Observable lifecycle of a session
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SessionState {
    /// Constructed; setup has not run
    Unconfigured,
    /// Setup succeeded; the pipeline may run
    Configured,
    /// The parse phase is running
    Parsing,
    /// The check phase is running, possibly interleaved with parsing
    TypeChecking,
    /// The pipeline finished successfully
    Ready,
    /// Setup or the pipeline failed; the session must not be driven further
    Failed,
}

/// A compilation session: configuration, admitted buffers, loader chain and
/// the module graph under construction
///
/// Single-threaded and not re-entrant; one session drives one pipeline run
/// on the caller's thread.
#[derive(Debug)]
pub struct Session {
    invocation: FrontendInvocation,
    lang: LangConfig,
    state: SessionState,
    context: FrontendContext,
    loaders: LoaderChain,
    buffer_ids: Vec<BufferId>,
    main_buffer: Option<BufferId>,
    primary_buffer: Option<BufferId>,
    main_module: Option<ModuleId>,
    ir_module: Option<IrModule>,
    primary_file: Option<usize>,
}

/// Index of the main file in the module's file list when one exists
const MAIN_FILE: usize = 0;

impl Session {
    /// Creates an unconfigured session for the invocation
    #[must_use]
    pub fn new(invocation: FrontendInvocation) -> Self {
        Self {
            invocation,
            lang: LangConfig::default(),
            state: SessionState::Unconfigured,
            context: FrontendContext::new(BufferRegistry::new()),
            loaders: LoaderChain::default(),
            buffer_ids: Vec::new(),
            main_buffer: None,
            primary_buffer: None,
            main_module: None,
            ir_module: None,
            primary_file: None,
        }
    }

    /// Admits inputs and builds the loader chain
    ///
    /// On failure a diagnostic has already been emitted, the session is
    /// `Failed`, and it must not be driven further.
    ///
    /// # Errors
    ///
    /// Returns a [`FrontendError`] for unknown target triples, input IO
    /// failures and bridge setup failures.
    ///
    /// # Panics
    ///
    /// Panics if setup has already run, or if the configured module name is
    /// not a legal identifier (a caller contract violation).
    pub fn setup(&mut self) -> Result<(), FrontendError> {
        assert!(
            self.state == SessionState::Unconfigured,
            "setup requires an unconfigured session"
        );
        match self.configure() {
            Ok(()) => {
                self.state = SessionState::Configured;
                Ok(())
            }
            Err(error) => {
                self.context
                    .diagnostics
                    .error(error.code(), error.to_string(), None);
                self.state = SessionState::Failed;
                Err(error)
            }
        }
    }

    fn configure(&mut self) -> Result<(), FrontendError> {
        // Pass-through arguments for the low-level toolchain are recorded as
        // a side effect only; they do not influence the frontend.
        if !self.invocation.backend_args.is_empty() {
            tracing::debug!(args = ?self.invocation.backend_args, "forwarding backend tool arguments");
        }

        let (os, arch) = target::derive_target_options(&self.invocation.target_triple)?;
        self.lang
            .target_options
            .insert("os".to_string(), os.to_string());
        self.lang
            .target_options
            .insert("arch".to_string(), arch.to_string());

        self.context = FrontendContext::new(BufferRegistry::new());
        self.loaders = LoaderChain::build(&self.invocation)?;

        assert!(
            is_identifier(&self.invocation.module_name),
            "module name `{}` is not a legal identifier",
            self.invocation.module_name
        );

        let Self {
            invocation,
            context,
            buffer_ids,
            main_buffer,
            primary_buffer,
            ..
        } = self;

        if let Some(completion) = &invocation.code_completion {
            let id = context
                .buffers
                .register_memory(&completion.contents, &completion.identifier);
            buffer_ids.push(id);
            context
                .buffers
                .set_code_completion_point(id, completion.offset);
        }

        let ir_mode = invocation.input_kind == InputKind::LowLevelIr;
        let main_mode = invocation.input_kind == InputKind::Main;
        let primary = invocation.primary_input;

        // Memory inputs go first so they can shadow the contents of a file
        // input sharing the same identifier.
        for (index, input) in invocation.memory_inputs.iter().enumerate() {
            let id = context
                .buffers
                .register_memory(&input.contents, &input.identifier);
            buffer_ids.push(id);

            if ir_mode {
                *main_buffer = Some(id);
            }
            if primary
                .is_some_and(|selected| selected.origin == InputOrigin::Memory && selected.index == index)
            {
                *primary_buffer = Some(id);
            }
        }

        for (index, path) in invocation.file_inputs.iter().enumerate() {
            let is_primary = primary
                .is_some_and(|selected| selected.origin == InputOrigin::File && selected.index == index);
            let names_main = ir_mode
                || (main_mode && path.file_name().is_some_and(|name| name == "main.kes"));

            let identifier = path.display().to_string();
            if let Some(existing) = context.buffers.buffer_id_for_identifier(&identifier) {
                // Shadowed by an earlier buffer; the file is never opened.
                if names_main {
                    *main_buffer = Some(existing);
                }
                if is_primary {
                    *primary_buffer = Some(existing);
                }
                continue;
            }

            let id = context.buffers.register_file(path)?;
            buffer_ids.push(id);
            if names_main {
                *main_buffer = Some(id);
            }
            if is_primary {
                *primary_buffer = Some(id);
            }
        }

        // With exactly one buffer overall and no explicit choice, a main-mode
        // session treats that buffer as the main file.
        if main_mode && main_buffer.is_none() && buffer_ids.len() == 1 {
            *main_buffer = Some(buffer_ids[0]);
        }

        tracing::debug!(
            buffers = buffer_ids.len(),
            main = ?main_buffer,
            primary = ?primary_buffer,
            "session configured"
        );
        Ok(())
    }

    /// Parses every admitted buffer and, unless parse-only, checks the result
    ///
    /// See the module docs for the processing order. On a serialized-load
    /// failure, every remaining input is still attempted before the session
    /// fails; no checking happens afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`FrontendError::SerializedLoad`] when any serialized image
    /// failed to merge.
    ///
    /// # Panics
    ///
    /// Panics unless setup succeeded and the pipeline has not run yet.
    pub fn perform_parse(&mut self) -> Result<(), FrontendError> {
        assert!(
            self.state == SessionState::Configured,
            "perform_parse requires a configured session"
        );
        self.state = SessionState::Parsing;
        match self.run_pipeline() {
            Ok(()) => {
                self.state = SessionState::Ready;
                Ok(())
            }
            Err(error) => {
                self.context
                    .diagnostics
                    .error(error.code(), error.to_string(), None);
                self.state = SessionState::Failed;
                Err(error)
            }
        }
    }

    fn run_pipeline(&mut self) -> Result<(), FrontendError> {
        let module_name = self.context.interner.intern(&self.invocation.module_name);
        let main_module = self.context.create_module(module_name);
        self.main_module = Some(main_module);

        let ir_mode = self.invocation.input_kind == InputKind::LowLevelIr;
        if ir_mode {
            self.ir_module = Some(IrModule::new());
        }

        // A REPL session gets one empty line file; the caller drives
        // subsequent lines itself.
        if self.invocation.input_kind == InputKind::Repl {
            self.context.modules[main_module]
                .add_file(SourceFile::new(SourceFileKind::ReplLine, None));
            return Ok(());
        }

        let policy = self.select_policy();
        let mut state = ParseState::new();

        // The main file must be the first file in the module, but it is
        // parsed last so it can use declarations from every other file.
        if let Some(main_id) = self.main_buffer {
            let kind = if ir_mode {
                SourceFileKind::LowLevelIr
            } else {
                SourceFileKind::Main
            };
            let index = self.context.modules[main_module]
                .add_file(SourceFile::new(kind, Some(main_id)));
            if self.primary_buffer == Some(main_id) {
                self.primary_file = Some(index);
            }
        }

        self.process_library_buffers(main_module, &mut state, &policy)?;
        self.pump_main_file(main_module, &mut state, &policy);

        if !self.invocation.parse_only {
            self.state = SessionState::TypeChecking;
            self.check_remaining_files(main_module);
        }

        if policy.defers() {
            self.run_delayed_pass(main_module, &mut state);
        }

        Ok(())
    }

    fn select_policy(&self) -> DelayedPolicy {
        if let Some((buffer, offset)) = self.context.buffers.code_completion_point() {
            DelayedPolicy::CodeCompletion { buffer, offset }
        } else if self.invocation.delay_all_bodies {
            DelayedPolicy::AlwaysDelayed
        } else {
            DelayedPolicy::None
        }
    }

    /// Parses and binds every non-main buffer, in admission order
    ///
    /// Serialized images are merged directly into the main module. A merge
    /// failure does not stop the loop — every remaining input is attempted to
    /// maximize the diagnostics of one invocation — but it fails the session
    /// before any checking starts. Bindings made before the failure remain
    /// queryable; nothing is rolled back.
    fn process_library_buffers(
        &mut self,
        main_module: ModuleId,
        state: &mut ParseState,
        policy: &DelayedPolicy,
    ) -> Result<(), FrontendError> {
        let mut failed_images = Vec::new();

        for buffer_id in self.buffer_ids.clone() {
            if self.main_buffer == Some(buffer_id) {
                continue;
            }

            let buffer = self.context.buffers.get(buffer_id).clone();
            if SerializedLoader::is_serialized_image(buffer.as_bytes()) {
                let interner = self.context.interner.clone();
                let module = &mut self.context.modules[main_module];
                if let Err(error) =
                    SerializedLoader::load_into(module, buffer.as_bytes(), &interner)
                {
                    tracing::debug!(image = %buffer.identifier, %error, "serialized merge failed");
                    self.context.diagnostics.error(
                        "frontend::serialized_load_failed",
                        format!(
                            "failed to load serialized module `{}`: {error}",
                            buffer.identifier
                        ),
                        None,
                    );
                    failed_images.push(buffer.identifier.clone());
                }
                continue;
            }

            // Library files never chunk: parse fully, then bind, before the
            // next buffer is touched.
            let Self {
                context,
                primary_buffer,
                primary_file,
                ..
            } = self;
            let FrontendContext {
                modules,
                diagnostics,
                interner,
                ..
            } = context;

            let module = &mut modules[main_module];
            let index = module.add_file(SourceFile::new(
                SourceFileKind::Library,
                Some(buffer_id),
            ));
            kes_parser::parse_source_file(
                &mut module.files[index],
                &buffer,
                state,
                policy,
                diagnostics,
                interner,
            );

            let interner_handle = interner.clone();
            kes_bind::bind_top_level_names(module, index, diagnostics, &interner_handle);

            if *primary_buffer == Some(buffer_id) {
                *primary_file = Some(index);
            }
        }

        if failed_images.is_empty() {
            Ok(())
        } else {
            Err(FrontendError::SerializedLoad {
                failed: failed_images,
            })
        }
    }

    /// Pump-parses the main file, checking each chunk as it lands
    ///
    /// Chunk-scoped checking lets later top-level statements see the effects
    /// of earlier ones. Pumps after exhaustion are no-ops.
    fn pump_main_file(
        &mut self,
        main_module: ModuleId,
        state: &mut ParseState,
        policy: &DelayedPolicy,
    ) {
        let Some(main_id) = self.main_buffer else {
            return;
        };

        let buffer = self.context.buffers.get(main_id).clone();
        let check_chunks = !self.invocation.parse_only
            && (self.primary_buffer.is_none() || self.primary_buffer == Some(main_id));

        let mut checked_upto = 0;
        loop {
            let outcome = {
                let Self {
                    context, ir_module, ..
                } = &mut *self;
                let FrontendContext {
                    modules,
                    diagnostics,
                    interner,
                    ..
                } = context;
                let file = &mut modules[main_module].files[MAIN_FILE];
                kes_parser::parse_chunk(
                    file,
                    &buffer,
                    ir_module.as_mut(),
                    state,
                    policy,
                    diagnostics,
                    interner,
                )
            };
            tracing::trace!(appended = outcome.appended, exhausted = outcome.exhausted, "pumped main file");

            if check_chunks {
                self.state = SessionState::TypeChecking;
                kes_check::type_check_chunk(
                    main_module,
                    MAIN_FILE,
                    checked_upto,
                    &mut self.context,
                    &mut self.loaders,
                    &mut state.top_level,
                );
            }
            checked_upto = self.context.modules[main_module].files[MAIN_FILE].decls.len();

            if outcome.exhausted {
                break;
            }
        }
    }

    /// Whole-file checking for everything not already checked chunk-by-chunk
    fn check_remaining_files(&mut self, main_module: ModuleId) {
        let incrementally_checked = (self.main_buffer.is_some()
            && (self.primary_buffer.is_none() || self.primary_buffer == self.main_buffer))
            .then_some(MAIN_FILE);

        let file_count = self.context.modules[main_module].files.len();
        for index in 0..file_count {
            if incrementally_checked == Some(index) {
                continue;
            }
            let file_buffer = self.context.modules[main_module].files[index].buffer;
            if self.primary_buffer.is_none() || self.primary_buffer == file_buffer {
                kes_check::type_check_file(main_module, index, &mut self.context, &mut self.loaders);
            }
        }
    }

    /// Realizes deferred bodies and checks them under the same primary gate
    fn run_delayed_pass(&mut self, main_module: ModuleId, state: &mut ParseState) {
        let file_count = self.context.modules[main_module].files.len();
        for index in 0..file_count {
            let Some(buffer_id) = self.context.modules[main_module].files[index].buffer else {
                continue;
            };
            let buffer = self.context.buffers.get(buffer_id).clone();

            let realized = {
                let FrontendContext {
                    modules,
                    diagnostics,
                    interner,
                    ..
                } = &mut self.context;
                kes_parser::realize_delayed_bodies(
                    &mut modules[main_module].files[index],
                    &buffer,
                    diagnostics,
                    interner,
                )
            };
            if realized.is_empty() {
                continue;
            }
            tracing::debug!(file = index, bodies = realized.len(), "realized delayed bodies");

            if !self.invocation.parse_only
                && (self.primary_buffer.is_none() || self.primary_buffer == Some(buffer_id))
            {
                let scope = (self.main_buffer == Some(buffer_id))
                    .then_some(&mut state.top_level);
                kes_check::type_check_decls(
                    main_module,
                    index,
                    &realized,
                    &mut self.context,
                    &mut self.loaders,
                    scope,
                );
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The invocation the session was created with
    pub fn invocation(&self) -> &FrontendInvocation {
        &self.invocation
    }

    /// Language configuration derived during setup
    pub fn lang_config(&self) -> &LangConfig {
        &self.lang
    }

    /// The shared symbol/diagnostics context
    pub fn context(&self) -> &FrontendContext {
        &self.context
    }

    /// Buffers admitted during setup, in admission order
    pub fn buffer_ids(&self) -> &[BufferId] {
        &self.buffer_ids
    }

    /// The buffer chosen as the main file, if any
    pub fn main_buffer(&self) -> Option<BufferId> {
        self.main_buffer
    }

    /// The buffer singled out for focused checking, if any
    pub fn primary_buffer(&self) -> Option<BufferId> {
        self.primary_buffer
    }

    /// The main module, once `perform_parse` created it
    pub fn main_module(&self) -> Option<&Module> {
        self.main_module.map(|id| &self.context.modules[id])
    }

    /// The low-level-IR container, in low-level-IR mode
    pub fn ir_module(&self) -> Option<&IrModule> {
        self.ir_module.as_ref()
    }

    /// The source file built from the primary buffer, if one was designated
    pub fn primary_file(&self) -> Option<&SourceFile> {
        let module = self.main_module()?;
        module.files.get(self.primary_file?)
    }

    /// Renders every collected diagnostic as rustc-style text
    pub fn render_diagnostics(&self) -> String {
        self.context.diagnostics.render(&self.context.buffers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn session_walks_the_state_machine() {
        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_memory_input(b"let answer = 42;", "input.kes");
        let mut session = Session::new(invocation);
        assert_eq!(session.state(), SessionState::Unconfigured);

        session.setup().unwrap();
        assert_eq!(session.state(), SessionState::Configured);

        session.perform_parse().unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn single_input_becomes_the_main_file() {
        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_memory_input(b"let a = 1;\nlet b = a + 1;", "input.kes");
        let mut session = Session::new(invocation);
        session.setup().unwrap();
        assert_eq!(session.main_buffer(), Some(session.buffer_ids()[0]));

        session.perform_parse().unwrap();
        let module = session.main_module().unwrap();
        assert_eq!(module.files.len(), 1);
        assert_eq!(module.files[MAIN_FILE].kind, SourceFileKind::Main);
        assert_eq!(module.files[MAIN_FILE].decls.len(), 2);
        assert!(!session.context().diagnostics.has_errors());
    }

    #[test]
    fn two_inputs_stay_libraries_without_a_main_name() {
        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_memory_input(b"fn first() {}", "a.kes")
            .with_memory_input(b"fn second() {}", "b.kes");
        let mut session = Session::new(invocation);
        session.setup().unwrap();
        assert_eq!(session.main_buffer(), None);

        session.perform_parse().unwrap();
        let module = session.main_module().unwrap();
        assert_eq!(module.files.len(), 2);
        assert!(module
            .files
            .iter()
            .all(|file| file.kind == SourceFileKind::Library));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn repl_attaches_one_empty_line_file() {
        let invocation = FrontendInvocation::new("repl", InputKind::Repl);
        let mut session = Session::new(invocation);
        session.setup().unwrap();
        session.perform_parse().unwrap();

        let module = session.main_module().unwrap();
        assert_eq!(module.files.len(), 1);
        assert_eq!(module.files[0].kind, SourceFileKind::ReplLine);
        assert!(module.files[0].buffer.is_none());
        assert!(module.files[0].decls.is_empty());
    }

    #[test]
    fn parse_only_suppresses_checking() {
        let source = b"let a = missing_name;";
        let checked = {
            let invocation = FrontendInvocation::new("app", InputKind::Main)
                .with_memory_input(source, "input.kes");
            let mut session = Session::new(invocation);
            session.setup().unwrap();
            session.perform_parse().unwrap();
            session.context().diagnostics.error_count()
        };
        assert_eq!(checked, 1);

        let mut invocation =
            FrontendInvocation::new("app", InputKind::Main).with_memory_input(source, "input.kes");
        invocation.parse_only = true;
        let mut session = Session::new(invocation);
        session.setup().unwrap();
        session.perform_parse().unwrap();
        assert_eq!(session.context().diagnostics.error_count(), 0);
    }

    #[test]
    fn unknown_triple_fails_setup_with_a_diagnostic() {
        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_target_triple("mips-unknown-plan9");
        let mut session = Session::new(invocation);
        let error = session.setup().unwrap_err();
        assert!(matches!(error, FrontendError::UnknownTargetTriple { .. }));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.context().diagnostics.has_errors());
    }

    #[test]
    fn target_options_are_derived_from_the_triple() {
        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_target_triple("arm64-apple-macos14");
        let mut session = Session::new(invocation);
        session.setup().unwrap();
        let options = &session.lang_config().target_options;
        assert_eq!(options.get("os").map(String::as_str), Some("macos"));
        assert_eq!(options.get("arch").map(String::as_str), Some("arm64"));
    }

    #[cfg(not(feature = "foreign-bridge"))]
    #[test]
    fn sdk_path_without_bridge_fails_fast() {
        let mut invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_memory_input(b"let a = 1;", "input.kes");
        invocation.sdk_path = Some("/opt/foreign-sdk".into());
        let mut session = Session::new(invocation);
        let error = session.setup().unwrap_err();
        assert!(matches!(error, FrontendError::BridgeUnavailable { .. }));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn missing_file_input_aborts_setup() {
        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_file_input("no/such/input.kes");
        let mut session = Session::new(invocation);
        let error = session.setup().unwrap_err();
        assert!(matches!(error, FrontendError::Io { .. }));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn main_file_sees_library_declarations_but_not_vice_versa() {
        let dir = tempfile::tempdir().unwrap();
        let main = write_file(&dir, "main.kes", "let seed = 1;\nlib_fn();");
        let lib = write_file(&dir, "lib.kes", "fn lib_fn() {}\nfn bad() { seed; }");

        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_file_input(lib)
            .with_file_input(main);
        let mut session = Session::new(invocation);
        session.setup().unwrap();
        session.perform_parse().unwrap();

        // `lib_fn` resolves from the main file, while the library's
        // reference to the main file's `seed` does not.
        let diagnostics = session.context().diagnostics.diagnostics();
        assert_eq!(session.context().diagnostics.error_count(), 1);
        assert!(diagnostics
            .iter()
            .any(|diagnostic| diagnostic.code == "checker::unknown_name"
                && diagnostic.message.contains("seed")));
    }

    #[test]
    fn corrupt_serialized_image_fails_the_session_after_the_loop() {
        // Valid magic and version, truncated payload.
        let mut bad_image = Vec::new();
        bad_image.extend_from_slice(kes_binary::MAGIC);
        bad_image.push(kes_binary::FORMAT_VERSION);
        bad_image.push(0xFF);

        let invocation = FrontendInvocation::new("app", InputKind::Main)
            .with_memory_input(&bad_image, "broken.kesm")
            .with_memory_input(b"fn later() {}", "later.kes");
        let mut session = Session::new(invocation);
        session.setup().unwrap();

        let error = session.perform_parse().unwrap_err();
        assert!(matches!(error, FrontendError::SerializedLoad { .. }));
        assert_eq!(session.state(), SessionState::Failed);

        // The sibling file was still attempted and bound.
        let module = session.main_module().unwrap();
        assert_eq!(module.files.len(), 1);
        let later = session.context().interner.get("later");
        assert!(later.is_some_and(|name| module.namespace.contains_key(&name)));
    }
}
