//! Module loader chain
//!
//! A closed, ordered set of import-resolution strategies fixed at setup
//! time. Resolution queries loaders in registration order; the first loader
//! able to satisfy an import wins.

use crate::error::FrontendError;
use crate::invocation::FrontendInvocation;
use kes_ast::{DefinitionSite, FrontendContext, Module, ModuleId, SourceFile, SourceFileKind};
use kes_binary::BinaryModuleError;
use kes_check::ImportResolver;
use kes_intern::{Interner, Symbol};
use kes_parser::{DelayedPolicy, ParseState};
use std::path::PathBuf;

/// Resolves imports from raw source files on the import search paths
#[derive(Debug)]
pub struct SourceLoader {
    /// Whether loaded sources are parsed in full at resolve time
    ///
    /// Lazy loading parses declarations but delays every body.
    pub eager: bool,
    search_paths: Vec<PathBuf>,
}

impl SourceLoader {
    fn resolve(&self, name: Symbol, ctx: &mut FrontendContext) -> Option<ModuleId> {
        let file_name = format!("{}.kes", ctx.interner.resolve(&name));
        let path = self
            .search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())?;

        let buffer_id = match ctx.buffers.register_file(&path) {
            Ok(id) => id,
            Err(error) => {
                ctx.diagnostics
                    .error("loader::import_io_error", error.to_string(), None);
                return None;
            }
        };

        tracing::debug!(path = %path.display(), eager = self.eager, "loading raw source import");

        let module_id = ctx.create_module(name);
        let policy = if self.eager {
            DelayedPolicy::None
        } else {
            DelayedPolicy::AlwaysDelayed
        };

        let mut file = SourceFile::new(SourceFileKind::Library, Some(buffer_id));
        let buffer = ctx.buffers.get(buffer_id).clone();
        let mut state = ParseState::new();
        kes_parser::parse_source_file(
            &mut file,
            &buffer,
            &mut state,
            &policy,
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
        Some(module_id)
    }
}

/// Resolves imports from serialized module images on the search paths
///
/// Also provides the image-detection and direct-merge entry points the
/// session uses for binary inputs.
#[derive(Debug)]
pub struct SerializedLoader {
    search_paths: Vec<PathBuf>,
}

impl SerializedLoader {
    /// Whether the bytes look like a serialized module image
    pub fn is_serialized_image(bytes: &[u8]) -> bool {
        kes_binary::is_serialized_image(bytes)
    }

    /// Merges an image directly into an existing module
    ///
    /// # Errors
    ///
    /// Propagates the codec failure; the module is untouched on error.
    pub fn load_into(
        module: &mut Module,
        bytes: &[u8],
        interner: &Interner,
    ) -> Result<(), BinaryModuleError> {
        kes_binary::load_serialized_into(module, bytes, interner)
    }

    fn resolve(&self, name: Symbol, ctx: &mut FrontendContext) -> Option<ModuleId> {
        let file_name = format!("{}.kesm", ctx.interner.resolve(&name));
        let path = self
            .search_paths
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())?;

        let buffer_id = match ctx.buffers.register_file(&path) {
            Ok(id) => id,
            Err(error) => {
                ctx.diagnostics
                    .error("loader::import_io_error", error.to_string(), None);
                return None;
            }
        };

        let buffer = ctx.buffers.get(buffer_id).clone();
        let module_id = ctx.create_module(name);
        let interner = ctx.interner.clone();
        match Self::load_into(&mut ctx.modules[module_id], buffer.as_bytes(), &interner) {
            Ok(()) => Some(module_id),
            Err(error) => {
                ctx.diagnostics.error(
                    "loader::bad_image",
                    format!("failed to load `{}`: {error}", buffer.identifier),
                    None,
                );
                None
            }
        }
    }
}

/// Resolves imports backed by another language's native module format
///
/// The bridge internals stay behind this thin loader: a foreign module is
/// visible here as a manifest of exported names under the configured SDK.
#[derive(Debug)]
pub struct BridgeLoader {
    sdk: Option<PathBuf>,
}

impl BridgeLoader {
    /// Creates a bridge over an optional SDK path
    #[must_use]
    pub fn new(sdk: Option<PathBuf>) -> Self {
        Self { sdk }
    }

    fn resolve(&self, name: Symbol, ctx: &mut FrontendContext) -> Option<ModuleId> {
        let sdk = self.sdk.as_ref()?;
        let module_name = ctx.interner.resolve(&name);
        let path = sdk.join(format!("{module_name}.fml"));
        let manifest = std::fs::read_to_string(&path).ok()?;

        tracing::debug!(path = %path.display(), "loading foreign module manifest");

        let module_id = ctx.create_module(name);
        let module = &mut ctx.modules[module_id];
        for line in manifest.lines() {
            let export = line.trim();
            if export.is_empty() {
                continue;
            }
            let symbol = ctx.interner.intern(export);
            module.namespace.insert(
                symbol,
                DefinitionSite::Foreign {
                    module: module_name.clone(),
                },
            );
        }
        Some(module_id)
    }
}

/// One import-resolution strategy in the chain
#[derive(Debug)]
pub enum ModuleLoader {
    /// Raw source imports (present only when enabled)
    EmbeddedSource(SourceLoader),
    /// Serialized module images (always present)
    SerializedBinary(SerializedLoader),
    /// Foreign-interop bridge (present only when the build provides it)
    ForeignBridge(BridgeLoader),
}

impl ModuleLoader {
    fn resolve(&mut self, name: Symbol, ctx: &mut FrontendContext) -> Option<ModuleId> {
        match self {
            Self::EmbeddedSource(loader) => loader.resolve(name, ctx),
            Self::SerializedBinary(loader) => loader.resolve(name, ctx),
            Self::ForeignBridge(loader) => loader.resolve(name, ctx),
        }
    }
}

/// The ordered loader chain, fixed at setup time
#[derive(Debug, Default)]
pub struct LoaderChain {
    loaders: Vec<ModuleLoader>,
}

impl LoaderChain {
    /// Builds the chain for an invocation
    ///
    /// # Errors
    ///
    /// Fails fast when an SDK path is configured but the build carries no
    /// bridge, or when the bridge constructor itself fails.
    pub fn build(invocation: &FrontendInvocation) -> Result<Self, FrontendError> {
        let mut loaders = Vec::new();

        if invocation.allow_raw_source_import {
            loaders.push(ModuleLoader::EmbeddedSource(SourceLoader {
                eager: invocation.is_interactive(),
                search_paths: invocation.import_search_paths.clone(),
            }));
        }

        loaders.push(ModuleLoader::SerializedBinary(SerializedLoader {
            search_paths: invocation.import_search_paths.clone(),
        }));

        match crate::bridge::bridge_constructor() {
            Some(construct) => {
                let bridge = construct(&invocation.target_triple, invocation.sdk_path.as_deref())
                    .map_err(|message| FrontendError::BridgeCreation { message })?;
                loaders.push(ModuleLoader::ForeignBridge(bridge));
            }
            None => {
                if let Some(sdk) = &invocation.sdk_path {
                    return Err(FrontendError::BridgeUnavailable { sdk: sdk.clone() });
                }
            }
        }

        Ok(Self { loaders })
    }

    /// Resolves an import by querying loaders in registration order
    pub fn resolve(&mut self, name: Symbol, ctx: &mut FrontendContext) -> Option<ModuleId> {
        self.loaders
            .iter_mut()
            .find_map(|loader| loader.resolve(name, ctx))
    }

    /// The loaders in registration order
    pub fn loaders(&self) -> &[ModuleLoader] {
        &self.loaders
    }
}

impl ImportResolver for LoaderChain {
    fn resolve_import(&mut self, name: Symbol, ctx: &mut FrontendContext) -> Option<ModuleId> {
        self.resolve(name, ctx)
    }
}
