//! Frontend driver for the Kestrel compiler
//!
//! Given a [`FrontendInvocation`] and a set of raw source/binary inputs, a
//! [`Session`] produces parsed, name-bound and (optionally) checked
//! in-memory modules ready for lowering. Clients include batch compilation,
//! REPL-style incremental evaluation and IDE-style single-file analysis.

pub mod bridge;
pub mod error;
pub mod invocation;
pub mod loader;
pub mod session;
pub mod target;

pub use error::FrontendError;
pub use invocation::{
    CodeCompletionTarget, FrontendInvocation, InputKind, InputOrigin, LangConfig, MemoryInput,
    PrimaryInput,
};
pub use loader::{BridgeLoader, LoaderChain, ModuleLoader, SerializedLoader, SourceLoader};
pub use session::{Session, SessionState};
