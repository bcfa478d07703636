//! Serialized module images
//!
//! A pre-compiled module is stored as a small binary image: a 4-byte magic,
//! one format-version byte, then a bincode payload listing the module's
//! exports. Images are merged into a module rather than parsed.

use bincode::{Decode, Encode};
use kes_ast::{DefinitionSite, Module};
use kes_intern::Interner;
use thiserror::Error;

/// Magic bytes opening every serialized module image
pub const MAGIC: &[u8; 4] = b"KESM";

/// Current image format version
pub const FORMAT_VERSION: u8 = 1;

/// Payload of a serialized module image
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq)]
pub struct BinaryModule {
    /// Name the module was compiled under
    pub name: String,
    /// Exported top-level names
    pub exports: Vec<String>,
}

/// Errors raised while reading or writing images
#[derive(Debug, Error)]
pub enum BinaryModuleError {
    /// The bytes do not start with the image magic
    #[error("not a serialized module image")]
    NotAnImage,
    /// The image was written by an incompatible format version
    #[error("unsupported image format version {found} (expected {FORMAT_VERSION})")]
    UnsupportedVersion {
        /// Version byte found in the image
        found: u8,
    },
    /// The payload failed to decode
    #[error("malformed image payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The payload failed to encode
    #[error("image payload could not be encoded: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// Whether the bytes look like a serialized module image
///
/// Only the magic is probed; a corrupt payload still answers `true` here and
/// fails later in [`read_module`].
pub fn is_serialized_image(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

/// Encodes a module into image bytes
///
/// # Errors
///
/// Returns [`BinaryModuleError::Encode`] when the payload cannot be encoded.
pub fn write_module(module: &BinaryModule) -> Result<Vec<u8>, BinaryModuleError> {
    let mut bytes = Vec::with_capacity(MAGIC.len() + 1);
    bytes.extend_from_slice(MAGIC);
    bytes.push(FORMAT_VERSION);
    bytes.extend(bincode::encode_to_vec(module, bincode::config::standard())?);
    Ok(bytes)
}

/// Decodes image bytes back into a [`BinaryModule`]
///
/// # Errors
///
/// Returns an error when the magic, version or payload is invalid.
pub fn read_module(bytes: &[u8]) -> Result<BinaryModule, BinaryModuleError> {
    if !is_serialized_image(bytes) {
        return Err(BinaryModuleError::NotAnImage);
    }
    let version = bytes
        .get(MAGIC.len())
        .copied()
        .ok_or(BinaryModuleError::NotAnImage)?;
    if version != FORMAT_VERSION {
        return Err(BinaryModuleError::UnsupportedVersion { found: version });
    }

    let payload = &bytes[MAGIC.len() + 1..];
    let (module, _consumed) = bincode::decode_from_slice(payload, bincode::config::standard())?;
    Ok(module)
}

/// Merges a serialized image directly into `module`
///
/// Exports join the module namespace (existing bindings win) and the image
/// name is recorded in the module's loaded-binaries list.
///
/// # Errors
///
/// Propagates every [`read_module`] failure; the module is untouched on
/// error.
pub fn load_serialized_into(
    module: &mut Module,
    bytes: &[u8],
    interner: &Interner,
) -> Result<(), BinaryModuleError> {
    let image = read_module(bytes)?;

    for export in &image.exports {
        let name = interner.intern(export);
        module
            .namespace
            .entry(name)
            .or_insert_with(|| DefinitionSite::Serialized {
                image: image.name.clone(),
            });
    }
    module.loaded_binaries.push(image.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BinaryModule {
        BinaryModule {
            name: "core".to_string(),
            exports: vec!["core_init".to_string(), "core_shutdown".to_string()],
        }
    }

    #[test]
    fn round_trips_through_image_bytes() {
        let bytes = write_module(&sample()).unwrap();
        assert!(is_serialized_image(&bytes));
        assert_eq!(read_module(&bytes).unwrap(), sample());
    }

    #[test]
    fn source_text_is_not_an_image() {
        assert!(!is_serialized_image(b"fn main() {}"));
        assert!(!is_serialized_image(b"KE"));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut bytes = write_module(&sample()).unwrap();
        bytes[MAGIC.len()] = FORMAT_VERSION + 1;
        assert!(matches!(
            read_module(&bytes),
            Err(BinaryModuleError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn truncated_payload_fails_to_decode() {
        let bytes = write_module(&sample()).unwrap();
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(
            read_module(truncated),
            Err(BinaryModuleError::Decode(_))
        ));
    }

    #[test]
    fn merging_fills_namespace_and_loaded_binaries() {
        let interner = Interner::new();
        let mut module = Module::new(interner.intern("app"));
        let bytes = write_module(&sample()).unwrap();

        load_serialized_into(&mut module, &bytes, &interner).unwrap();

        assert_eq!(module.loaded_binaries, vec!["core".to_string()]);
        let export = interner.intern("core_init");
        assert!(matches!(
            module.namespace.get(&export),
            Some(DefinitionSite::Serialized { image }) if image == "core"
        ));
    }
}
