//! Foreign module bridge availability
//!
//! Whether a bridge exists is a property of the host build, not of the
//! invocation: builds without the `foreign-bridge` feature expose no
//! constructor, and configuring an SDK path against such a build fails
//! setup immediately.

use crate::loader::BridgeLoader;
use std::path::Path;

/// Constructor the host build may provide for the foreign bridge
pub type BridgeConstructor =
    fn(triple: &str, sdk: Option<&Path>) -> Result<BridgeLoader, String>;

/// The bridge constructor compiled into this build, if any
#[cfg(feature = "foreign-bridge")]
pub fn bridge_constructor() -> Option<BridgeConstructor> {
    Some(create_bridge)
}

/// The bridge constructor compiled into this build, if any
#[cfg(not(feature = "foreign-bridge"))]
pub fn bridge_constructor() -> Option<BridgeConstructor> {
    None
}

#[cfg(feature = "foreign-bridge")]
fn create_bridge(_triple: &str, sdk: Option<&Path>) -> Result<BridgeLoader, String> {
    if let Some(sdk) = sdk
        && !sdk.is_dir()
    {
        return Err(format!("SDK path `{}` is not a directory", sdk.display()));
    }
    Ok(BridgeLoader::new(sdk.map(Path::to_path_buf)))
}
