//! Target-triple to build-configuration mapping

use crate::error::FrontendError;

/// Derives the `os` and `arch` build-configuration values from a triple
///
/// # Errors
///
/// Returns [`FrontendError::UnknownTargetTriple`] when either the
/// architecture or the operating system component is unrecognized.
pub fn derive_target_options(triple: &str) -> Result<(&'static str, &'static str), FrontendError> {
    let unknown = || FrontendError::UnknownTargetTriple {
        triple: triple.to_string(),
    };

    let mut components = triple.split('-');
    let arch = match components.next() {
        Some("x86_64") => "x86_64",
        Some("i386" | "i686") => "i686",
        Some("aarch64" | "arm64") => "arm64",
        Some("arm" | "armv7") => "arm",
        _ => return Err(unknown()),
    };

    let os = components
        .find_map(|component| {
            if component.starts_with("macos") || component.starts_with("darwin") {
                Some("macos")
            } else if component.starts_with("ios") {
                Some("ios")
            } else if component.starts_with("linux") {
                Some("linux")
            } else if component.starts_with("windows") {
                Some("windows")
            } else {
                None
            }
        })
        .ok_or_else(unknown)?;

    Ok((os, arch))
}
