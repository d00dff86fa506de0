//! Locations of the C headers and CMake package shipped with the crate.
//!
//! Build scripts of embedding hosts use these to find `bindery/version.h`
//! and `binderyConfig.cmake`. Both can be redirected through the
//! environment when the files are installed somewhere else.

use std::ffi::OsString;
use std::path::PathBuf;

/// Overrides [`include_directory`].
pub const INCLUDE_DIR_ENV: &str = "BINDERY_INCLUDE_DIR";

/// Overrides [`cmake_config_directory`].
pub const CMAKE_DIR_ENV: &str = "BINDERY_CMAKE_DIR";

/// Directory containing the `bindery/` headers.
pub fn include_directory() -> PathBuf {
    resolve(std::env::var_os(INCLUDE_DIR_ENV), || {
        package_root().join("include")
    })
}

/// Directory containing `binderyConfig.cmake`.
pub fn cmake_config_directory() -> PathBuf {
    resolve(std::env::var_os(CMAKE_DIR_ENV), || {
        package_root().join("share").join("cmake").join("bindery")
    })
}

fn package_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// An empty override counts as unset.
fn resolve(value: Option<OsString>, default: impl FnOnce() -> PathBuf) -> PathBuf {
    value
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(default)
}
