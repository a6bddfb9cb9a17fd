//! Host platform (linux for example) utility functions

use std::env;
use std::path::PathBuf;
use thiserror::Error;
use uname;

/// The environment variable giving the root of the software installation.
pub const SW_ROOT_ENV_VAR: &str = "SUSF_DEIMOS_SW_ROOT";

/// Possible errors associated with host queries.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("The software root environment variable ({}) is not set", SW_ROOT_ENV_VAR)]
    SwRootNotSet,
}

/// Retrieve uname information.
pub fn get_uname() -> std::io::Result<uname::Info> {
    uname::uname()
}

/// Get the root directory of the software installation.
///
/// This is read from the `SUSF_DEIMOS_SW_ROOT` environment variable, which
/// must point at the directory containing `params/` and `sessions/`.
pub fn get_deimos_sw_root() -> Result<PathBuf, HostError> {
    match env::var(SW_ROOT_ENV_VAR) {
        Ok(p) => Ok(PathBuf::from(p)),
        Err(_) => Err(HostError::SwRootNotSet),
    }
}
