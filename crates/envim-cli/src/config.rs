//! Configuration loading for the CLI.

use std::ffi::OsString;

use envim_config::Config;
use ortho_config::OrthoConfig;

use crate::errors::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from the full argument list, program name
    /// included.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

/// Layers defaults, the configuration file, `ENVIM_*` variables and flags.
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}
