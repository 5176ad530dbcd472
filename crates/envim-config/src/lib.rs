//! Shared configuration for the envim client and its binaries.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! TOML file (`--config-path` / `ENVIM_CONFIG_PATH`), then `ENVIM_*`
//! environment variables, then command-line flags.

mod defaults;
mod logging;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_NVIM_ARGS, DEFAULT_NVIM_PROGRAM, default_log_filter,
    default_log_filter_string, default_log_format, default_nvim_args, default_nvim_program,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration shared by the client library and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "ENVIM")]
pub struct Config {
    /// Executable used to start the editor engine.
    #[ortho_config(default = defaults::default_nvim_program())]
    pub nvim_program: Utf8PathBuf,
    /// Arguments passed to the editor engine.
    #[ortho_config(default = defaults::default_nvim_args())]
    pub nvim_args: Vec<String>,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nvim_program: default_nvim_program(),
            nvim_args: default_nvim_args(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Program used to start the editor engine.
    #[must_use]
    pub fn nvim_program(&self) -> &Utf8Path {
        self.nvim_program.as_path()
    }

    /// Arguments passed to the editor engine.
    #[must_use]
    pub fn nvim_args(&self) -> &[String] {
        &self.nvim_args
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn default_config_embeds_headless_nvim() {
        let config = Config::default();

        assert_eq!(config.nvim_program(), Utf8Path::new("nvim"));
        assert_eq!(config.nvim_args(), ["--embed", "--headless"]);
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
    }
}
