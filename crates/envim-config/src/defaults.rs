use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Program launched when no override is configured.
pub const DEFAULT_NVIM_PROGRAM: &str = "nvim";

/// Arguments that put Neovim into embedded RPC mode on its standard streams.
pub const DEFAULT_NVIM_ARGS: [&str; 2] = ["--embed", "--headless"];

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default program path for the editor engine.
pub fn default_nvim_program() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_NVIM_PROGRAM)
}

/// Default arguments passed to the editor engine.
pub fn default_nvim_args() -> Vec<String> {
    DEFAULT_NVIM_ARGS.iter().map(|arg| (*arg).to_owned()).collect()
}

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}
