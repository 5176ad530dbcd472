//! Configuration for launching the editor process.

use std::path::PathBuf;

use envim_config::{Config, DEFAULT_NVIM_ARGS, DEFAULT_NVIM_PROGRAM};

/// How to start the editor engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvimConfig {
    /// The executable path or command name.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
}

impl Default for NvimConfig {
    /// `nvim --embed --headless`, resolved through `PATH`.
    fn default() -> Self {
        Self::new(DEFAULT_NVIM_PROGRAM).with_args(DEFAULT_NVIM_ARGS)
    }
}

impl NvimConfig {
    /// Runs `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Replaces the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a custom working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl From<&Config> for NvimConfig {
    fn from(config: &Config) -> Self {
        Self::new(config.nvim_program().as_std_path())
            .with_args(config.nvim_args().iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn default_embeds_headless_nvim() {
        let config = NvimConfig::default();

        assert_eq!(config.program, PathBuf::from("nvim"));
        assert_eq!(config.args, vec!["--embed", "--headless"]);
        assert!(config.working_dir.is_none());
    }

    #[rstest]
    fn with_working_dir_sets_directory() {
        let config = NvimConfig::default().with_working_dir("/tmp/project");

        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp/project")));
    }

    #[rstest]
    fn converts_from_loaded_configuration() {
        let loaded = Config {
            nvim_program: "/opt/nvim/bin/nvim".into(),
            nvim_args: vec!["--embed".to_owned(), "--clean".to_owned()],
            ..Config::default()
        };

        let config = NvimConfig::from(&loaded);

        assert_eq!(config.program, PathBuf::from("/opt/nvim/bin/nvim"));
        assert_eq!(config.args, vec!["--embed", "--clean"]);
    }
}
