//! How `envim` renders its log records.
//!
//! Records always go to stderr; the format only decides their shape.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Shape of the log records written to stderr.
///
/// Parsed case-insensitively from `--log-format`, `ENVIM_LOG_FORMAT` or the
/// `log_format` key of the configuration file.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per record, event fields flattened to the top level.
    #[default]
    Json,
    /// One terse line per record for reading editor sessions by eye.
    Compact,
}

impl LogFormat {
    /// Whether records may carry ANSI colour codes.
    ///
    /// JSON records never do, since escape codes would corrupt the fields.
    /// Compact records are coloured only when stderr is a terminal.
    #[must_use]
    pub const fn colours(self, stderr_is_terminal: bool) -> bool {
        match self {
            Self::Json => false,
            Self::Compact => stderr_is_terminal,
        }
    }
}

/// Error returned when a log format name is not recognised.
pub type LogFormatParseError = strum::ParseError;
