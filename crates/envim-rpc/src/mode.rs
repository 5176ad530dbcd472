//! Editor mode descriptors.
//!
//! A descriptor arrives either as a positional array of typed fields or as
//! the map Neovim sends with `mode_info_set`.

use std::fmt;
use std::str::FromStr;

use rmpv::Value;

use crate::decode::{Decode, ValueKind};
use crate::error::DecodeError;

/// Cursor shape shown while a mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorShape {
    /// Full cell block.
    #[default]
    Block,
    /// Horizontal bar.
    Horizontal,
    /// Vertical bar.
    Vertical,
}

impl FromStr for CursorShape {
    type Err = DecodeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "block" => Ok(Self::Block),
            "horizontal" => Ok(Self::Horizontal),
            "vertical" => Ok(Self::Vertical),
            other => Err(DecodeError::UnknownCursorShape {
                name: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for CursorShape {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Block => "block",
            Self::Horizontal => "horizontal",
            Self::Vertical => "vertical",
        })
    }
}

/// Presentation of one editor mode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModeDescriptor {
    /// Full mode name, e.g. `normal`.
    pub name: String,
    /// Abbreviated mode name, e.g. `n`.
    pub short_name: String,
    /// Cursor shape in this mode.
    pub cursor_shape: CursorShape,
    /// Percentage of the cell the cursor occupies.
    pub cell_percentage: u32,
    /// Delay before blinking starts, in milliseconds.
    pub blink_wait: u32,
    /// Time the cursor is shown while blinking, in milliseconds.
    pub blink_on: u32,
    /// Time the cursor is hidden while blinking, in milliseconds.
    pub blink_off: u32,
    /// Highlight group id for the cursor.
    pub hl_id: u32,
    /// Highlight group id for the cursor when a language mapping is active.
    pub id_lm: u32,
}

const FIELD_COUNT: usize = 9;

fn text(value: &Value) -> Result<String, DecodeError> {
    String::decode(value)
}

fn number(value: &Value) -> Result<u32, DecodeError> {
    let wide = i64::decode(value)?;
    u32::try_from(wide).map_err(|_| DecodeError::IntegerOutOfRange {
        value: wide.to_string(),
        target: "u32",
    })
}

impl ModeDescriptor {
    fn from_fields(fields: &[Value]) -> Result<Self, DecodeError> {
        let [
            name,
            short_name,
            cursor_shape,
            cell_percentage,
            blink_wait,
            blink_on,
            blink_off,
            hl_id,
            id_lm,
        ] = fields
        else {
            return Err(DecodeError::Arity {
                expected: FIELD_COUNT,
                actual: fields.len(),
            });
        };
        Ok(Self {
            name: text(name)?,
            short_name: text(short_name)?,
            cursor_shape: text(cursor_shape)?.parse()?,
            cell_percentage: number(cell_percentage)?,
            blink_wait: number(blink_wait)?,
            blink_on: number(blink_on)?,
            blink_off: number(blink_off)?,
            hl_id: number(hl_id)?,
            id_lm: number(id_lm)?,
        })
    }

    fn from_entries(entries: &[(Value, Value)]) -> Result<Self, DecodeError> {
        let mut mode = Self::default();
        for (key, value) in entries {
            match key.as_str() {
                Some("name") => mode.name = text(value)?,
                Some("short_name") => mode.short_name = text(value)?,
                Some("cursor_shape") => mode.cursor_shape = text(value)?.parse()?,
                Some("cell_percentage") => mode.cell_percentage = number(value)?,
                Some("blinkwait") => mode.blink_wait = number(value)?,
                Some("blinkon") => mode.blink_on = number(value)?,
                Some("blinkoff") => mode.blink_off = number(value)?,
                Some("attr_id" | "hl_id") => mode.hl_id = number(value)?,
                Some("id_lm" | "attr_id_lm") => mode.id_lm = number(value)?,
                // Other keys (mouse shapes and the like) are not modelled.
                _ => {}
            }
        }
        Ok(mode)
    }
}

impl Decode for ModeDescriptor {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Array(fields) => Self::from_fields(fields),
            Value::Map(entries) => Self::from_entries(entries),
            other => Err(DecodeError::UnexpectedKind {
                expected: "an array or map of mode fields",
                actual: ValueKind::of(other),
            }),
        }
    }
}
