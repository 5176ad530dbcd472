//! Typed decoding of response payloads.
//!
//! A response's result field reaches [`Decode`] exactly as the editor sent
//! it, so each decoder checks the payload shape itself: scalars reject
//! arrays, lists and positions require one, and `()` requires nil. List
//! decoders apply the element type's [`Decode`] to each item.

use std::fmt;

use rmpv::Value;
use tracing::{error, warn};

use crate::codec::read_one;
use crate::error::DecodeError;
use crate::types::{Buffer, ObjectHandle, ObjectKind, Position, Tabpage, Window};

/// Log target for decoding.
pub(crate) const DECODE_TARGET: &str = "envim_rpc::decode";

/// Coarse classification of a generic msgpack value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Integer that fits `u64`.
    PositiveInteger,
    /// Integer below zero.
    NegativeInteger,
    /// `true` or `false`.
    Boolean,
    /// Raw string (UTF-8 or not).
    String,
    /// Binary blob.
    Binary,
    /// Array of values.
    Array,
    /// Map of values.
    Map,
    /// Typed extension value.
    Extension,
    /// `nil`.
    Nil,
    /// 32 or 64 bit float.
    Float,
}

impl ValueKind {
    /// Classifies a value.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Nil => Self::Nil,
            Value::Boolean(_) => Self::Boolean,
            Value::Integer(integer) if integer.as_i64().is_some_and(|n| n < 0) => {
                Self::NegativeInteger
            }
            Value::Integer(_) => Self::PositiveInteger,
            Value::F32(_) | Value::F64(_) => Self::Float,
            Value::String(_) => Self::String,
            Value::Binary(_) => Self::Binary,
            Value::Array(_) => Self::Array,
            Value::Map(_) => Self::Map,
            Value::Ext(..) => Self::Extension,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::PositiveInteger => "a positive integer",
            Self::NegativeInteger => "a negative integer",
            Self::Boolean => "a boolean",
            Self::String => "a string",
            Self::Binary => "binary data",
            Self::Array => "an array",
            Self::Map => "a map",
            Self::Extension => "an extension value",
            Self::Nil => "nil",
            Self::Float => "a float",
        })
    }
}

/// Conversion of a result payload, or of one element of a list payload.
pub trait Decode: Sized {
    /// Converts `value`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the value has the wrong shape.
    fn decode(value: &Value) -> Result<Self, DecodeError>;
}

fn unexpected(expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::UnexpectedKind {
        expected,
        actual: ValueKind::of(value),
    }
}

impl Decode for bool {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Boolean(flag) => Ok(*flag),
            other => Err(unexpected("a boolean", other)),
        }
    }
}

impl Decode for i64 {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Integer(integer) => {
                integer
                    .as_i64()
                    .ok_or_else(|| DecodeError::IntegerOutOfRange {
                        value: integer.to_string(),
                        target: "i64",
                    })
            }
            other => Err(unexpected("an integer", other)),
        }
    }
}

impl Decode for String {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::String(text) => text
                .as_str()
                .map(str::to_owned)
                .ok_or(DecodeError::InvalidUtf8),
            other => Err(unexpected("a string", other)),
        }
    }
}

/// Void calls answer with nil; anything else is a shape error.
impl Decode for () {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Nil => Ok(()),
            other => Err(unexpected("nil", other)),
        }
    }
}

/// Reads the identifier packed inside a handle's extension payload.
///
/// Neovim packs the id as a msgpack integer. Payloads that are not a single
/// msgpack integer are read as a little-endian integer of up to eight bytes.
fn handle_id(payload: &[u8]) -> Option<i64> {
    if let Ok(Some((Value::Integer(integer), consumed))) = read_one(payload)
        && consumed == payload.len()
    {
        return integer.as_i64();
    }
    if payload.is_empty() || payload.len() > 8 {
        return None;
    }
    let mut raw = [0_u8; 8];
    raw.get_mut(..payload.len())?.copy_from_slice(payload);
    #[expect(
        clippy::little_endian_bytes,
        reason = "handle payloads that are not msgpack are little-endian integers"
    )]
    let id = i64::from_le_bytes(raw);
    Some(id)
}

fn handle_of(value: &Value, expected: Option<ObjectKind>) -> Result<ObjectHandle, DecodeError> {
    let Value::Ext(tag, payload) = value else {
        return Err(unexpected("an extension value", value));
    };
    let kind = ObjectKind::from_tag(*tag).ok_or(DecodeError::UnknownHandleTag { tag: *tag })?;
    if let Some(wanted) = expected
        && wanted != kind
    {
        return Err(DecodeError::HandleKind {
            expected: wanted,
            tag: *tag,
        });
    }
    let id = handle_id(payload).ok_or(DecodeError::HandlePayload {
        kind,
        len: payload.len(),
    })?;
    Ok(ObjectHandle { kind, id })
}

impl Decode for ObjectHandle {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        handle_of(value, None)
    }
}

macro_rules! decode_handle {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Decode for $ty {
                fn decode(value: &Value) -> Result<Self, DecodeError> {
                    handle_of(value, Some(Self::KIND)).map(|handle| Self(handle.id))
                }
            }
        )*
    };
}

decode_handle!(Buffer, Window, Tabpage);

/// Arrays that are not exactly two integers decode to [`Position::INVALID`]
/// and are logged; payloads that are not arrays at all are rejected.
impl Decode for Position {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        let Value::Array(fields) = value else {
            return Err(unexpected("an array of two integers", value));
        };
        let position = match fields.as_slice() {
            [Value::Integer(first), Value::Integer(second)] => first
                .as_i64()
                .zip(second.as_i64())
                .map(|(x, y)| Self::new(x, y)),
            _ => None,
        };
        Ok(position.unwrap_or_else(|| {
            error!(
                target: DECODE_TARGET,
                len = fields.len(),
                "position payload is not two integers"
            );
            Self::INVALID
        }))
    }
}

/// A list whose malformed elements were skipped.
///
/// Each element is decoded independently; failures are logged and counted
/// rather than aborting the whole list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialList<T> {
    /// Elements that decoded successfully, in payload order.
    pub items: Vec<T>,
    /// Number of elements that were skipped.
    pub skipped: usize,
}

impl<T> PartialList<T> {
    /// Whether every element decoded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.skipped == 0
    }

    /// Consumes the list, returning the decoded elements.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T> Default for PartialList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            skipped: 0,
        }
    }
}

impl<T: Decode> PartialList<T> {
    /// Decodes every element of `values`, skipping the ones that fail.
    #[must_use]
    pub fn from_elements(values: &[Value]) -> Self {
        let mut list = Self::default();
        for (index, value) in values.iter().enumerate() {
            match T::decode(value) {
                Ok(item) => list.items.push(item),
                Err(error) => {
                    warn!(target: DECODE_TARGET, index, %error, "skipping list element");
                    list.skipped += 1;
                }
            }
        }
        list
    }
}

/// The payload itself must be an array; only its elements may be skipped.
impl<T: Decode> Decode for PartialList<T> {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Array(values) => Ok(Self::from_elements(values)),
            other => Err(unexpected("an array", other)),
        }
    }
}

/// Placeholder for results of dynamic shape: dictionaries, mixed lists and
/// arbitrary objects.
///
/// Decoding always fails with [`DecodeError::Unsupported`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Object;

impl Decode for Object {
    fn decode(value: &Value) -> Result<Self, DecodeError> {
        error!(
            target: DECODE_TARGET,
            kind = %ValueKind::of(value),
            "generic object payloads are not decoded"
        );
        Err(DecodeError::Unsupported {
            what: "generic object",
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn ext(tag: i8, payload: &[u8]) -> Value {
        Value::Ext(tag, payload.to_vec())
    }

    fn array(values: Vec<Value>) -> Value {
        Value::Array(values)
    }

    #[rstest]
    fn bool_decodes_boolean() {
        assert_eq!(bool::decode(&Value::from(true)), Ok(true));
    }

    #[rstest]
    fn bool_rejects_integer() {
        assert_eq!(
            bool::decode(&Value::from(1_i64)),
            Err(DecodeError::UnexpectedKind {
                expected: "a boolean",
                actual: ValueKind::PositiveInteger,
            })
        );
    }

    #[rstest]
    #[case::positive(Value::from(42_u64), 42)]
    #[case::negative(Value::from(-7_i64), -7)]
    fn integers_accept_both_signs(#[case] value: Value, #[case] expected: i64) {
        assert_eq!(i64::decode(&value), Ok(expected));
    }

    #[rstest]
    fn integers_reject_values_beyond_i64() {
        assert!(matches!(
            i64::decode(&Value::from(u64::MAX)),
            Err(DecodeError::IntegerOutOfRange { .. })
        ));
    }

    #[rstest]
    fn integers_reject_a_one_element_array() {
        assert_eq!(
            i64::decode(&array(vec![Value::from(5_i64)])),
            Err(DecodeError::UnexpectedKind {
                expected: "an integer",
                actual: ValueKind::Array,
            })
        );
    }

    #[rstest]
    fn strings_decode_to_owned_text() {
        assert_eq!(String::decode(&Value::from("hello")), Ok("hello".to_owned()));
    }

    #[rstest]
    fn strings_reject_arrays_of_strings() {
        assert!(matches!(
            String::decode(&array(vec![Value::from("a")])),
            Err(DecodeError::UnexpectedKind { .. })
        ));
    }

    #[rstest]
    fn unit_accepts_nil() {
        assert_eq!(<()>::decode(&Value::Nil), Ok(()));
    }

    #[rstest]
    #[case::empty_array(array(Vec::new()), ValueKind::Array)]
    #[case::integer(Value::from(0_u64), ValueKind::PositiveInteger)]
    fn unit_rejects_anything_but_nil(#[case] value: Value, #[case] actual: ValueKind) {
        assert_eq!(
            <()>::decode(&value),
            Err(DecodeError::UnexpectedKind {
                expected: "nil",
                actual
            })
        );
    }

    #[rstest]
    fn position_decodes_pair() {
        assert_eq!(
            Position::decode(&array(vec![Value::from(3_i64), Value::from(7_i64)])),
            Ok(Position::new(3, 7))
        );
    }

    #[rstest]
    #[case::one_element(vec![Value::from(3_i64)])]
    #[case::three_elements(vec![Value::from(1_i64), Value::from(2_i64), Value::from(3_i64)])]
    #[case::wrong_kind(vec![Value::from("3"), Value::from(7_i64)])]
    fn position_mismatch_yields_sentinel(#[case] fields: Vec<Value>) {
        assert_eq!(Position::decode(&array(fields)), Ok(Position::INVALID));
    }

    #[rstest]
    fn position_rejects_scalars() {
        assert!(matches!(
            Position::decode(&Value::from(3_i64)),
            Err(DecodeError::UnexpectedKind { .. })
        ));
    }

    #[rstest]
    fn buffer_reads_msgpack_payload() {
        assert_eq!(Buffer::decode(&ext(1, &[0x05])), Ok(Buffer(5)));
    }

    #[rstest]
    fn window_reads_wide_msgpack_payload() {
        // uint16 1000
        assert_eq!(Window::decode(&ext(2, &[0xcd, 0x03, 0xe8])), Ok(Window(1000)));
    }

    #[rstest]
    fn handle_falls_back_to_little_endian_payload() {
        assert_eq!(
            Tabpage::decode(&ext(3, &[0xe8, 0x03, 0x00, 0x00])),
            Ok(Tabpage(1000))
        );
    }

    #[rstest]
    fn buffer_rejects_window_tag() {
        assert_eq!(
            Buffer::decode(&ext(2, &[0x05])),
            Err(DecodeError::HandleKind {
                expected: ObjectKind::Buffer,
                tag: 2
            })
        );
    }

    #[rstest]
    fn handle_rejects_oversized_payload() {
        assert_eq!(
            Buffer::decode(&ext(1, &[0xc1; 9])),
            Err(DecodeError::HandlePayload {
                kind: ObjectKind::Buffer,
                len: 9
            })
        );
    }

    #[rstest]
    fn object_handle_keeps_kind() {
        assert_eq!(
            ObjectHandle::decode(&ext(3, &[0x02])),
            Ok(ObjectHandle {
                kind: ObjectKind::Tabpage,
                id: 2
            })
        );
    }

    #[rstest]
    fn object_handle_rejects_unknown_tag() {
        assert_eq!(
            ObjectHandle::decode(&ext(9, &[0x02])),
            Err(DecodeError::UnknownHandleTag { tag: 9 })
        );
    }

    #[rstest]
    fn lists_skip_malformed_elements() {
        let list = PartialList::<Buffer>::decode(&array(vec![
            ext(1, &[0x01]),
            Value::from("not a handle"),
            ext(2, &[0x03]),
            ext(1, &[0x04]),
        ]))
        .expect("array payload");

        assert_eq!(list.items, vec![Buffer(1), Buffer(4)]);
        assert_eq!(list.skipped, 2);
        assert!(!list.is_complete());
    }

    #[rstest]
    fn string_lists_decode_every_element() {
        let list = PartialList::<String>::decode(&array(vec![Value::from("a"), Value::from("b")]))
            .expect("array payload");

        assert!(list.is_complete());
        assert_eq!(list.into_items(), vec!["a".to_owned(), "b".to_owned()]);
    }

    #[rstest]
    fn lists_reject_a_bare_scalar() {
        assert_eq!(
            PartialList::<String>::decode(&Value::from("not a list")),
            Err(DecodeError::UnexpectedKind {
                expected: "an array",
                actual: ValueKind::String,
            })
        );
    }

    #[rstest]
    fn generic_objects_are_unsupported() {
        assert!(matches!(
            Object::decode(&Value::Map(Vec::new())),
            Err(DecodeError::Unsupported { .. })
        ));
    }

    #[rstest]
    #[case(Value::Nil, ValueKind::Nil)]
    #[case(Value::from(-1_i64), ValueKind::NegativeInteger)]
    #[case(Value::from(0_u64), ValueKind::PositiveInteger)]
    #[case(Value::from(1.5_f64), ValueKind::Float)]
    #[case(Value::Binary(vec![1]), ValueKind::Binary)]
    fn classifies_values(#[case] value: Value, #[case] expected: ValueKind) {
        assert_eq!(ValueKind::of(&value), expected);
    }
}
