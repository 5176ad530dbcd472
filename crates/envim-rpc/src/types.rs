//! Domain values carried by editor responses.

use std::fmt;

use rmpv::Value;

/// Kinds of opaque editor object handles, tagged on the wire by an
/// extension type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// Extension tag 1.
    Buffer,
    /// Extension tag 2.
    Window,
    /// Extension tag 3.
    Tabpage,
}

impl ObjectKind {
    /// Extension tag used on the wire.
    #[must_use]
    pub const fn tag(self) -> i8 {
        match self {
            Self::Buffer => 1,
            Self::Window => 2,
            Self::Tabpage => 3,
        }
    }

    /// Maps an extension tag to a handle kind.
    #[must_use]
    pub const fn from_tag(tag: i8) -> Option<Self> {
        match tag {
            1 => Some(Self::Buffer),
            2 => Some(Self::Window),
            3 => Some(Self::Tabpage),
            _ => None,
        }
    }

    /// Lower-case name used in logs and errors.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Window => "window",
            Self::Tabpage => "tabpage",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A handle of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    /// Which kind of object the handle refers to.
    pub kind: ObjectKind,
    /// Identifier assigned by the editor.
    pub id: i64,
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.kind, self.id)
    }
}

macro_rules! typed_handle {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub i64);

        impl $name {
            /// Kind carried by this handle on the wire.
            pub const KIND: ObjectKind = $kind;

            /// Identifier assigned by the editor.
            #[must_use]
            pub const fn id(self) -> i64 {
                self.0
            }

            /// Erases the static kind.
            #[must_use]
            pub const fn handle(self) -> ObjectHandle {
                ObjectHandle {
                    kind: Self::KIND,
                    id: self.0,
                }
            }
        }

        impl From<$name> for ObjectHandle {
            fn from(value: $name) -> Self {
                value.handle()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.handle().fmt(formatter)
            }
        }
    };
}

typed_handle! {
    /// A buffer handle (extension tag 1).
    Buffer => ObjectKind::Buffer
}

typed_handle! {
    /// A window handle (extension tag 2).
    Window => ObjectKind::Window
}

typed_handle! {
    /// A tabpage handle (extension tag 3).
    Tabpage => ObjectKind::Tabpage
}

/// A 2D coordinate, such as a cursor or window position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    /// First coordinate (row for cursors).
    pub x: i64,
    /// Second coordinate (column for cursors).
    pub y: i64,
}

impl Position {
    /// Sentinel returned when a payload could not be read as a position.
    pub const INVALID: Self = Self::new(-1, -1);

    /// Builds a position.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Whether this is anything other than [`Position::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        !(self.x == Self::INVALID.x && self.y == Self::INVALID.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "({}, {})", self.x, self.y)
    }
}

/// Conversion of call arguments into wire values.
pub trait IntoValue {
    /// Produces the wire value for `self`.
    fn into_value(self) -> Value;
}

macro_rules! into_value_via_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

into_value_via_from!(bool, i32, i64, u32, u64, usize, String, &str, Value);

impl IntoValue for Position {
    fn into_value(self) -> Value {
        Value::Array(vec![Value::from(self.x), Value::from(self.y)])
    }
}

// Handles go out as their plain integer id.
impl IntoValue for ObjectHandle {
    fn into_value(self) -> Value {
        Value::from(self.id)
    }
}

impl IntoValue for Buffer {
    fn into_value(self) -> Value {
        Value::from(self.0)
    }
}

impl IntoValue for Window {
    fn into_value(self) -> Value {
        Value::from(self.0)
    }
}

impl IntoValue for Tabpage {
    fn into_value(self) -> Value {
        Value::from(self.0)
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(IntoValue::into_value).collect())
    }
}

/// Builds an argument array from values implementing [`IntoValue`].
///
/// ```ignore
/// let args = envim_rpc::args![buffer, 0_i64, -1_i64, false];
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        ::std::vec![$($crate::IntoValue::into_value($arg)),*]
    };
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::buffer(ObjectKind::Buffer, 1)]
    #[case::window(ObjectKind::Window, 2)]
    #[case::tabpage(ObjectKind::Tabpage, 3)]
    fn object_kind_tags_round_trip(#[case] kind: ObjectKind, #[case] tag: i8) {
        assert_eq!(kind.tag(), tag);
        assert_eq!(ObjectKind::from_tag(tag), Some(kind));
    }

    #[rstest]
    #[case(0)]
    #[case(4)]
    #[case(-1)]
    fn unknown_tags_have_no_kind(#[case] tag: i8) {
        assert_eq!(ObjectKind::from_tag(tag), None);
    }

    #[rstest]
    fn typed_handles_erase_to_object_handles() {
        let handle = ObjectHandle::from(Window(1000));

        assert_eq!(handle.kind, ObjectKind::Window);
        assert_eq!(handle.id, 1000);
        assert_eq!(handle.to_string(), "window 1000");
    }

    #[rstest]
    fn invalid_position_is_not_valid() {
        assert!(!Position::INVALID.is_valid());
        assert!(Position::new(0, 0).is_valid());
    }

    #[rstest]
    fn position_encodes_as_pair() {
        assert_eq!(
            Position::new(3, 7).into_value(),
            Value::Array(vec![Value::from(3_i64), Value::from(7_i64)])
        );
    }

    #[rstest]
    fn args_macro_encodes_handles_as_integers() {
        let args = crate::args![Buffer(5), "text", true];

        assert_eq!(
            args,
            vec![Value::from(5_i64), Value::from("text"), Value::from(true)]
        );
    }

    #[rstest]
    fn string_lists_encode_as_arrays() {
        let value = vec!["a".to_owned(), "b".to_owned()].into_value();

        assert_eq!(
            value,
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
    }
}
