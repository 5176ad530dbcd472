//! Msgpack-RPC framing.
//!
//! Outgoing calls are written as msgpack arrays into a reusable output
//! buffer. Incoming stdout data arrives in arbitrary chunks, so the
//! [`FrameDecoder`] accumulates bytes until a whole message can be read and
//! hands back one generic [`Value`] per message.

use std::fmt;
use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rmpv::Value;
use tracing::warn;

use crate::error::CodecError;

/// Log target for codec operations.
pub(crate) const CODEC_TARGET: &str = "envim_rpc::codec";

/// Upper bound on the bytes buffered for a single incomplete message.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Discriminant in the first field of every msgpack-RPC message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `[0, id, method, args]`.
    Request,
    /// `[1, id, error, result]`.
    Response,
    /// `[2, method, args]`.
    Notification,
}

impl MessageKind {
    /// Maps the wire discriminant onto a message kind.
    #[must_use]
    pub const fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Request),
            1 => Some(Self::Response),
            2 => Some(Self::Notification),
            _ => None,
        }
    }

    /// Wire discriminant for this kind.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        match self {
            Self::Request => 0,
            Self::Response => 1,
            Self::Notification => 2,
        }
    }

    /// Number of fields a well-formed message of this kind carries.
    #[must_use]
    pub const fn field_count(self) -> usize {
        match self {
            Self::Request | Self::Response => 4,
            Self::Notification => 3,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Notification => "notification",
        })
    }
}

/// Serialises outgoing messages into a reusable buffer.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: BytesMut,
}

impl Encoder {
    /// Creates an encoder with an empty output buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `[0, id, method, args]`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the message cannot be written.
    pub fn encode_request(
        &mut self,
        id: u64,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Bytes, CodecError> {
        self.encode(&Value::Array(vec![
            Value::from(MessageKind::Request.as_u64()),
            Value::from(id),
            Value::from(method),
            Value::Array(args),
        ]))
    }

    /// Encodes `[2, method, args]`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the message cannot be written.
    pub fn encode_notification(
        &mut self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Bytes, CodecError> {
        self.encode(&Value::Array(vec![
            Value::from(MessageKind::Notification.as_u64()),
            Value::from(method),
            Value::Array(args),
        ]))
    }

    /// Encodes `[1, id, error, result]`, the answer to a request the editor
    /// sent us.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the message cannot be written.
    pub fn encode_response(
        &mut self,
        id: u64,
        error: Value,
        result: Value,
    ) -> Result<Bytes, CodecError> {
        self.encode(&Value::Array(vec![
            Value::from(MessageKind::Response.as_u64()),
            Value::from(id),
            error,
            result,
        ]))
    }

    fn encode(&mut self, message: &Value) -> Result<Bytes, CodecError> {
        {
            let mut writer = (&mut self.buffer).writer();
            rmpv::encode::write_value(&mut writer, message).map_err(|source| {
                CodecError::Encode {
                    message: source.to_string(),
                }
            })?;
        }
        Ok(self.buffer.split().freeze())
    }
}

/// Decodes exactly one complete message from `bytes`.
///
/// # Errors
///
/// Returns [`CodecError::Truncated`] when the input ends mid-message and
/// [`CodecError::Malformed`] for invalid encodings or trailing bytes.
pub fn decode(bytes: &[u8]) -> Result<Value, CodecError> {
    match read_one(bytes)? {
        Some((value, consumed)) if consumed == bytes.len() => Ok(value),
        Some((_, consumed)) => Err(CodecError::Malformed {
            message: format!(
                "{} unexpected bytes after a complete message",
                bytes.len() - consumed
            ),
        }),
        None => Err(CodecError::Truncated {
            available: bytes.len(),
        }),
    }
}

/// Reads one value from the front of `bytes`, returning it with the number of
/// bytes it occupied, or `None` when the input ends first.
pub(crate) fn read_one(bytes: &[u8]) -> Result<Option<(Value, usize)>, CodecError> {
    let mut cursor = bytes;
    match rmpv::decode::read_value(&mut cursor) {
        Ok(value) => Ok(Some((value, bytes.len() - cursor.len()))),
        Err(error) if is_truncation(&error) => Ok(None),
        Err(error) => Err(CodecError::Malformed {
            message: error.to_string(),
        }),
    }
}

fn is_truncation(error: &rmpv::decode::Error) -> bool {
    match error {
        rmpv::decode::Error::InvalidMarkerRead(source)
        | rmpv::decode::Error::InvalidDataRead(source) => {
            source.kind() == io::ErrorKind::UnexpectedEof
        }
        _ => false,
    }
}

/// Deepest container nesting the completeness scan accepts.
const MAX_DEPTH: usize = 1024;

/// Size of one msgpack header and what follows it.
struct Header {
    /// Marker plus length or type bytes.
    len: usize,
    /// Raw payload bytes after the header.
    payload: u64,
    /// Nested values that follow (array elements, or map keys and values).
    children: u64,
}

/// Reads the big-endian length of `width` bytes that follows the marker.
fn length(bytes: &[u8], width: usize) -> Option<u64> {
    let raw = bytes.get(1..=width)?;
    Some(raw.iter().fold(0, |acc, byte| (acc << 8) | u64::from(*byte)))
}

/// Parses the header at the front of `bytes`, or `None` if it is cut short.
fn header(bytes: &[u8]) -> Result<Option<Header>, CodecError> {
    let Some(&marker) = bytes.first() else {
        return Ok(None);
    };
    let fixed = |payload: u64| Some(Header {
        len: 1,
        payload,
        children: 0,
    });
    let sized = |width: usize, extra: usize| {
        length(bytes, width).map(|payload| Header {
            len: 1 + width + extra,
            payload,
            children: 0,
        })
    };
    let counted = |width: usize, per_entry: u64| {
        length(bytes, width).map(|count| Header {
            len: 1 + width,
            payload: 0,
            children: count * per_entry,
        })
    };
    let parsed = match marker {
        0x00..=0x7f | 0xc0 | 0xc2 | 0xc3 | 0xe0..=0xff => fixed(0),
        0x80..=0x8f => Some(Header {
            len: 1,
            payload: 0,
            children: u64::from(marker & 0x0f) * 2,
        }),
        0x90..=0x9f => Some(Header {
            len: 1,
            payload: 0,
            children: u64::from(marker & 0x0f),
        }),
        0xa0..=0xbf => fixed(u64::from(marker & 0x1f)),
        0xc4 | 0xd9 => sized(1, 0),
        0xc5 | 0xda => sized(2, 0),
        0xc6 | 0xdb => sized(4, 0),
        // ext 8/16/32 carry a type byte after the length.
        0xc7 => sized(1, 1),
        0xc8 => sized(2, 1),
        0xc9 => sized(4, 1),
        0xcc | 0xd0 => fixed(1),
        0xcd | 0xd1 => fixed(2),
        0xca | 0xce | 0xd2 => fixed(4),
        0xcb | 0xcf | 0xd3 => fixed(8),
        // fixext: type byte, then 1 to 16 data bytes.
        0xd4 => fixed(2),
        0xd5 => fixed(3),
        0xd6 => fixed(5),
        0xd7 => fixed(9),
        0xd8 => fixed(17),
        0xdc => counted(2, 1),
        0xdd => counted(4, 1),
        0xde => counted(2, 2),
        0xdf => counted(4, 2),
        0xc1 => {
            return Err(CodecError::Malformed {
                message: "reserved marker 0xc1".to_owned(),
            });
        }
    };
    Ok(parsed)
}

/// Resumable walk over the headers of the message at the front of the
/// buffer. It finds where the message ends without building any values, so
/// a message arriving in many chunks is materialised once.
#[derive(Debug)]
struct Scan {
    /// Bytes known to belong to values that are already complete.
    offset: usize,
    /// Buffer length below which scanning cannot make progress.
    needed: usize,
    /// Values still expected at each open nesting level.
    remaining: Vec<u64>,
}

impl Default for Scan {
    fn default() -> Self {
        Self {
            offset: 0,
            needed: 1,
            remaining: vec![1],
        }
    }
}

impl Scan {
    /// Returns the length of the first message once all of it is buffered.
    fn advance(&mut self, buffer: &[u8]) -> Result<Option<usize>, CodecError> {
        if buffer.len() < self.needed {
            return Ok(None);
        }
        loop {
            while self.remaining.last() == Some(&0) {
                self.remaining.pop();
            }
            if self.remaining.is_empty() {
                return Ok(Some(self.offset));
            }
            let rest = buffer.get(self.offset..).unwrap_or_default();
            let Some(head) = header(rest)? else {
                self.needed = buffer.len() + 1;
                return Ok(None);
            };
            let end = usize::try_from(head.payload)
                .ok()
                .and_then(|payload| payload.checked_add(head.len))
                .ok_or_else(|| CodecError::Malformed {
                    message: format!("declared length {} is unaddressable", head.payload),
                })?;
            if rest.len() < end {
                self.needed = self.offset + end;
                return Ok(None);
            }
            self.offset += end;
            if let Some(open) = self.remaining.last_mut() {
                *open -= 1;
            }
            if head.children > 0 {
                if self.remaining.len() >= MAX_DEPTH {
                    return Err(CodecError::Malformed {
                        message: format!("containers nested deeper than {MAX_DEPTH}"),
                    });
                }
                self.remaining.push(head.children);
            }
        }
    }
}

/// Incremental workspace that reassembles messages from stdout chunks.
///
/// Incoming bytes are scanned header by header as they arrive; the message
/// is only decoded into a [`Value`] once it is known to be complete.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    scan: Scan,
    max_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder bounded by [`MAX_MESSAGE_SIZE`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_MESSAGE_SIZE)
    }

    /// Creates a decoder with a custom bound on buffered bytes.
    #[must_use]
    pub fn with_limit(max_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            scan: Scan::default(),
            max_size,
        }
    }

    /// Appends a chunk of raw input.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Number of bytes waiting for the rest of their message.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discards everything buffered.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scan = Scan::default();
    }

    /// Takes the next complete message off the front of the workspace.
    ///
    /// Returns `Ok(None)` until enough bytes have been pushed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] for invalid encodings and
    /// [`CodecError::TooLarge`] once an incomplete message outgrows the
    /// bound. Either way the workspace is cleared so decoding can resume with
    /// the next chunk.
    pub fn next_message(&mut self) -> Result<Option<Value>, CodecError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let complete = match self.scan.advance(&self.buffer) {
            Ok(complete) => complete,
            Err(error) => return Err(self.discard(error)),
        };
        let Some(len) = complete else {
            if self.buffer.len() > self.max_size {
                let size = self.buffer.len();
                self.reset();
                warn!(
                    target: CODEC_TARGET,
                    size,
                    max = self.max_size,
                    "discarding oversized incomplete message"
                );
                return Err(CodecError::TooLarge {
                    size,
                    max: self.max_size,
                });
            }
            return Ok(None);
        };
        let message = self.buffer.get(..len).unwrap_or_default();
        match read_one(message) {
            Ok(Some((value, consumed))) if consumed == len => {
                self.buffer.advance(len);
                self.scan = Scan::default();
                Ok(Some(value))
            }
            Ok(_) => Err(self.discard(CodecError::Malformed {
                message: format!("message of {len} bytes did not decode as one value"),
            })),
            Err(error) => Err(self.discard(error)),
        }
    }

    fn discard(&mut self, error: CodecError) -> CodecError {
        let discarded = self.buffer.len();
        self.reset();
        warn!(target: CODEC_TARGET, discarded, %error, "discarding malformed input");
        error
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sample_response() -> Bytes {
        let mut encoder = Encoder::new();
        encoder
            .encode_response(3, Value::Nil, Value::from("hello"))
            .expect("encode response")
    }

    #[rstest]
    fn encodes_request_as_four_element_array() {
        let mut encoder = Encoder::new();
        let bytes = encoder
            .encode_request(0, "nvim_get_current_line", Vec::new())
            .expect("encode request");

        let value = decode(&bytes).expect("decode request");
        assert_eq!(
            value,
            Value::Array(vec![
                Value::from(0_u64),
                Value::from(0_u64),
                Value::from("nvim_get_current_line"),
                Value::Array(Vec::new()),
            ])
        );
    }

    #[rstest]
    fn encodes_notification_as_three_element_array() {
        let mut encoder = Encoder::new();
        let bytes = encoder
            .encode_notification("nvim_ui_detach", Vec::new())
            .expect("encode notification");

        let Value::Array(fields) = decode(&bytes).expect("decode notification") else {
            panic!("notification must be an array");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields.first(), Some(&Value::from(2_u64)));
    }

    #[rstest]
    fn encoder_buffer_is_reused_between_messages() {
        let mut encoder = Encoder::new();
        let first = encoder
            .encode_request(0, "a", Vec::new())
            .expect("first request");
        let second = encoder
            .encode_request(1, "b", Vec::new())
            .expect("second request");

        assert_ne!(first, second);
        assert!(encoder.buffer.is_empty());
    }

    #[rstest]
    fn decode_reports_truncation() {
        let bytes = sample_response();
        let partial = bytes.get(..bytes.len() - 1).expect("slice");

        assert_eq!(
            decode(partial),
            Err(CodecError::Truncated {
                available: partial.len()
            })
        );
    }

    #[rstest]
    fn decode_rejects_trailing_bytes() {
        let mut bytes = sample_response().to_vec();
        bytes.push(0xc0);

        assert!(matches!(decode(&bytes), Err(CodecError::Malformed { .. })));
    }

    #[rstest]
    fn decode_rejects_reserved_marker() {
        assert!(matches!(decode(&[0xc1]), Err(CodecError::Malformed { .. })));
    }

    #[rstest]
    #[case::one_byte_chunks(1)]
    #[case::three_byte_chunks(3)]
    #[case::whole_message(usize::MAX)]
    fn frame_decoder_reassembles_chunks(#[case] chunk_size: usize) {
        let bytes = sample_response();
        let mut frames = FrameDecoder::new();
        let mut messages = Vec::new();

        for chunk in bytes.chunks(chunk_size.min(bytes.len())) {
            frames.push(chunk);
            while let Some(message) = frames.next_message().expect("well-formed input") {
                messages.push(message);
            }
        }

        assert_eq!(messages, vec![decode(&bytes).expect("decode")]);
        assert_eq!(frames.buffered(), 0);
    }

    #[rstest]
    fn frame_decoder_splits_coalesced_messages() {
        let mut encoder = Encoder::new();
        let mut chunk = BytesMut::new();
        for id in 0..3 {
            chunk.extend_from_slice(
                &encoder
                    .encode_response(id, Value::Nil, Value::from(id))
                    .expect("encode"),
            );
        }
        let mut frames = FrameDecoder::new();
        frames.push(&chunk);

        let mut ids = Vec::new();
        while let Some(Value::Array(fields)) = frames.next_message().expect("decode") {
            ids.push(fields.get(1).and_then(Value::as_u64).expect("id"));
        }
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[rstest]
    fn frame_decoder_recovers_after_malformed_input() {
        let mut frames = FrameDecoder::new();
        frames.push(&[0xc1, 0x01]);
        assert!(frames.next_message().is_err());
        assert_eq!(frames.buffered(), 0);

        frames.push(&sample_response());
        assert!(frames.next_message().expect("decode").is_some());
    }

    #[rstest]
    fn frame_decoder_bounds_incomplete_messages() {
        let mut frames = FrameDecoder::with_limit(4);
        // str32 header announcing far more bytes than will arrive.
        frames.push(&[0xdb, 0x00, 0x01, 0x00, 0x00, b'a', b'b']);

        assert!(matches!(
            frames.next_message(),
            Err(CodecError::TooLarge { size: 7, max: 4 })
        ));
        assert_eq!(frames.buffered(), 0);
    }

    #[rstest]
    fn large_messages_are_sized_from_their_header() {
        let mut encoder = Encoder::new();
        let bytes = encoder
            .encode_response(9, Value::Nil, Value::from("x".repeat(64 * 1024)))
            .expect("encode response");
        let mut frames = FrameDecoder::new();
        let mut chunks = bytes.chunks(1024).peekable();
        let mut decoded = Vec::new();

        while let Some(chunk) = chunks.next() {
            frames.push(chunk);
            if chunks.peek().is_some() {
                assert_eq!(frames.next_message(), Ok(None));
                // The string header fixes the message length up front, so
                // later chunks are not walked again.
                assert_eq!(frames.scan.needed, bytes.len());
            } else if let Some(message) = frames.next_message().expect("complete message") {
                decoded.push(message);
            }
        }

        assert_eq!(decoded, vec![decode(&bytes).expect("decode")]);
        assert_eq!(frames.buffered(), 0);
    }

    #[rstest]
    fn scanning_resumes_where_the_previous_chunk_ended() {
        let mut encoder = Encoder::new();
        let items: Vec<Value> = (0..500_u64).map(Value::from).collect();
        let bytes = encoder
            .encode_response(4, Value::Nil, Value::Array(items))
            .expect("encode response");
        let mut frames = FrameDecoder::new();
        let mut offsets = Vec::new();
        let mut decoded = None;

        for chunk in bytes.chunks(7) {
            frames.push(chunk);
            match frames.next_message().expect("well-formed input") {
                Some(message) => decoded = Some(message),
                None => offsets.push(frames.scan.offset),
            }
        }

        assert!(offsets.windows(2).all(|pair| matches!(pair, [a, b] if a <= b)));
        assert_eq!(decoded, Some(decode(&bytes).expect("decode")));
    }

    #[rstest]
    fn deeply_nested_input_is_rejected() {
        let mut frames = FrameDecoder::new();
        frames.push(&[0x91; MAX_DEPTH + 8]);

        assert!(matches!(
            frames.next_message(),
            Err(CodecError::Malformed { .. })
        ));
        assert_eq!(frames.buffered(), 0);
    }
}
