//! Tuples flowing through a stream.
//!
//! A stream carries application data interleaved with control tuples marking
//! window boundaries, resets, checkpoints and the end of the stream. Control
//! tuples all share the same shape: a one byte message type followed by a
//! window identifier.
//!
//! ```text
//!  7 6 5 4 3 2 1 0
//! +-+-+-+-+-+-+-+-+
//! | message type  |  PAYLOAD, CODEC_STATE or one of the control kinds
//! +---------------+
//! %   window id   %  VLE encoded
//! +---------------+
//! ```
use core::fmt;
use std::sync::Arc;

use crate::{
    buffers::{DynBuf, Slice, reader::HasReader},
    codec::{RCodec, SluiceCodec, control::WindowIdHeader, frame::FrameError},
};

pub(crate) mod cache;
mod window;

pub use cache::{CACHE_RANGE, ControlTupleCache, serialized_tuple};
pub use window::{WindowTracker, resolve_window_id};

/// Message type discriminators, the first byte of every encoded tuple.
pub mod id {
    /// Serialized application tuple.
    pub const PAYLOAD: u8 = 2;
    /// Reset window, carries the full window id the following ones derive from.
    pub const RESET_WINDOW: u8 = 3;
    /// Beginning of a window.
    pub const BEGIN_WINDOW: u8 = 4;
    /// End of a window.
    pub const END_WINDOW: u8 = 5;
    /// End of the stream.
    pub const END_STREAM: u8 = 6;
    /// Upstream checkpointed its state.
    pub const CHECKPOINT: u8 = 11;
    /// Incremental state of the stateful codec.
    pub const CODEC_STATE: u8 = 12;
    /// Upstream code was changed.
    pub const CODE_CHANGE: u8 = 13;
}

/// The kinds of control tuple a stream can carry.
///
/// The reservoir treats all of them the same way: a control tuple stops the
/// sweep and is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlKind {
    BeginWindow = id::BEGIN_WINDOW,
    EndWindow = id::END_WINDOW,
    EndStream = id::END_STREAM,
    ResetWindow = id::RESET_WINDOW,
    Checkpoint = id::CHECKPOINT,
    CodeChange = id::CODE_CHANGE,
}

impl ControlKind {
    pub const NUM: usize = 6;

    pub const ALL: [Self; Self::NUM] = [
        Self::BeginWindow,
        Self::EndWindow,
        Self::EndStream,
        Self::ResetWindow,
        Self::Checkpoint,
        Self::CodeChange,
    ];

    /// The wire discriminator of this kind.
    pub const fn message_type(self) -> u8 {
        self as u8
    }

    /// Returns the control kind identified by `message_type`, if any.
    pub const fn from_message_type(message_type: u8) -> Option<Self> {
        match message_type {
            id::BEGIN_WINDOW => Some(Self::BeginWindow),
            id::END_WINDOW => Some(Self::EndWindow),
            id::END_STREAM => Some(Self::EndStream),
            id::RESET_WINDOW => Some(Self::ResetWindow),
            id::CHECKPOINT => Some(Self::Checkpoint),
            id::CODE_CHANGE => Some(Self::CodeChange),
            _ => None,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::BeginWindow => 0,
            Self::EndWindow => 1,
            Self::EndStream => 2,
            Self::ResetWindow => 3,
            Self::Checkpoint => 4,
            Self::CodeChange => 5,
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeginWindow => "BEGIN_WINDOW",
            Self::EndWindow => "END_WINDOW",
            Self::EndStream => "END_STREAM",
            Self::ResetWindow => "RESET_WINDOW",
            Self::Checkpoint => "CHECKPOINT",
            Self::CodeChange => "CODE_CHANGE",
        };
        f.write_str(name)
    }
}

/// A window-id carrying marker in the stream.
///
/// The encoded form is kept alongside the decoded fields so that forwarding a
/// control tuple never serializes it again.
///
/// The in-memory [`window_id`](Self::window_id) and the id carried by the
/// bytes only agree when the tuple was decoded from the wire or built with
/// [`encoded`](Self::encoded). Tuples built with [`cached`](Self::cached)
/// keep the full id in memory while their bytes carry `window_id mod`
/// [`CACHE_RANGE`]; receivers resolve the full id with a [`WindowTracker`].
#[derive(Clone, PartialEq, Eq)]
pub struct ControlTuple {
    kind: ControlKind,
    window_id: u64,
    bytes: Slice,
}

impl ControlTuple {
    /// Creates a control tuple viewing `length` bytes at `offset` of `buf`.
    ///
    /// # Errors
    ///
    /// Fails if the region is out of bounds or does not hold a control tuple.
    pub fn new(buf: Arc<dyn DynBuf>, offset: usize, length: usize) -> Result<Self, FrameError> {
        let slice = Slice::new(buf, offset, length).map_err(|_| FrameError::OutOfBounds)?;
        Self::from_slice(slice)
    }

    /// Creates a control tuple from its encoded form.
    pub fn from_slice(bytes: Slice) -> Result<Self, FrameError> {
        let codec = SluiceCodec::new();
        let mut reader = bytes.as_slice().reader();
        let header: WindowIdHeader = codec.read(&mut reader)?;
        if !reader.is_empty() {
            return Err(FrameError::Malformed(header.kind.message_type()));
        }
        Ok(Self {
            kind: header.kind,
            window_id: header.window_id,
            bytes,
        })
    }

    /// Creates a control tuple whose bytes come from the process-wide cache.
    ///
    /// Nothing is serialized: the bytes are a view over the precomputed entry
    /// for `window_id mod` [`CACHE_RANGE`].
    pub fn cached(kind: ControlKind, window_id: u64) -> Self {
        Self {
            kind,
            window_id,
            bytes: ControlTupleCache::global().slice(kind, window_id),
        }
    }

    /// Creates a control tuple carrying the full `window_id` on the wire.
    pub fn encoded(kind: ControlKind, window_id: u64) -> Self {
        let header = WindowIdHeader { kind, window_id };
        Self {
            kind,
            window_id,
            bytes: header.encode().into(),
        }
    }

    pub const fn kind(&self) -> ControlKind {
        self.kind
    }

    pub const fn window_id(&self) -> u64 {
        self.window_id
    }

    /// The encoded form of this tuple.
    pub fn as_bytes(&self) -> &Slice {
        &self.bytes
    }

    pub fn is_end_stream(&self) -> bool {
        self.kind == ControlKind::EndStream
    }

    pub(crate) fn with_window_id(mut self, window_id: u64) -> Self {
        self.window_id = window_id;
        self
    }
}

impl fmt::Debug for ControlTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlTuple")
            .field("kind", &self.kind)
            .field("window_id", &self.window_id)
            .finish()
    }
}

impl fmt::Display for ControlTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", self.kind, self.window_id)
    }
}

/// One unit flowing through a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Tuple<T> {
    /// Application data, opaque to the core.
    Data(T),
    /// A stream boundary marker.
    Control(ControlTuple),
}

impl<T> Tuple<T> {
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Control(_))
    }

    pub const fn as_control(&self) -> Option<&ControlTuple> {
        match self {
            Self::Control(c) => Some(c),
            Self::Data(_) => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Data(t) => Some(t),
            Self::Control(_) => None,
        }
    }
}

impl<T> From<ControlTuple> for Tuple<T> {
    fn from(c: ControlTuple) -> Self {
        Self::Control(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_discriminators() {
        for kind in ControlKind::ALL {
            assert_eq!(ControlKind::from_message_type(kind.message_type()), Some(kind));
            assert_eq!(ControlKind::ALL[kind.index()], kind);
        }
        assert_eq!(ControlKind::from_message_type(id::PAYLOAD), None);
        assert_eq!(ControlKind::from_message_type(id::CODEC_STATE), None);
    }

    #[test]
    fn control_from_raw_bytes() {
        let encoded = ControlTuple::encoded(ControlKind::EndWindow, 0x1234_5678_9abc);

        // Received inside a larger buffer
        let mut frame = vec![0xff, 0xff];
        frame.extend_from_slice(encoded.as_bytes());
        frame.push(0xff);

        let len = encoded.as_bytes().len();
        let tuple = ControlTuple::new(Arc::new(frame), 2, len).unwrap();
        assert_eq!(tuple.kind(), ControlKind::EndWindow);
        assert_eq!(tuple.window_id(), 0x1234_5678_9abc);
        assert_eq!(tuple, encoded);
    }

    #[test]
    fn control_from_invalid_bytes() {
        let buf: Arc<dyn DynBuf> = Arc::new(vec![id::END_STREAM, 0x01, 0x00]);
        assert_eq!(ControlTuple::new(buf.clone(), 0, 8), Err(FrameError::OutOfBounds));
        assert_eq!(ControlTuple::new(buf.clone(), 0, 0), Err(FrameError::Empty));
        assert_eq!(
            ControlTuple::new(buf.clone(), 0, 3),
            Err(FrameError::Malformed(id::END_STREAM))
        );
        assert_eq!(ControlTuple::new(buf, 1, 2), Err(FrameError::UnknownType(0x01)));

        let truncated = Slice::from(vec![id::BEGIN_WINDOW, 0x80]);
        assert_eq!(
            ControlTuple::from_slice(truncated),
            Err(FrameError::Malformed(id::BEGIN_WINDOW))
        );

        let payload = Slice::from(vec![id::PAYLOAD, 0x00]);
        assert_eq!(ControlTuple::from_slice(payload), Err(FrameError::NotControl(id::PAYLOAD)));
    }

    #[test]
    fn cached_keeps_full_window_id() {
        let window_id = (7u64 << 32) | 42;
        let tuple = ControlTuple::cached(ControlKind::BeginWindow, window_id);
        assert_eq!(tuple.window_id(), window_id);
        assert_eq!(tuple.as_bytes()[0], id::BEGIN_WINDOW);

        let received = ControlTuple::from_slice(tuple.as_bytes().clone()).unwrap();
        assert_eq!(received.kind(), ControlKind::BeginWindow);
        assert_eq!(received.window_id(), window_id % CACHE_RANGE as u64);
    }

    #[test]
    fn tuple_accessors() {
        let data: Tuple<u32> = Tuple::Data(7);
        assert!(!data.is_control());
        assert!(data.as_control().is_none());
        assert_eq!(data.into_data(), Some(7));

        let control: Tuple<u32> = ControlTuple::cached(ControlKind::EndStream, 1).into();
        assert!(control.is_control());
        assert!(control.as_control().is_some_and(ControlTuple::is_end_stream));
        assert_eq!(control.into_data(), None);
    }
}
