//! Framing of tuples at the transport boundary.
//!
//! The transport hands over one byte frame per message. Its first byte tells
//! what follows:
//!
//! ```text
//! PAYLOAD       [2][data bytes ...]    data of a DataStatePair
//! CODEC_STATE   [12][state bytes ...]  state of a DataStatePair
//! control kinds [t][window id]         see crate::tuple
//! ```
//!
//! The state frame of a tuple is always emitted before its payload frame.
use std::marker::PhantomData;

use thiserror::Error;

use super::stateful::{CodecError, DataStatePair, StatefulStreamCodec};
use crate::{
    buffers::Slice,
    tuple::{ControlKind, ControlTuple, ControlTupleCache, Tuple, WindowTracker, id},
};

/// Error returned when a frame cannot be interpreted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("Frame is empty")]
    Empty,

    #[error("Frame region is out of bounds of its buffer")]
    OutOfBounds,

    #[error("Unknown message type {0}")]
    UnknownType(u8),

    #[error("Message type {0} is not a control tuple")]
    NotControl(u8),

    #[error("Frame of message type {0} is malformed")]
    Malformed(u8),
}

/// Error returned by a [`TupleDecoder`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Serialized application tuple.
    Payload(Slice),
    /// Codec state the following payloads depend on.
    CodecState(Slice),
    /// Window boundary or other stream marker.
    Control(ControlTuple),
}

impl Frame {
    /// Interprets `frame` by its message type byte, without copying it.
    pub fn decode(frame: Slice) -> Result<Self, FrameError> {
        let header = *frame.first().ok_or(FrameError::Empty)?;
        let body = || frame.view(1..).ok_or(FrameError::Malformed(header));
        match header {
            id::PAYLOAD => body().map(Frame::Payload),
            id::CODEC_STATE => body().map(Frame::CodecState),
            _ => ControlTuple::from_slice(frame).map(Frame::Control),
        }
    }

    pub fn message_type(&self) -> u8 {
        match self {
            Frame::Payload(_) => id::PAYLOAD,
            Frame::CodecState(_) => id::CODEC_STATE,
            Frame::Control(c) => c.kind().message_type(),
        }
    }

    /// Returns the wire form of this frame.
    pub fn encode(&self) -> Slice {
        match self {
            Frame::Payload(data) => prefixed(id::PAYLOAD, data),
            Frame::CodecState(state) => prefixed(id::CODEC_STATE, state),
            Frame::Control(c) => c.as_bytes().clone(),
        }
    }
}

fn prefixed(header: u8, body: &[u8]) -> Slice {
    let mut frame = Vec::with_capacity(1 + body.len());
    frame.push(header);
    frame.extend_from_slice(body);
    frame.into()
}

/// Turns the tuples of one producer into frames.
///
/// Control tuples are taken from the [`ControlTupleCache`] and never
/// serialized, except reset window records which carry the full window id
/// receivers re-derive the following ids from.
///
/// Encoding a checkpoint resets the codec state right after the checkpoint
/// frame, mirroring what [`TupleDecoder`] does on the receiving side.
pub struct TupleEncoder<T, C> {
    codec: C,
    _tuple: PhantomData<fn(&T)>,
}

impl<T, C> TupleEncoder<T, C>
where
    C: StatefulStreamCodec<T>,
{
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            _tuple: PhantomData,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Appends the frames of `tuple` to `frames`.
    pub fn encode(&mut self, tuple: &Tuple<T>, frames: &mut Vec<Slice>) -> Result<(), CodecError> {
        match tuple {
            Tuple::Data(t) => {
                let DataStatePair { data, state } = self.codec.to_data_state_pair(t)?;
                if let Some(state) = state {
                    frames.push(prefixed(id::CODEC_STATE, &state));
                }
                frames.push(prefixed(id::PAYLOAD, &data));
            }
            Tuple::Control(c) => match c.kind() {
                ControlKind::ResetWindow => {
                    frames.push(ControlTuple::encoded(c.kind(), c.window_id()).as_bytes().clone());
                }
                ControlKind::Checkpoint => {
                    frames.push(ControlTupleCache::global().slice(c.kind(), c.window_id()));
                    self.codec.reset_state();
                }
                kind => frames.push(ControlTupleCache::global().slice(kind, c.window_id())),
            },
        }
        Ok(())
    }

    /// See [`StatefulStreamCodec::reset_state`].
    pub fn reset_state(&mut self) {
        self.codec.reset_state();
    }
}

/// Turns frames received from the transport back into tuples.
///
/// Window ids of control tuples are re-derived with a [`WindowTracker`], so
/// the tuples handed out carry the full id the producer emitted.
pub struct TupleDecoder<T, C> {
    codec: C,
    tracker: WindowTracker,
    _tuple: PhantomData<fn() -> T>,
}

impl<T, C> TupleDecoder<T, C>
where
    C: StatefulStreamCodec<T>,
{
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            tracker: WindowTracker::new(),
            _tuple: PhantomData,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// The last window id seen on the stream.
    pub fn window_id(&self) -> u64 {
        self.tracker.current()
    }

    /// Decodes one frame.
    ///
    /// Codec state frames are applied right away and yield `None`.
    pub fn decode(&mut self, frame: Slice) -> Result<Option<Tuple<T>>, DecodeError> {
        let tuple = match Frame::decode(frame)? {
            Frame::CodecState(state) => {
                self.codec.apply_state(&state)?;
                None
            }
            Frame::Payload(data) => {
                let pair = DataStatePair { data, state: None };
                Some(Tuple::Data(self.codec.from_data_state_pair(&pair)?))
            }
            Frame::Control(c) => {
                let window_id = self.tracker.observe(&c);
                if c.kind() == ControlKind::Checkpoint {
                    self.codec.reset_state();
                }
                Some(Tuple::Control(c.with_window_id(window_id)))
            }
        };
        Ok(tuple)
    }

    /// See [`StatefulStreamCodec::reset_state`].
    pub fn reset_state(&mut self) {
        self.codec.reset_state();
    }
}
