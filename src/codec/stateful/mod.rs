//! Codecs that build up state while serializing.
//!
//! Serialization is usually the most expensive thing a stream does, so codecs
//! avoid repeating metadata on every tuple. Instead of writing a field name or
//! a type name each time, a codec can assign it a small integer the first time
//! it sees it and only ship the mapping once. That dynamically growing mapping
//! is the codec *state*.
//!
//! State is incremental: each segment adds to the previous ones and never
//! replaces them. It must reach every deserializing codec in the order it was
//! produced, while the data it accompanies may be partitioned away and never
//! reach a given deserializer at all.
use thiserror::Error;

use crate::buffers::Slice;

mod default;
mod value;

pub use default::DefaultStatefulStreamCodec;
pub use value::ConversionError;

/// The two outputs of serializing one tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStatePair {
    /// Serialized form of the tuple.
    pub data: Slice,
    /// State added to the codec while serializing [`data`](Self::data), `None`
    /// when the state did not change.
    pub state: Option<Slice>,
}

/// Error returned by a [`StatefulStreamCodec`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// A state segment the payload depends on was never applied.
    ///
    /// This is not retriable: it means the state side channel lost or
    /// reordered a segment. `id` is the first dictionary entry missing.
    #[error("Codec state for dictionary entry {id} was never applied")]
    MissingState { id: usize },

    /// The payload bytes do not hold a valid tuple.
    #[error("Tuple payload is corrupted or invalid")]
    MalformedData,

    /// The state bytes do not hold a valid state segment.
    #[error("Codec state segment is corrupted or invalid")]
    MalformedState,

    /// The tuple could not be mapped to or from its serialized form.
    #[error("Tuple conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

/// Serializes tuples of type `T` into [`DataStatePair`]s and back.
///
/// A codec instance is owned by a single stream endpoint and is not shared
/// between threads.
pub trait StatefulStreamCodec<T> {
    /// Serializes `tuple`, possibly growing the codec state.
    ///
    /// The result is deterministic for a given codec state.
    fn to_data_state_pair(&mut self, tuple: &T) -> Result<DataStatePair, CodecError>;

    /// Applies `pair.state`, if any, then deserializes `pair.data`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MissingState`] when the payload depends on a state
    /// segment that was not applied.
    fn from_data_state_pair(&mut self, pair: &DataStatePair) -> Result<T, CodecError>;

    /// Applies a state segment received on its own, ahead of the data that
    /// depends on it.
    fn apply_state(&mut self, state: &Slice) -> Result<(), CodecError>;

    /// Restores the state the codec had when it was created.
    ///
    /// Called at checkpoint boundaries so that recovery only replays the state
    /// produced since the last reset.
    fn reset_state(&mut self);
}
