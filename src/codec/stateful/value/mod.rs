//! Value tree between serde types and the binary layout of
//! [`DefaultStatefulStreamCodec`](super::DefaultStatefulStreamCodec).
//!
//! Every number keeps its exact representation, non-finite floats included,
//! and `Some` is kept apart from the value it wraps so that nested options
//! survive a round trip.
use std::fmt;

use thiserror::Error;

mod de;
mod ser;

pub(crate) use ser::ValueSerializer;

/// Containers nested deeper than this are rejected on both sides.
pub(crate) const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Null,
    Bool(bool),
    UInt(u64),
    Int(i64),
    Float(f64),
    String(String),
    Some(Box<Value>),
    Array(Vec<Value>),
    // Entries keep the order they were serialized in.
    Object(Vec<(String, Value)>),
}

/// A tuple could not be mapped to or from the codec's value tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConversionError {
    message: String,
}

impl ConversionError {
    pub(crate) fn new(message: impl fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl serde::ser::Error for ConversionError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::new(msg)
    }
}

impl serde::de::Error for ConversionError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::new(msg)
    }
}
