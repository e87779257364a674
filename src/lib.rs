//! Sluice: the tuple buffering and delivery core of a stream processing
//! engine.
//!
//! Sluice decouples an upstream producer of tuples from its downstream
//! consumers. Every subscriber gets its own bounded [`Reservoir`] which is
//! drained at its own pace, in strict FIFO order, while window boundaries and
//! the end of the stream travel in-band as [control tuples](`ControlTuple`).
//!
//! # Overview
//!
//! ```text
//!  PRODUCER                                              User code   :
//!  [d1] [d2] [BEGIN_WINDOW w] [d3] [END_WINDOW w] [END_STREAM]       :
//!    │                                                               :
//! ~~~│~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~  :
//!    ▼                                                Sluice code    :
//! ┌──────────────────────────────────────────────────────────────┐   :
//! │ TupleEncoder                                                 │   :
//! │   data    → [CODEC_STATE ...]? [PAYLOAD ...]                 │   :
//! │   control → cached bytes, never serialized                   │   :
//! └──────┬───────────────────────────────────────────────────────┘   :
//!        ▼ Transport (not part of sluice)                            :
//! ┌──────────────────────────────────────────────────────────────┐   :
//! │ TupleDecoder                                                 │   :
//! │   first byte selects PAYLOAD, CODEC_STATE or a control kind  │   :
//! └──────┬───────────────────────────────────────────────────────┘   :
//!        ▼ ReservoirWriter::add                                      :
//! ┌──────────────────────────────────────────────────────────────┐   :
//! │ Reservoir  [d1][d2][BEGIN_WINDOW][d3][END_WINDOW] ...        │   :
//! │   sweep(): d1, d2 → Sink       returns BEGIN_WINDOW          │   :
//! │   sweep(): d3     → Sink       returns END_WINDOW            │   :
//! └──────┬───────────────────────────────────────────────────────┘   :
//!        ▼                                                           :
//!  SINK                                                  User code   :
//! ```
//!
//! # Features
//!
//! - **Non-blocking reservoirs**: a single-producer single-consumer lock-free ring; a full reservoir hands the tuple
//!   back instead of blocking (see [`ReservoirError::CapacityExceeded`])
//! - **Control-aware sweeps**: [`Reservoir::sweep`] drains data into the [`Sink`] and stops at the next control tuple
//! - **Hot-swappable sinks**: the sink can be replaced at any time, even while a sweep runs on another thread
//! - **Stateful codecs**: repeated metadata is shipped once as incremental codec state (see [`StatefulStreamCodec`])
//! - **Pre-encoded control tuples**: the encodings of every control kind are computed once per process (see
//!   [`ControlTupleCache`])
//!
//! # Quick Start
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use sluice::{ControlKind, ControlTuple, Tuple};
//!
//! let (mut publisher, mut subscriber) = sluice::stream::<String>("orders", 64);
//!
//! let received = Arc::new(Mutex::new(vec![]));
//! let r = received.clone();
//! subscriber.set_sink(Arc::new(move |s: String| r.lock().unwrap().push(s)));
//!
//! publisher.publish(ControlTuple::cached(ControlKind::BeginWindow, 1).into()).unwrap();
//! publisher.publish(Tuple::Data("order-1".to_string())).unwrap();
//! publisher.publish(Tuple::Data("order-2".to_string())).unwrap();
//! publisher.publish(ControlTuple::cached(ControlKind::EndStream, 1).into()).unwrap();
//!
//! // The first sweep stops right away at the window boundary
//! let c = subscriber.sweep().unwrap().unwrap();
//! assert_eq!(c.kind(), ControlKind::BeginWindow);
//!
//! // The second one delivers the data and stops at the end of the stream
//! let c = subscriber.sweep().unwrap().unwrap();
//! assert!(c.is_end_stream());
//! assert_eq!(*received.lock().unwrap(), ["order-1", "order-2"]);
//! assert!(subscriber.is_ended());
//! ```
//!
//! # Window ids on the wire
//!
//! Control tuples are emitted from a process-wide cache holding the encoding
//! of each kind for window ids in `0..CACHE_RANGE`. The cached bytes only
//! carry `window_id mod CACHE_RANGE`. The full id travels in
//! [`ControlKind::ResetWindow`] records, and receivers recover the following
//! ids with a [`WindowTracker`] as long as window ids do not jump by
//! [`CACHE_RANGE`] or more between two control tuples.
//!
//! ```
//! use sluice::{CACHE_RANGE, ControlKind, ControlTuple, WindowTracker};
//!
//! let base = 1 << 40;
//! let mut tracker = WindowTracker::new();
//! tracker.observe(&ControlTuple::encoded(ControlKind::ResetWindow, base));
//!
//! let sent = ControlTuple::cached(ControlKind::EndWindow, base + 1);
//! let received = ControlTuple::from_slice(sent.as_bytes().clone()).unwrap();
//! assert_eq!(received.window_id(), (base + 1) % CACHE_RANGE as u64);
//! assert_eq!(tracker.observe(&received), base + 1);
//! ```
//!
//! # Stateful codecs
//!
//! Serializing a data tuple yields a [`DataStatePair`]: the payload and,
//! when the codec learned something new, the state the payload depends on.
//! State must reach the deserializer in emission order while payloads may
//! arrive in any order. A payload whose state never arrived fails with
//! [`CodecError::MissingState`] rather than decoding into wrong data.
//!
//! [`StatefulStreamCodec::reset_state`] brings a codec back to its initial
//! state. [`TupleEncoder`] and [`TupleDecoder`] call it on both sides of a
//! [`ControlKind::Checkpoint`], so recovering from a checkpoint only replays
//! the state produced since.
//!
//! # Logging
//!
//! Sluice logs through [`tracing`] and never installs a subscriber. Lifecycle
//! events (reservoir creation, sink swaps, codec resets, end of stream) are
//! logged at `DEBUG`, sweep summaries at `TRACE` and missing codec state at
//! `WARN`.
mod buffers;
mod codec;
mod ringbuf;
pub mod reservoir;
pub mod stream;
pub mod tuple;

pub use buffers::{DynBuf, Slice};
pub use codec::{
    frame::{DecodeError, Frame, FrameError, TupleDecoder, TupleEncoder},
    stateful::{CodecError, ConversionError, DataStatePair, DefaultStatefulStreamCodec, StatefulStreamCodec},
};
pub use reservoir::{Reservoir, ReservoirBuilder, ReservoirError, ReservoirWriter, Sink, SinkSwitch, reservoir};
pub use stream::{Publisher, StreamError, Subscriber, stream};
pub use tuple::{
    CACHE_RANGE, ControlKind, ControlTuple, ControlTupleCache, Tuple, WindowTracker, resolve_window_id,
    serialized_tuple,
};
