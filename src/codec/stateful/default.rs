use std::{collections::HashMap, fmt, marker::PhantomData};

use serde::{Serialize, de::DeserializeOwned};

use super::{
    CodecError, DataStatePair, StatefulStreamCodec,
    value::{ConversionError, MAX_DEPTH, Value, ValueSerializer},
};
use crate::{
    buffers::{
        Slice,
        reader::{DidntRead, HasReader, Reader},
        writer::{DidntWrite, HasWriter, Writer},
    },
    codec::{
        RCodec, SluiceCodec, WCodec,
        core::vle::{zigzag_decode, zigzag_encode},
    },
};

mod tag {
    pub(super) const NULL: u8 = 0;
    pub(super) const FALSE: u8 = 1;
    pub(super) const TRUE: u8 = 2;
    pub(super) const UINT: u8 = 3;
    pub(super) const INT: u8 = 4;
    pub(super) const FLOAT: u8 = 5;
    pub(super) const STRING: u8 = 6;
    pub(super) const ARRAY: u8 = 7;
    pub(super) const OBJECT: u8 = 8;
    pub(super) const SOME: u8 = 9;
}

fn too_deep() -> CodecError {
    ConversionError::new(format!("values are nested deeper than {MAX_DEPTH} levels")).into()
}

/// Default [`StatefulStreamCodec`] for any serde type.
///
/// Tuples are mapped to a self-describing value tree and written in a compact
/// binary form. Floats are written as their 8 little-endian bytes, so
/// infinities and NaN survive the round trip, and containers may be nested at
/// most 128 levels deep. Field names are the repeated metadata: each one is assigned a
/// dictionary id the first time it is serialized and payloads refer to it by
/// id only. The state segment of a tuple lists the field names it added:
///
/// ```text
/// %   first id    %  id of the first entry in this segment
/// %     count     %
/// %     name      %  count times, length prefixed
/// ```
///
/// # Examples
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use sluice::{DefaultStatefulStreamCodec, StatefulStreamCodec};
///
/// #[derive(Debug, PartialEq, Serialize, Deserialize)]
/// struct Trade {
///     symbol: String,
///     price: f64,
/// }
///
/// let mut ser = DefaultStatefulStreamCodec::<Trade>::new();
/// let mut de = DefaultStatefulStreamCodec::<Trade>::new();
///
/// let first = ser.to_data_state_pair(&Trade { symbol: "ACME".into(), price: 1.5 }).unwrap();
/// assert!(first.state.is_some());
/// let second = ser.to_data_state_pair(&Trade { symbol: "INIT".into(), price: 2.0 }).unwrap();
/// assert!(second.state.is_none());
///
/// assert_eq!(de.from_data_state_pair(&first).unwrap().symbol, "ACME");
/// assert_eq!(de.from_data_state_pair(&second).unwrap().symbol, "INIT");
/// ```
pub struct DefaultStatefulStreamCodec<T> {
    // Serializing side
    ids: HashMap<String, usize>,
    // Deserializing side
    names: Vec<String>,
    _tuple: PhantomData<fn() -> T>,
}

impl<T> DefaultStatefulStreamCodec<T> {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            names: Vec::new(),
            _tuple: PhantomData,
        }
    }

    /// Number of field names known to the serializing side.
    pub fn dictionary_len(&self) -> usize {
        self.ids.len()
    }

    fn write_value(
        &mut self,
        mut buffer: &mut Vec<u8>,
        value: &Value,
        depth: usize,
        added: &mut Vec<String>,
    ) -> Result<(), CodecError> {
        let codec = SluiceCodec::new();
        let vec_write = |_: DidntWrite| CodecError::MalformedData;

        match value {
            Value::Null => codec.write(&mut buffer, tag::NULL).map_err(vec_write),
            Value::Bool(false) => codec.write(&mut buffer, tag::FALSE).map_err(vec_write),
            Value::Bool(true) => codec.write(&mut buffer, tag::TRUE).map_err(vec_write),
            Value::UInt(u) => {
                codec.write(&mut buffer, tag::UINT).map_err(vec_write)?;
                codec.write(&mut buffer, *u).map_err(vec_write)
            }
            Value::Int(i) => {
                codec.write(&mut buffer, tag::INT).map_err(vec_write)?;
                codec.write(&mut buffer, zigzag_encode(*i)).map_err(vec_write)
            }
            Value::Float(f) => {
                codec.write(&mut buffer, tag::FLOAT).map_err(vec_write)?;
                buffer.write_exact(&f.to_le_bytes()).map_err(vec_write)
            }
            Value::String(s) => {
                codec.write(&mut buffer, tag::STRING).map_err(vec_write)?;
                codec.write(&mut buffer, s.as_str()).map_err(vec_write)
            }
            Value::Some(v) => {
                let depth = Self::nested(depth).ok_or_else(too_deep)?;
                codec.write(&mut buffer, tag::SOME).map_err(vec_write)?;
                self.write_value(buffer, v, depth, added)
            }
            Value::Array(values) => {
                let depth = Self::nested(depth).ok_or_else(too_deep)?;
                codec.write(&mut buffer, tag::ARRAY).map_err(vec_write)?;
                codec.write(&mut buffer, values.len()).map_err(vec_write)?;
                for v in values {
                    self.write_value(buffer, v, depth, added)?;
                }
                Ok(())
            }
            Value::Object(entries) => {
                let depth = Self::nested(depth).ok_or_else(too_deep)?;
                codec.write(&mut buffer, tag::OBJECT).map_err(vec_write)?;
                codec.write(&mut buffer, entries.len()).map_err(vec_write)?;
                for (name, v) in entries {
                    let id = self.intern(name, added);
                    codec.write(&mut buffer, id).map_err(vec_write)?;
                    self.write_value(buffer, v, depth, added)?;
                }
                Ok(())
            }
        }
    }

    // Depth of the values inside a container at `depth`.
    fn nested(depth: usize) -> Option<usize> {
        (depth < MAX_DEPTH).then_some(depth + 1)
    }

    fn intern(&mut self, name: &str, added: &mut Vec<String>) -> usize {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.ids.len();
        self.ids.insert(name.to_owned(), id);
        added.push(name.to_owned());
        id
    }

    fn read_value(&self, reader: &mut &[u8], depth: usize) -> Result<Value, CodecError> {
        let codec = SluiceCodec::new();
        let malformed = |_: DidntRead| CodecError::MalformedData;

        let t: u8 = codec.read(&mut *reader).map_err(malformed)?;
        let value = match t {
            tag::NULL => Value::Null,
            tag::FALSE => Value::Bool(false),
            tag::TRUE => Value::Bool(true),
            tag::UINT => Value::UInt(codec.read(&mut *reader).map_err(malformed)?),
            tag::INT => {
                let z: u64 = codec.read(&mut *reader).map_err(malformed)?;
                Value::Int(zigzag_decode(z))
            }
            tag::FLOAT => {
                let mut bytes = [0u8; 8];
                reader.read_exact(&mut bytes).map_err(malformed)?;
                Value::Float(f64::from_le_bytes(bytes))
            }
            tag::STRING => Value::String(codec.read(&mut *reader).map_err(malformed)?),
            tag::SOME => {
                let depth = Self::nested(depth).ok_or(CodecError::MalformedData)?;
                Value::Some(Box::new(self.read_value(reader, depth)?))
            }
            tag::ARRAY => {
                let depth = Self::nested(depth).ok_or(CodecError::MalformedData)?;
                let len: usize = codec.read(&mut *reader).map_err(malformed)?;
                // Every value takes at least one byte.
                if len > reader.len() {
                    return Err(CodecError::MalformedData);
                }
                let values = (0..len)
                    .map(|_| self.read_value(reader, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::Array(values)
            }
            tag::OBJECT => {
                let depth = Self::nested(depth).ok_or(CodecError::MalformedData)?;
                let len: usize = codec.read(&mut *reader).map_err(malformed)?;
                // An entry takes at least two bytes, its id and its value.
                if len > reader.len() / 2 {
                    return Err(CodecError::MalformedData);
                }
                let mut entries = Vec::with_capacity(len);
                for _ in 0..len {
                    let id: usize = codec.read(&mut *reader).map_err(malformed)?;
                    let Some(name) = self.names.get(id) else {
                        tracing::warn!("Payload refers to field {id}, only {} are known", self.names.len());
                        return Err(CodecError::MissingState { id });
                    };
                    let v = self.read_value(reader, depth)?;
                    entries.push((name.clone(), v));
                }
                Value::Object(entries)
            }
            _ => return Err(CodecError::MalformedData),
        };
        Ok(value)
    }

    fn encode_state(first: usize, added: &[String]) -> Result<Vec<u8>, DidntWrite> {
        let codec = SluiceCodec::new();
        let mut buffer = Vec::new();
        let mut writer = buffer.writer();
        codec.write(&mut writer, first)?;
        codec.write(&mut writer, added.len())?;
        for name in added {
            codec.write(&mut writer, name)?;
        }
        Ok(buffer)
    }

    fn merge_state(&mut self, state: &Slice) -> Result<(), CodecError> {
        let codec = SluiceCodec::new();
        let malformed = |_: DidntRead| CodecError::MalformedState;

        let mut reader = state.as_slice().reader();
        let first: usize = codec.read(&mut reader).map_err(malformed)?;
        let count: usize = codec.read(&mut reader).map_err(malformed)?;
        if count > reader.len() {
            return Err(CodecError::MalformedState);
        }
        let entries = (0..count)
            .map(|_| codec.read(&mut reader))
            .collect::<Result<Vec<String>, _>>()
            .map_err(malformed)?;
        if reader.can_read() {
            return Err(CodecError::MalformedState);
        }

        let known = self.names.len();
        if first > known {
            tracing::warn!("Codec state segment starts at entry {first}, only {known} are known");
            return Err(CodecError::MissingState { id: known });
        }
        // Entries already known are a replay of a previous segment.
        self.names.extend(entries.into_iter().skip(known - first));
        Ok(())
    }
}

impl<T> Default for DefaultStatefulStreamCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for DefaultStatefulStreamCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultStatefulStreamCodec")
            .field("serialized_names", &self.ids.len())
            .field("deserialized_names", &self.names.len())
            .finish()
    }
}

impl<T> StatefulStreamCodec<T> for DefaultStatefulStreamCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn to_data_state_pair(&mut self, tuple: &T) -> Result<DataStatePair, CodecError> {
        let value = tuple.serialize(ValueSerializer)?;

        let first = self.ids.len();
        let mut added = Vec::new();
        let mut data = Vec::new();
        if let Err(e) = self.write_value(&mut data, &value, 0, &mut added) {
            // Names interned before the failure were never shipped.
            for name in &added {
                self.ids.remove(name);
            }
            return Err(e);
        }

        let state = match added.is_empty() {
            true => None,
            false => {
                let state = Self::encode_state(first, &added).map_err(|_| CodecError::MalformedState)?;
                Some(state.into())
            }
        };

        Ok(DataStatePair {
            data: data.into(),
            state,
        })
    }

    fn from_data_state_pair(&mut self, pair: &DataStatePair) -> Result<T, CodecError> {
        if let Some(state) = pair.state.as_ref() {
            self.merge_state(state)?;
        }

        let mut reader = pair.data.as_slice().reader();
        let value = self.read_value(&mut reader, 0)?;
        if !reader.is_empty() {
            return Err(CodecError::MalformedData);
        }
        Ok(T::deserialize(value)?)
    }

    fn apply_state(&mut self, state: &Slice) -> Result<(), CodecError> {
        self.merge_state(state)
    }

    fn reset_state(&mut self) {
        tracing::debug!(
            "Resetting codec state ({} serialized, {} deserialized names)",
            self.ids.len(),
            self.names.len()
        );
        self.ids.clear();
        self.names.clear();
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: f64,
        delta: i64,
        seq: u64,
        tags: Vec<String>,
        location: Option<Location>,
        ok: bool,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Location {
        lat: f64,
        lon: f64,
    }

    fn reading(seq: u64) -> Reading {
        Reading {
            sensor: format!("s-{}", seq % 3),
            value: seq as f64 * 0.25,
            delta: -(seq as i64),
            seq,
            tags: vec!["a".into(), "b".into()],
            location: (seq % 2 == 0).then_some(Location { lat: 45.5, lon: -73.6 }),
            ok: seq % 2 == 1,
        }
    }

    #[test]
    fn round_trip() {
        let mut ser = DefaultStatefulStreamCodec::<Reading>::new();
        let mut de = DefaultStatefulStreamCodec::<Reading>::new();

        for seq in 0..16 {
            let t = reading(seq);
            let pair = ser.to_data_state_pair(&t).unwrap();
            assert_eq!(de.from_data_state_pair(&pair).unwrap(), t);
        }
    }

    #[test]
    fn state_is_incremental() {
        let mut ser = DefaultStatefulStreamCodec::<Reading>::new();

        // Odd readings have no location, the nested names come later
        let first = ser.to_data_state_pair(&reading(1)).unwrap();
        assert!(first.state.is_some());
        let known = ser.dictionary_len();

        assert!(ser.to_data_state_pair(&reading(3)).unwrap().state.is_none());

        let nested = ser.to_data_state_pair(&reading(2)).unwrap();
        let state = nested.state.unwrap();
        let mut reader = state.as_slice();
        let codec = SluiceCodec::new();
        let first_id: usize = codec.read(&mut reader).unwrap();
        let count: usize = codec.read(&mut reader).unwrap();
        assert_eq!(first_id, known);
        assert_eq!(count, 2);
        assert_eq!(ser.dictionary_len(), known + 2);
    }

    #[test]
    fn data_reordered_state_in_order() {
        let mut ser = DefaultStatefulStreamCodec::<Reading>::new();
        let mut de = DefaultStatefulStreamCodec::<Reading>::new();

        let tuples: Vec<Reading> = (1..=4).collect::<Vec<u64>>().into_iter().map(reading).collect();
        let pairs: Vec<DataStatePair> = tuples.iter().map(|t| ser.to_data_state_pair(t).unwrap()).collect();

        // Apply every state segment in emission order, then decode data backwards.
        for pair in &pairs {
            if let Some(state) = pair.state.as_ref() {
                de.apply_state(state).unwrap();
            }
        }
        for (pair, t) in pairs.iter().zip(&tuples).rev() {
            let data_only = DataStatePair {
                data: pair.data.clone(),
                state: None,
            };
            assert_eq!(&de.from_data_state_pair(&data_only).unwrap(), t);
        }
    }

    #[test]
    fn missing_state() {
        let mut ser = DefaultStatefulStreamCodec::<Reading>::new();
        let mut de = DefaultStatefulStreamCodec::<Reading>::new();

        let first = ser.to_data_state_pair(&reading(1)).unwrap();
        let nested = ser.to_data_state_pair(&reading(2)).unwrap();

        // The first state segment is lost
        let data_only = DataStatePair {
            data: first.data.clone(),
            state: None,
        };
        assert!(matches!(
            de.from_data_state_pair(&data_only),
            Err(CodecError::MissingState { id: 0 })
        ));
        assert!(matches!(
            de.from_data_state_pair(&nested),
            Err(CodecError::MissingState { id: 0 })
        ));

        // Recovers once the segments are delivered in order
        assert_eq!(de.from_data_state_pair(&first).unwrap(), reading(1));
        assert_eq!(de.from_data_state_pair(&nested).unwrap(), reading(2));

        // Replayed segments are harmless
        assert_eq!(de.from_data_state_pair(&first).unwrap(), reading(1));
    }

    #[test]
    fn reset_state_is_idempotent() {
        let mut ser = DefaultStatefulStreamCodec::<Reading>::new();
        let t = reading(2);

        let fresh = ser.to_data_state_pair(&t).unwrap();
        let _ = ser.to_data_state_pair(&reading(5)).unwrap();
        ser.reset_state();
        assert_eq!(ser.dictionary_len(), 0);
        let after_reset = ser.to_data_state_pair(&t).unwrap();

        assert_eq!(fresh, after_reset);
    }

    #[test]
    fn reset_forgets_deserialized_names() {
        let mut ser = DefaultStatefulStreamCodec::<Reading>::new();
        let mut de = DefaultStatefulStreamCodec::<Reading>::new();

        let pair = ser.to_data_state_pair(&reading(1)).unwrap();
        de.from_data_state_pair(&pair).unwrap();
        de.reset_state();

        let data_only = DataStatePair {
            data: pair.data,
            state: None,
        };
        assert!(matches!(
            de.from_data_state_pair(&data_only),
            Err(CodecError::MissingState { .. })
        ));
    }

    #[test]
    fn malformed_input() {
        let mut de = DefaultStatefulStreamCodec::<Reading>::new();

        let garbage = DataStatePair {
            data: vec![0xff].into(),
            state: None,
        };
        assert!(matches!(de.from_data_state_pair(&garbage), Err(CodecError::MalformedData)));

        let huge_array = DataStatePair {
            data: vec![tag::ARRAY, 0xff, 0xff, 0x03].into(),
            state: None,
        };
        assert!(matches!(de.from_data_state_pair(&huge_array), Err(CodecError::MalformedData)));

        let bad_state = DataStatePair {
            data: vec![tag::NULL].into(),
            state: Some(vec![0x00, 0x05].into()),
        };
        assert!(matches!(de.from_data_state_pair(&bad_state), Err(CodecError::MalformedState)));

        // Well formed, but not a Reading
        let null = DataStatePair {
            data: vec![tag::NULL].into(),
            state: None,
        };
        assert!(matches!(de.from_data_state_pair(&null), Err(CodecError::Conversion(_))));

        // Narrow but deep, rejected without walking the whole payload
        let mut data = [tag::ARRAY, 1].repeat(1_000_000);
        data.push(tag::NULL);
        let deep = DataStatePair {
            data: data.into(),
            state: None,
        };
        assert!(matches!(de.from_data_state_pair(&deep), Err(CodecError::MalformedData)));
    }

    #[test]
    fn nesting_limit() {
        let codec = DefaultStatefulStreamCodec::<()>::new();
        let nested = |depth: usize| {
            let mut data = [tag::SOME].repeat(depth);
            data.push(tag::NULL);
            data
        };

        let data = nested(MAX_DEPTH);
        let mut reader = data.as_slice();
        assert!(codec.read_value(&mut reader, 0).is_ok());
        assert!(reader.is_empty());

        let data = nested(MAX_DEPTH + 1);
        assert!(matches!(
            codec.read_value(&mut data.as_slice(), 0),
            Err(CodecError::MalformedData)
        ));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Node {
        next: Option<Box<Node>>,
    }

    fn chain(len: usize) -> Node {
        (1..len).fold(Node { next: None }, |n, _| Node {
            next: Some(Box::new(n)),
        })
    }

    #[test]
    fn too_deep_to_serialize() {
        let mut ser = DefaultStatefulStreamCodec::<Node>::new();
        let mut de = DefaultStatefulStreamCodec::<Node>::new();

        // Every node is an object holding a `Some`, two levels each
        assert!(matches!(
            ser.to_data_state_pair(&chain(MAX_DEPTH / 2 + 1)),
            Err(CodecError::Conversion(_))
        ));
        // Nothing of the failed tuple is left in the dictionary
        assert_eq!(ser.dictionary_len(), 0);

        let node = chain(MAX_DEPTH / 2);
        let pair = ser.to_data_state_pair(&node).unwrap();
        assert!(pair.state.is_some());
        assert_eq!(de.from_data_state_pair(&pair).unwrap(), node);
    }

    #[test]
    fn non_finite_floats() {
        let mut codec = DefaultStatefulStreamCodec::<f64>::new();
        for f in [f64::INFINITY, f64::NEG_INFINITY, f64::MIN_POSITIVE, -0.0] {
            let pair = codec.to_data_state_pair(&f).unwrap();
            assert_eq!(pair.data[0], tag::FLOAT);
            let back = codec.from_data_state_pair(&pair).unwrap();
            assert_eq!(back.to_bits(), f.to_bits());
        }

        let pair = codec.to_data_state_pair(&f64::NAN).unwrap();
        assert!(codec.from_data_state_pair(&pair).unwrap().is_nan());

        let mut codec = DefaultStatefulStreamCodec::<f32>::new();
        let pair = codec.to_data_state_pair(&f32::NEG_INFINITY).unwrap();
        assert_eq!(codec.from_data_state_pair(&pair).unwrap(), f32::NEG_INFINITY);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Quote {
        bid: Option<f64>,
        ask: Option<f64>,
        spread: Option<Option<u8>>,
        nothing: Option<()>,
    }

    #[test]
    fn options_keep_their_shape() {
        let mut ser = DefaultStatefulStreamCodec::<Quote>::new();
        let mut de = DefaultStatefulStreamCodec::<Quote>::new();

        for q in [
            Quote {
                bid: Some(f64::INFINITY),
                ask: Some(f64::NEG_INFINITY),
                spread: Some(None),
                nothing: Some(()),
            },
            Quote {
                bid: None,
                ask: Some(1.25),
                spread: Some(Some(3)),
                nothing: None,
            },
            Quote {
                bid: Some(0.5),
                ask: None,
                spread: None,
                nothing: None,
            },
        ] {
            let pair = ser.to_data_state_pair(&q).unwrap();
            assert_eq!(de.from_data_state_pair(&pair).unwrap(), q);
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Event {
        Heartbeat,
        Price(f64),
        Move(i32, i32),
        Order { id: u64, side: Side },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    enum Side {
        Buy,
        Sell,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book(std::collections::BTreeMap<u32, Vec<Event>>);

    #[test]
    fn enums_and_maps() {
        let mut ser = DefaultStatefulStreamCodec::<Book>::new();
        let mut de = DefaultStatefulStreamCodec::<Book>::new();

        let book = Book(
            [
                (7, vec![Event::Heartbeat, Event::Price(f64::INFINITY)]),
                (
                    42,
                    vec![
                        Event::Move(-1, 2),
                        Event::Order { id: 9, side: Side::Sell },
                        Event::Order { id: 10, side: Side::Buy },
                    ],
                ),
            ]
            .into_iter()
            .collect(),
        );
        let pair = ser.to_data_state_pair(&book).unwrap();
        assert_eq!(de.from_data_state_pair(&pair).unwrap(), book);

        // Map keys and variant names are interned like field names
        let again = ser.to_data_state_pair(&book).unwrap();
        assert!(again.state.is_none());
        assert_eq!(de.from_data_state_pair(&again).unwrap(), book);
    }

    #[test]
    fn scalars() {
        let mut codec = DefaultStatefulStreamCodec::<(u64, i64, f64, Option<bool>, String)>::new();
        let t = (u64::MAX, i64::MIN, -0.5, None, "ok".to_string());
        let pair = codec.to_data_state_pair(&t).unwrap();
        assert!(pair.state.is_none());
        assert_eq!(codec.from_data_state_pair(&pair).unwrap(), t);
    }
}
