use serde::ser::{self, Impossible, Serialize};

use super::{ConversionError, Value};

/// Serializes any serde type into a [`Value`].
///
/// The mapping follows serde's usual self-describing layout: structs and maps
/// become objects, sequences and tuples become arrays, unit variants become
/// their name and other variants an object with a single entry named after
/// the variant.
pub(crate) struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = ConversionError;

    type SerializeSeq = SerializeVec;
    type SerializeTuple = SerializeVec;
    type SerializeTupleStruct = SerializeVec;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeMap;
    type SerializeStruct = SerializeMap;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<Value, ConversionError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, ConversionError> {
        self.serialize_i64(v.into())
    }

    fn serialize_i16(self, v: i16) -> Result<Value, ConversionError> {
        self.serialize_i64(v.into())
    }

    fn serialize_i32(self, v: i32) -> Result<Value, ConversionError> {
        self.serialize_i64(v.into())
    }

    fn serialize_i64(self, v: i64) -> Result<Value, ConversionError> {
        // Non-negative values share the unsigned form.
        Ok(match u64::try_from(v) {
            Ok(u) => Value::UInt(u),
            Err(_) => Value::Int(v),
        })
    }

    fn serialize_i128(self, v: i128) -> Result<Value, ConversionError> {
        if let Ok(i) = i64::try_from(v) {
            return self.serialize_i64(i);
        }
        u64::try_from(v)
            .map(Value::UInt)
            .map_err(|_| ConversionError::new(format!("{v} does not fit in 64 bits")))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, ConversionError> {
        self.serialize_u64(v.into())
    }

    fn serialize_u16(self, v: u16) -> Result<Value, ConversionError> {
        self.serialize_u64(v.into())
    }

    fn serialize_u32(self, v: u32) -> Result<Value, ConversionError> {
        self.serialize_u64(v.into())
    }

    fn serialize_u64(self, v: u64) -> Result<Value, ConversionError> {
        Ok(Value::UInt(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, ConversionError> {
        u64::try_from(v)
            .map(Value::UInt)
            .map_err(|_| ConversionError::new(format!("{v} does not fit in 64 bits")))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, ConversionError> {
        Ok(Value::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, ConversionError> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, ConversionError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, ConversionError> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, ConversionError> {
        Ok(Value::Array(v.iter().map(|&b| Value::UInt(b.into())).collect()))
    }

    fn serialize_none(self) -> Result<Value, ConversionError> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value, ConversionError>
    where
        T: ?Sized + Serialize,
    {
        Ok(Value::Some(Box::new(value.serialize(self)?)))
    }

    fn serialize_unit(self) -> Result<Value, ConversionError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, ConversionError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, ConversionError> {
        Ok(Value::String(variant.to_owned()))
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<Value, ConversionError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, ConversionError>
    where
        T: ?Sized + Serialize,
    {
        Ok(Value::Object(vec![(variant.to_owned(), value.serialize(self)?)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeVec, ConversionError> {
        Ok(SerializeVec {
            values: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeVec, ConversionError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SerializeVec, ConversionError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant, ConversionError> {
        Ok(SerializeTupleVariant {
            variant,
            values: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeMap, ConversionError> {
        Ok(SerializeMap {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<SerializeMap, ConversionError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeStructVariant, ConversionError> {
        Ok(SerializeStructVariant {
            variant,
            entries: Vec::with_capacity(len),
        })
    }
}

pub(crate) struct SerializeVec {
    values: Vec<Value>,
}

impl ser::SerializeSeq for SerializeVec {
    type Ok = Value;
    type Error = ConversionError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        self.values.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value, ConversionError> {
        Ok(Value::Array(self.values))
    }
}

impl ser::SerializeTuple for SerializeVec {
    type Ok = Value;
    type Error = ConversionError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, ConversionError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SerializeVec {
    type Ok = Value;
    type Error = ConversionError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, ConversionError> {
        ser::SerializeSeq::end(self)
    }
}

pub(crate) struct SerializeTupleVariant {
    variant: &'static str,
    values: Vec<Value>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = Value;
    type Error = ConversionError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        self.values.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value, ConversionError> {
        Ok(Value::Object(vec![(self.variant.to_owned(), Value::Array(self.values))]))
    }
}

pub(crate) struct SerializeMap {
    entries: Vec<(String, Value)>,
    key: Option<String>,
}

impl ser::SerializeMap for SerializeMap {
    type Ok = Value;
    type Error = ConversionError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        self.key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .key
            .take()
            .ok_or_else(|| ConversionError::new("map value serialized before its key"))?;
        self.entries.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, ConversionError> {
        Ok(Value::Object(self.entries))
    }
}

impl ser::SerializeStruct for SerializeMap {
    type Ok = Value;
    type Error = ConversionError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        self.entries.push((key.to_owned(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, ConversionError> {
        Ok(Value::Object(self.entries))
    }
}

pub(crate) struct SerializeStructVariant {
    variant: &'static str,
    entries: Vec<(String, Value)>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = Value;
    type Error = ConversionError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), ConversionError>
    where
        T: ?Sized + Serialize,
    {
        self.entries.push((key.to_owned(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, ConversionError> {
        Ok(Value::Object(vec![(self.variant.to_owned(), Value::Object(self.entries))]))
    }
}

// Map keys are interned like field names, so they must be strings. Integers
// and booleans are written in their decimal form.
struct KeySerializer;

fn key_must_be_a_string() -> ConversionError {
    ConversionError::new("map key must be a string, an integer or a boolean")
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = ConversionError;

    type SerializeSeq = Impossible<String, ConversionError>;
    type SerializeTuple = Impossible<String, ConversionError>;
    type SerializeTupleStruct = Impossible<String, ConversionError>;
    type SerializeTupleVariant = Impossible<String, ConversionError>;
    type SerializeMap = Impossible<String, ConversionError>;
    type SerializeStruct = Impossible<String, ConversionError>;
    type SerializeStructVariant = Impossible<String, ConversionError>;

    fn serialize_bool(self, v: bool) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_f32(self, _v: f32) -> Result<String, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_f64(self, _v: f64) -> Result<String, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_char(self, v: char) -> Result<String, ConversionError> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, ConversionError> {
        Ok(v.to_owned())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<String, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_none(self) -> Result<String, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_some<T>(self, _value: &T) -> Result<String, ConversionError>
    where
        T: ?Sized + Serialize,
    {
        Err(key_must_be_a_string())
    }

    fn serialize_unit(self) -> Result<String, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, ConversionError> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T>(self, _name: &'static str, value: &T) -> Result<String, ConversionError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, ConversionError>
    where
        T: ?Sized + Serialize,
    {
        Err(key_must_be_a_string())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct, ConversionError> {
        Err(key_must_be_a_string())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, ConversionError> {
        Err(key_must_be_a_string())
    }
}
