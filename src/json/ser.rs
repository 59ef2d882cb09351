//! Building [`JsonValue`]s from Rust data through serde.
//!
//! [`to_value`] accepts anything that implements `Serialize`: a
//! `serde_json::Value` built with `json!`, a `Vec<&str>` of weekdays, or a
//! whole model struct. The conversion itself is `serde_json::to_value`, so
//! enums, newtypes and map keys take exactly the shape the production encoder
//! writes. A checking pass runs first and rejects what `serde_json` would
//! coerce or drop:
//!
//! - NaN and infinite floats (E200); `serde_json` would write `null`
//! - map keys that are not strings, chars, integers, bools or unit variants (E201)
//! - two map keys that stringify to the same text (E101); `serde_json` keeps the last
//! - nesting deeper than [`Limits::max_nesting_depth`] (E111)

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::ser::{self, Impossible, Serialize, Serializer};
use serde_json::Value;

use super::limits::Limits;
use super::types::{JsonValue, Number};
use crate::error::{ErrorCode, JsonResult};

impl ser::Error for ErrorCode {
    fn custom<T: Display>(msg: T) -> Self {
        ErrorCode::E202_SerializeFailed(msg.to_string())
    }
}

/// Convert any serializable value into a [`JsonValue`] with standard limits.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> JsonResult<JsonValue> {
    to_value_with_limits(value, Limits::standard())
}

/// Convert any serializable value into a [`JsonValue`] with custom limits.
///
/// Only [`Limits::max_nesting_depth`] applies to Rust data.
pub fn to_value_with_limits<T: Serialize + ?Sized>(
    value: &T,
    limits: Limits,
) -> JsonResult<JsonValue> {
    value.serialize(Checker {
        max_depth: limits.max_nesting_depth,
        depth: 0,
    })?;
    let value =
        serde_json::to_value(value).map_err(|e| ErrorCode::E202_SerializeFailed(e.to_string()))?;
    from_serde_json(value)
}

fn from_serde_json(value: Value) -> JsonResult<JsonValue> {
    Ok(match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(b),
        Value::Number(n) => JsonValue::Number(number(&n)?),
        Value::String(s) => JsonValue::String(s),
        Value::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .map(from_serde_json)
                .collect::<JsonResult<_>>()?,
        ),
        Value::Object(members) => JsonValue::Object(
            members
                .into_iter()
                .map(|(k, v)| Ok((k, from_serde_json(v)?)))
                .collect::<JsonResult<_>>()?,
        ),
    })
}

fn number(n: &serde_json::Number) -> JsonResult<Number> {
    if let Some(i) = n.as_i64() {
        return Ok(Number::from_i64(i));
    }
    if let Some(u) = n.as_u64() {
        return Ok(Number::from_u64(u));
    }
    n.as_f64()
        .and_then(Number::from_f64)
        .ok_or_else(|| ErrorCode::E200_NonFiniteNumber(n.to_string()))
}

fn non_finite(value: f64) -> ErrorCode {
    ErrorCode::E200_NonFiniteNumber(value.to_string())
}

/// Walks a value without building anything, failing on data with no JSON
/// form.
#[derive(Clone, Copy)]
struct Checker {
    max_depth: u64,
    depth: u64,
}

impl Checker {
    /// Checker for the children of an array or object.
    fn nested(self) -> JsonResult<Self> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(ErrorCode::E111_NestingTooDeep(depth, self.max_depth));
        }
        Ok(Self { depth, ..self })
    }

    fn compound(self) -> JsonResult<Compound> {
        Ok(Compound {
            checker: self.nested()?,
            keys: BTreeSet::new(),
        })
    }
}

impl Serializer for Checker {
    type Ok = ();
    type Error = ErrorCode;

    type SerializeSeq = Compound;
    type SerializeTuple = Compound;
    type SerializeTupleStruct = Compound;
    type SerializeTupleVariant = Compound;
    type SerializeMap = Compound;
    type SerializeStruct = Compound;
    type SerializeStructVariant = Compound;

    fn serialize_bool(self, _v: bool) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> JsonResult<()> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(non_finite(f64::from(v)))
        }
    }

    fn serialize_f64(self, v: f64) -> JsonResult<()> {
        if v.is_finite() {
            Ok(())
        } else {
            Err(non_finite(v))
        }
    }

    fn serialize_char(self, _v: char) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> JsonResult<()> {
        Ok(())
    }

    // serde_json writes bytes as an array of integers.
    fn serialize_bytes(self, _v: &[u8]) -> JsonResult<()> {
        self.nested().map(|_| ())
    }

    fn serialize_none(self) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> JsonResult<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> JsonResult<()> {
        Ok(())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> JsonResult<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> JsonResult<()> {
        value.serialize(self.nested()?)
    }

    fn serialize_seq(self, _len: Option<usize>) -> JsonResult<Compound> {
        self.compound()
    }

    fn serialize_tuple(self, _len: usize) -> JsonResult<Compound> {
        self.compound()
    }

    fn serialize_tuple_struct(self, _name: &'static str, _len: usize) -> JsonResult<Compound> {
        self.compound()
    }

    // {"Variant": [..]}
    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> JsonResult<Compound> {
        self.nested()?.compound()
    }

    fn serialize_map(self, _len: Option<usize>) -> JsonResult<Compound> {
        self.compound()
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> JsonResult<Compound> {
        self.compound()
    }

    // {"Variant": {..}}
    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> JsonResult<Compound> {
        self.nested()?.compound()
    }
}

/// Children of one array or object. Map keys are tracked by their JSON text.
struct Compound {
    checker: Checker,
    keys: BTreeSet<String>,
}

impl ser::SerializeSeq for Compound {
    type Ok = ();
    type Error = ErrorCode;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> JsonResult<()> {
        value.serialize(self.checker)
    }

    fn end(self) -> JsonResult<()> {
        Ok(())
    }
}

impl ser::SerializeTuple for Compound {
    type Ok = ();
    type Error = ErrorCode;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> JsonResult<()> {
        value.serialize(self.checker)
    }

    fn end(self) -> JsonResult<()> {
        Ok(())
    }
}

impl ser::SerializeTupleStruct for Compound {
    type Ok = ();
    type Error = ErrorCode;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> JsonResult<()> {
        value.serialize(self.checker)
    }

    fn end(self) -> JsonResult<()> {
        Ok(())
    }
}

impl ser::SerializeTupleVariant for Compound {
    type Ok = ();
    type Error = ErrorCode;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> JsonResult<()> {
        value.serialize(self.checker)
    }

    fn end(self) -> JsonResult<()> {
        Ok(())
    }
}

impl ser::SerializeMap for Compound {
    type Ok = ();
    type Error = ErrorCode;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> JsonResult<()> {
        let key = key.serialize(MapKeySerializer)?;
        if self.keys.contains(&key) {
            return Err(ErrorCode::E101_DuplicateKey(key));
        }
        self.keys.insert(key);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> JsonResult<()> {
        value.serialize(self.checker)
    }

    fn end(self) -> JsonResult<()> {
        Ok(())
    }
}

impl ser::SerializeStruct for Compound {
    type Ok = ();
    type Error = ErrorCode;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> JsonResult<()> {
        value.serialize(self.checker)
    }

    fn end(self) -> JsonResult<()> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for Compound {
    type Ok = ();
    type Error = ErrorCode;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> JsonResult<()> {
        value.serialize(self.checker)
    }

    fn end(self) -> JsonResult<()> {
        Ok(())
    }
}

/// Turns a map key into its JSON string, or refuses.
struct MapKeySerializer;

fn key_not_stringable(kind: &'static str) -> ErrorCode {
    ErrorCode::E201_KeyNotStringable(kind)
}

impl Serializer for MapKeySerializer {
    type Ok = String;
    type Error = ErrorCode;

    type SerializeSeq = Impossible<String, ErrorCode>;
    type SerializeTuple = Impossible<String, ErrorCode>;
    type SerializeTupleStruct = Impossible<String, ErrorCode>;
    type SerializeTupleVariant = Impossible<String, ErrorCode>;
    type SerializeMap = Impossible<String, ErrorCode>;
    type SerializeStruct = Impossible<String, ErrorCode>;
    type SerializeStructVariant = Impossible<String, ErrorCode>;

    fn serialize_bool(self, v: bool) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_i8(self, v: i8) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_i16(self, v: i16) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_i32(self, v: i32) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_i64(self, v: i64) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_i128(self, v: i128) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_u8(self, v: u8) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_u16(self, v: u16) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_u32(self, v: u32) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_u64(self, v: u64) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_u128(self, v: u128) -> JsonResult<String> {
        Ok(v.to_string())
    }

    // Float keys have no single textual form worth committing to.
    fn serialize_f32(self, _v: f32) -> JsonResult<String> {
        Err(key_not_stringable("float"))
    }

    fn serialize_f64(self, _v: f64) -> JsonResult<String> {
        Err(key_not_stringable("float"))
    }

    fn serialize_char(self, v: char) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> JsonResult<String> {
        Ok(v.to_string())
    }

    fn serialize_bytes(self, _v: &[u8]) -> JsonResult<String> {
        Err(key_not_stringable("bytes"))
    }

    fn serialize_none(self) -> JsonResult<String> {
        Err(key_not_stringable("option"))
    }

    fn serialize_some<T: Serialize + ?Sized>(self, _value: &T) -> JsonResult<String> {
        Err(key_not_stringable("option"))
    }

    fn serialize_unit(self) -> JsonResult<String> {
        Err(key_not_stringable("unit"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> JsonResult<String> {
        Err(key_not_stringable("unit struct"))
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> JsonResult<String> {
        Ok(variant.to_string())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> JsonResult<String> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> JsonResult<String> {
        Err(key_not_stringable("enum variant with data"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> JsonResult<Self::SerializeSeq> {
        Err(key_not_stringable("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> JsonResult<Self::SerializeTuple> {
        Err(key_not_stringable("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> JsonResult<Self::SerializeTupleStruct> {
        Err(key_not_stringable("tuple struct"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> JsonResult<Self::SerializeTupleVariant> {
        Err(key_not_stringable("enum variant with data"))
    }

    fn serialize_map(self, _len: Option<usize>) -> JsonResult<Self::SerializeMap> {
        Err(key_not_stringable("map"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> JsonResult<Self::SerializeStruct> {
        Err(key_not_stringable("struct"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> JsonResult<Self::SerializeStructVariant> {
        Err(key_not_stringable("enum variant with data"))
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(i) = self.as_i64() {
            return serializer.serialize_i64(i);
        }
        match self.as_u64() {
            Some(u) => serializer.serialize_u64(u),
            None => serializer.serialize_f64(self.as_f64()),
        }
    }
}

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use ser::{SerializeMap, SerializeSeq};

        match self {
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Bool(b) => serializer.serialize_bool(*b),
            JsonValue::Number(n) => n.serialize(serializer),
            JsonValue::String(s) => serializer.serialize_str(s),
            JsonValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            JsonValue::Object(members) => {
                let mut map = serializer.serialize_map(Some(members.len()))?;
                for (k, v) in members {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Serialize)]
    struct Schedule {
        name: &'static str,
        days: Vec<&'static str>,
        price: Option<u32>,
    }

    #[derive(Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Rect { w: u32, h: u32 },
        Pair(u8, u8),
    }

    #[test]
    fn test_struct_becomes_object() {
        let value = to_value(&Schedule {
            name: "weekday",
            days: vec!["mon", "tue"],
            price: None,
        })
        .unwrap();
        assert_eq!(
            value.to_string(),
            r#"{"days":["mon","tue"],"name":"weekday","price":null}"#
        );
    }

    #[test]
    fn test_enum_shapes_match_serde_json() {
        let shapes = vec![
            Shape::Point,
            Shape::Circle(1.5),
            Shape::Rect { w: 2, h: 3 },
            Shape::Pair(1, 2),
        ];
        let value = to_value(&shapes).unwrap();
        let via_serde_json = serde_json::to_string(&shapes).unwrap();
        let reparsed = crate::json::parse(via_serde_json.as_bytes()).unwrap();
        assert_eq!(value, reparsed);
    }

    #[test]
    fn test_serde_json_value_accepted() {
        let value = to_value(&serde_json::json!({"b": [1, 2.5], "a": null})).unwrap();
        assert_eq!(value.to_string(), r#"{"a":null,"b":[1,2.5]}"#);
    }

    #[test]
    fn test_non_finite_float_rejected() {
        assert!(matches!(
            to_value(&vec![1.0, f64::NAN]),
            Err(ErrorCode::E200_NonFiniteNumber(_))
        ));
        assert!(matches!(
            to_value(&f32::INFINITY),
            Err(ErrorCode::E200_NonFiniteNumber(_))
        ));
    }

    #[test]
    fn test_unsigned_integers_stay_exact() {
        let max = to_value(&u64::MAX).unwrap();
        assert_eq!(max.to_string(), "18446744073709551615");
        assert_ne!(max, to_value(&(u64::MAX - 1)).unwrap());
        assert_eq!(to_value(&i64::MIN).unwrap().to_string(), "-9223372036854775808");
    }

    #[test]
    fn test_wide_integers_outside_u64_rejected() {
        assert_eq!(to_value(&7u128).unwrap(), JsonValue::from(7));
        assert!(matches!(
            to_value(&u128::MAX),
            Err(ErrorCode::E202_SerializeFailed(_))
        ));
    }

    #[test]
    fn test_integer_keys_are_stringified() {
        let mut map = HashMap::new();
        map.insert(2u8, "two");
        map.insert(10u8, "ten");
        assert_eq!(to_value(&map).unwrap().to_string(), r#"{"10":"ten","2":"two"}"#);
    }

    #[test]
    fn test_non_stringable_key_rejected() {
        let mut map = BTreeMap::new();
        map.insert(vec![1, 2], "seq");
        assert_eq!(
            to_value(&map).unwrap_err(),
            ErrorCode::E201_KeyNotStringable("sequence")
        );
    }

    #[test]
    fn test_colliding_keys_rejected() {
        let mut map = BTreeMap::new();
        map.insert(Key::Int(1), 1);
        map.insert(Key::Text("1"), 2);
        assert_eq!(
            to_value(&map).unwrap_err(),
            ErrorCode::E101_DuplicateKey("1".to_string())
        );
    }

    #[test]
    fn test_option_keys_rejected() {
        let mut map = BTreeMap::new();
        map.insert(Some("a"), 1);
        assert_eq!(
            to_value(&map).unwrap_err(),
            ErrorCode::E201_KeyNotStringable("option")
        );
    }

    #[derive(Serialize, PartialEq, Eq, PartialOrd, Ord)]
    #[serde(untagged)]
    enum Key {
        Int(u32),
        Text(&'static str),
    }

    #[test]
    fn test_depth_limit_stops_runaway_nesting() {
        #[derive(Serialize)]
        struct Node {
            child: Option<Box<Node>>,
        }

        let mut node = Node { child: None };
        for _ in 0..10 {
            node = Node {
                child: Some(Box::new(node)),
            };
        }

        let mut limits = Limits::standard();
        limits.max_nesting_depth = 5;
        assert!(matches!(
            to_value_with_limits(&node, limits),
            Err(ErrorCode::E111_NestingTooDeep(6, 5))
        ));
        assert!(to_value(&node).is_ok());
    }

    #[test]
    fn test_bytes_become_integer_array() {
        struct Raw(&'static [u8]);
        impl Serialize for Raw {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_bytes(self.0)
            }
        }
        assert_eq!(to_value(&Raw(b"\x01\x02")).unwrap().to_string(), "[1,2]");
    }

    #[test]
    fn test_json_value_serializes_through_serde_json() {
        let value = crate::json::parse(br#"{"z": [true, null], "a": 0.25}"#).unwrap();
        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"a":0.25,"z":[true,null]}"#
        );
    }
}
