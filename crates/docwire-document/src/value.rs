use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::scalar::{Scalar, ScalarType};

/// An application value stored in a document.
///
/// Composites nest without a depth limit. `OrderedMap` iterates by key,
/// `HashMap` in no particular order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    List(Vec<Value>),
    OrderedMap(BTreeMap<String, Value>),
    HashMap(HashMap<String, Value>),
    StringList(Vec<String>),
}

/// Shape of an item, decided by its type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Scalar(ScalarType),
    List,
    OrderedMap,
    HashMap,
    StringList,
}

impl ItemKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ItemKind::Scalar(ty) => ty.name(),
            ItemKind::List => "list",
            ItemKind::OrderedMap => "ordered-map",
            ItemKind::HashMap => "hash-map",
            ItemKind::StringList => "string-list",
        }
    }

    /// Resolve a `type` attribute, ignoring ASCII case. Unknown names yield `None`.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let composite = [
            ItemKind::List,
            ItemKind::OrderedMap,
            ItemKind::HashMap,
            ItemKind::StringList,
        ];
        composite
            .into_iter()
            .find(|kind| kind.type_name().eq_ignore_ascii_case(name))
            .or_else(|| ScalarType::from_name(name).map(ItemKind::Scalar))
    }

    pub fn is_composite(self) -> bool {
        !matches!(self, ItemKind::Scalar(_))
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl Value {
    pub fn kind(&self) -> ItemKind {
        match self {
            Value::Scalar(scalar) => ItemKind::Scalar(scalar.scalar_type()),
            Value::List(_) => ItemKind::List,
            Value::OrderedMap(_) => ItemKind::OrderedMap,
            Value::HashMap(_) => ItemKind::HashMap,
            Value::StringList(_) => ItemKind::StringList,
        }
    }

    /// Byte blob value.
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Value::Scalar(Scalar::Bytes(data.into()))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.as_scalar()? {
            Scalar::Int(v) => Some(*v),
            Scalar::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.as_scalar()? {
            Scalar::UInt(v) => Some(*v),
            Scalar::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.as_scalar()? {
            Scalar::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.as_scalar()? {
            Scalar::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.as_scalar()? {
            Scalar::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            Value::StringList(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_ordered_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::OrderedMap(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_hash_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::HashMap(map) => Some(map),
            _ => None,
        }
    }

    /// Text form of a scalar; composites have none.
    pub fn to_text(&self) -> Option<String> {
        self.as_scalar().map(Scalar::to_text)
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::Scalar(Scalar::$variant(<$target>::from(v)))
                }
            }
        )*
    };
}

scalar_from! {
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    bool => Bool as bool,
    char => Char as char,
    String => String as String,
    &str => String as String,
    NaiveDate => Date as NaiveDate,
    NaiveTime => Time as NaiveTime,
    NaiveDateTime => DateTime as NaiveDateTime,
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::bytes(data)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::StringList(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::StringList(items.into_iter().map(str::to_string).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::OrderedMap(map)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::HashMap(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_runtime_shape() {
        assert_eq!(Value::from(3).kind(), ItemKind::Scalar(ScalarType::Int));
        assert_eq!(Value::from(3u8).kind(), ItemKind::Scalar(ScalarType::UInt));
        assert_eq!(Value::from(1.5f32).kind(), ItemKind::Scalar(ScalarType::Float));
        assert_eq!(Value::from("x").kind(), ItemKind::Scalar(ScalarType::String));
        assert_eq!(Value::from(&b"raw"[..]).kind(), ItemKind::Scalar(ScalarType::Bytes));
        assert_eq!(Value::from(vec![Value::from(1)]).kind(), ItemKind::List);
        assert_eq!(Value::from(vec!["a", "b"]).kind(), ItemKind::StringList);
        assert_eq!(Value::from(BTreeMap::new()).kind(), ItemKind::OrderedMap);
        assert_eq!(Value::from(HashMap::new()).kind(), ItemKind::HashMap);
    }

    #[test]
    fn type_names_resolve() {
        for kind in [
            ItemKind::List,
            ItemKind::OrderedMap,
            ItemKind::HashMap,
            ItemKind::StringList,
            ItemKind::Scalar(ScalarType::DateTime),
        ] {
            assert_eq!(ItemKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(ItemKind::from_type_name("String-List"), Some(ItemKind::StringList));
        assert_eq!(ItemKind::from_type_name("QPointF"), None);
        assert!(ItemKind::List.is_composite());
        assert!(!ItemKind::Scalar(ScalarType::Int).is_composite());
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(7u32).as_i64(), Some(7));
        assert_eq!(Value::from(-1).as_u64(), None);
        assert_eq!(Value::from("s").as_str(), Some("s"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(2.0).as_f64(), Some(2.0));
        assert_eq!(Value::from(vec!["a"]).as_string_list(), Some(&["a".to_string()][..]));
        assert_eq!(Value::from(vec![Value::from(1)]).to_text(), None);
        assert_eq!(Value::from(12).to_text().as_deref(), Some("12"));
    }

    #[test]
    fn serializes_untagged() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), Value::from(vec!["x"]));
        map.insert("a".to_string(), Value::from(vec![Value::from(1), Value::from(2.5)]));

        let json = serde_json::to_string(&Value::from(map)).unwrap();
        assert_eq!(json, r#"{"a":[1,2.5],"b":["x"]}"#);
    }
}
