//! Text encoding of leaf values.
//!
//! Every scalar travels as a `(type name, text)` pair. Composite shapes are
//! handled by the document layer and never reach this module.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Serialize, Serializer};

use crate::error::TypeMismatch;

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Leaf type tags understood by [`decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Int,
    UInt,
    Float,
    Bool,
    Char,
    String,
    Date,
    Time,
    DateTime,
    Bytes,
}

impl ScalarType {
    pub const ALL: [ScalarType; 10] = [
        ScalarType::Int,
        ScalarType::UInt,
        ScalarType::Float,
        ScalarType::Bool,
        ScalarType::Char,
        ScalarType::String,
        ScalarType::Date,
        ScalarType::Time,
        ScalarType::DateTime,
        ScalarType::Bytes,
    ];

    /// Type name written to the `type` attribute.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Float => "double",
            ScalarType::Bool => "bool",
            ScalarType::Char => "char",
            ScalarType::String => "string",
            ScalarType::Date => "date",
            ScalarType::Time => "time",
            ScalarType::DateTime => "datetime",
            ScalarType::Bytes => "bytes",
        }
    }

    /// Look up a type name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Bytes(Vec<u8>),
}

impl Scalar {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Int(_) => ScalarType::Int,
            Scalar::UInt(_) => ScalarType::UInt,
            Scalar::Float(_) => ScalarType::Float,
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::Char(_) => ScalarType::Char,
            Scalar::String(_) => ScalarType::String,
            Scalar::Date(_) => ScalarType::Date,
            Scalar::Time(_) => ScalarType::Time,
            Scalar::DateTime(_) => ScalarType::DateTime,
            Scalar::Bytes(_) => ScalarType::Bytes,
        }
    }

    /// The text form written into a document.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::UInt(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::Bool(v) => v.to_string(),
            Scalar::Char(v) => v.to_string(),
            Scalar::String(v) => v.clone(),
            Scalar::Date(v) => v.to_string(),
            Scalar::Time(v) => v.to_string(),
            Scalar::DateTime(v) => v.format(DATETIME_FORMAT).to_string(),
            Scalar::Bytes(v) => STANDARD.encode(v),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Int(v) => serializer.serialize_i64(*v),
            Scalar::UInt(v) => serializer.serialize_u64(*v),
            Scalar::Float(v) => serializer.serialize_f64(*v),
            Scalar::Bool(v) => serializer.serialize_bool(*v),
            Scalar::Char(v) => serializer.serialize_char(*v),
            Scalar::String(v) => serializer.serialize_str(v),
            other => serializer.serialize_str(&other.to_text()),
        }
    }
}

/// Split a scalar into its type tag and text.
pub fn encode(value: &Scalar) -> (ScalarType, String) {
    (value.scalar_type(), value.to_text())
}

/// Read `text` as a value of type `ty`.
///
/// Numbers, booleans and temporal values tolerate surrounding whitespace;
/// strings and chars are taken verbatim.
pub fn decode(text: &str, ty: ScalarType) -> Result<Scalar, TypeMismatch> {
    let mismatch = || TypeMismatch::new(ty.name(), text);
    let trimmed = text.trim();

    match ty {
        ScalarType::Int => trimmed.parse().map(Scalar::Int).map_err(|_| mismatch()),
        ScalarType::UInt => trimmed.parse().map(Scalar::UInt).map_err(|_| mismatch()),
        ScalarType::Float => trimmed.parse().map(Scalar::Float).map_err(|_| mismatch()),
        ScalarType::Bool => parse_bool(trimmed).map(Scalar::Bool).ok_or_else(mismatch),
        ScalarType::Char => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Scalar::Char(c)),
                _ => Err(mismatch()),
            }
        }
        ScalarType::String => Ok(Scalar::String(text.to_string())),
        ScalarType::Date => trimmed.parse().map(Scalar::Date).map_err(|_| mismatch()),
        ScalarType::Time => trimmed.parse().map(Scalar::Time).map_err(|_| mismatch()),
        ScalarType::DateTime => trimmed
            .parse()
            .map(Scalar::DateTime)
            .map_err(|_| mismatch()),
        ScalarType::Bytes => STANDARD
            .decode(trimmed)
            .map(Scalar::Bytes)
            .map_err(|_| mismatch()),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}
