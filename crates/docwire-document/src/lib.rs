//! Self-describing typed value documents.
//!
//! A [`ValueDocument`] stores application values under `(group, key)`
//! addresses together with two routing ids, and converts to and from a
//! UTF-8 XML text form. Every item carries a type name, so scalars,
//! lists, ordered maps, hash maps and string lists survive the round trip
//! with their types intact.
//!
//! Reads are lenient: a missing or unreadable value resolves to the caller's
//! default, and unreadable elements of a composite are skipped.

pub mod document;
pub mod error;
pub mod scalar;
pub mod value;
pub mod xml;

pub use document::{Item, ValueDocument};
pub use error::{ParseError, Result, TypeMismatch};
pub use scalar::{Scalar, ScalarType};
pub use value::{ItemKind, Value};
