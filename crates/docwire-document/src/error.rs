/// Errors raised while reading a document from its text form.
///
/// These never affect the connection a payload arrived on; the caller may
/// simply try again with other bytes.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The text has no root element.
    #[error("document has no root element")]
    InvalidRoot,

    /// The text is not well-formed XML.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// The bytes are not valid UTF-8.
    #[error("document is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),
}

/// A scalar's text could not be read as its declared type.
///
/// Document lookups turn this into the caller's default value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot read {text:?} as {type_name}")]
pub struct TypeMismatch {
    /// Declared type name of the item.
    pub type_name: String,
    /// Text that failed to decode.
    pub text: String,
}

impl TypeMismatch {
    pub(crate) fn new(type_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            text: text.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
