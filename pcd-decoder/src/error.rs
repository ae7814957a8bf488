use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Malformed or truncated input, including any LZF range violation.
    #[error("corrupt PCD data: {0}")]
    CorruptData(String),

    /// A consumed field declares a `(TYPE, SIZE)` pair the decoder cannot read.
    #[error("unsupported field type for '{field}': TYPE {kind} SIZE {size}")]
    UnsupportedFieldType {
        field: String,
        kind: char,
        size: usize,
    },

    #[error("PCD header is missing {0}")]
    MissingHeader(&'static str),
}

impl DecodeError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptData(message.into())
    }
}
