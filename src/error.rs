//! Error types returned throughout the crate.

use std::fmt;

use thiserror::Error;

/// The result type for all fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while building, importing, or reading a BSON
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,

    /// The document key associated with the error, if any.
    pub key: Option<String>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(key) = self.key.as_deref() {
            write!(f, "error at key \"{key}\": ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, key: None }
    }
}

/// The kinds of errors that can occur in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Fewer bytes remain than required to decode a value.
    #[error("not enough bytes available to read value")]
    ShortBuffer,

    /// A document's framing length does not equal its buffer length.
    #[error("document length doesn't match buffer length")]
    InvalidLength,

    /// A document buffer or sub-document is not null-terminated.
    #[error("{item} missing null terminator")]
    MissingTerminator {
        /// What was unterminated, e.g. `"document buffer"` or `"array value"`.
        item: String,
    },

    /// A key or regex component has no null terminator.
    #[error("cstring null terminator not found")]
    MissingCStringTerminator,

    /// A mutation was attempted on a released or otherwise invalid document.
    #[error("can't modify immutable or invalid document")]
    ImmutableOrInvalid,

    /// A document was used after its buffer was released.
    #[error("buffer released")]
    BufferReleased,

    /// A code-with-scope value had an impossible internal layout.
    #[error("code with scope {kind}")]
    CodeWithScopeBadLayout {
        /// Which internal check failed.
        kind: CodeWithScopeKind,
    },

    /// A value's declared length would cross its container's terminator.
    #[error("invalid internal length exceeds container")]
    InternalLengthExceedsContainer,

    /// A value was used after it was released.
    #[error("value released")]
    ValueReleased,

    /// A value parser was handed a type tag it does not know.
    #[error("unsupported element type: {tag:#04x}")]
    UnsupportedType {
        /// The unrecognized tag byte.
        tag: u8,
    },
}

/// The ways a code-with-scope payload can be internally inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CodeWithScopeKind {
    /// The code string's declared length is non-positive.
    #[error("invalid, non-positive string length")]
    NonPositiveStringLength,

    /// The code string's declared length leaves no room for the scope.
    #[error("string length too long")]
    StringLengthTooLong,

    /// The declared lengths of code and scope don't add up to the total.
    #[error("scope size invalid")]
    ScopeSizeInvalid,

    /// The scope document is not null-terminated.
    #[error("scope missing null terminator")]
    ScopeMissingTerminator,
}

impl Error {
    pub(crate) fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub(crate) fn short_buffer() -> Self {
        ErrorKind::ShortBuffer.into()
    }

    pub(crate) fn invalid_length() -> Self {
        ErrorKind::InvalidLength.into()
    }

    pub(crate) fn missing_terminator(item: impl Into<String>) -> Self {
        ErrorKind::MissingTerminator { item: item.into() }.into()
    }

    pub(crate) fn missing_cstring_terminator() -> Self {
        ErrorKind::MissingCStringTerminator.into()
    }

    pub(crate) fn immutable_or_invalid() -> Self {
        ErrorKind::ImmutableOrInvalid.into()
    }

    pub(crate) fn buffer_released() -> Self {
        ErrorKind::BufferReleased.into()
    }

    pub(crate) fn code_with_scope(kind: CodeWithScopeKind) -> Self {
        ErrorKind::CodeWithScopeBadLayout { kind }.into()
    }

    pub(crate) fn internal_length_exceeds_container() -> Self {
        ErrorKind::InternalLengthExceedsContainer.into()
    }

    pub(crate) fn value_released() -> Self {
        ErrorKind::ValueReleased.into()
    }

    pub(crate) fn unsupported_type(tag: u8) -> Self {
        ErrorKind::UnsupportedType { tag }.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_key_when_present() {
        let err = Error::short_buffer().with_key("total");
        assert_eq!(
            err.to_string(),
            "error at key \"total\": not enough bytes available to read value"
        );
    }

    #[test]
    fn code_with_scope_display_carries_sub_kind() {
        let err = Error::code_with_scope(CodeWithScopeKind::ScopeSizeInvalid);
        assert_eq!(err.to_string(), "code with scope scope size invalid");
    }
}
