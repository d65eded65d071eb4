//! Typed value views into document buffers and their decoded forms.

use std::borrow::Cow;

use crate::{
    array::ArrayRef,
    datetime::DateTime,
    decimal128::Decimal128,
    doc::{Doc, DocRef},
    encode,
    error::{CodeWithScopeKind, Error},
    factory::Factory,
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
};

/// A BSON timestamp: an opaque `(seconds, increment)` pair used internally by
/// MongoDB replication. On the wire the increment word comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    /// The number of seconds since the Unix epoch.
    pub time: u32,
    /// An incrementing value to order events within a given second.
    pub increment: u32,
}

/// A regular expression: a pattern and a string of options, both encoded as
/// C-strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regex<'a> {
    /// The regex pattern.
    pub pattern: Cow<'a, str>,
    /// The regex options, e.g. `"im"`.
    pub options: Cow<'a, str>,
}

impl<'a> Regex<'a> {
    /// Creates a regex value from a pattern and options.
    pub fn new(pattern: impl Into<Cow<'a, str>>, options: impl Into<Cow<'a, str>>) -> Self {
        Self {
            pattern: pattern.into(),
            options: options.into(),
        }
    }
}

/// Binary data with a subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary<'a> {
    /// The subtype tag describing the payload.
    pub subtype: BinarySubtype,
    /// The payload, excluding any legacy inner length prefix.
    pub bytes: Cow<'a, [u8]>,
}

impl<'a> Binary<'a> {
    /// Creates a binary value.
    pub fn new(subtype: BinarySubtype, bytes: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }
}

/// A DBPointer (deprecated): a namespace string and an ObjectId.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPointer<'a> {
    /// The pointed-to namespace.
    pub namespace: Cow<'a, str>,
    /// The pointed-to id.
    pub id: ObjectId,
}

impl<'a> DbPointer<'a> {
    /// Creates a DBPointer value.
    pub fn new(namespace: impl Into<Cow<'a, str>>, id: ObjectId) -> Self {
        Self {
            namespace: namespace.into(),
            id,
        }
    }
}

/// JavaScript code with an optional scope document. A missing scope encodes
/// as plain JavaScript code.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeWithScope<'a> {
    /// The code string.
    pub code: Cow<'a, str>,
    /// The scope document the code runs against.
    pub scope: Option<DocRef<'a>>,
}

impl<'a> CodeWithScope<'a> {
    /// Creates a code-with-scope value.
    pub fn new(code: impl Into<Cow<'a, str>>, scope: Option<DocRef<'a>>) -> Self {
        Self {
            code: code.into(),
            scope,
        }
    }
}

/// A decoded BSON value.
///
/// Borrowing variants reference the buffer they were decoded from; embedded
/// documents and arrays are immutable views sharing that buffer. This enum is
/// also the input to the generic [`Doc::add`](crate::Doc::add) dispatch, with
/// [`From`] conversions from the plain Rust types, so every supported payload
/// is representable and nothing else is.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value<'a> {
    /// 64-bit floating point value.
    Double(f64),
    /// UTF-8 string. Decoding is lossy: invalid UTF-8 is replaced, never
    /// rejected.
    String(Cow<'a, str>),
    /// Embedded document, borrowing the source buffer.
    Document(DocRef<'a>),
    /// Array, borrowing the source buffer.
    Array(ArrayRef<'a>),
    /// Binary data.
    Binary(Binary<'a>),
    /// Undefined (deprecated).
    Undefined,
    /// ObjectId.
    ObjectId(ObjectId),
    /// Boolean.
    Boolean(bool),
    /// UTC datetime.
    DateTime(DateTime),
    /// Null.
    Null,
    /// Regular expression.
    RegularExpression(Regex<'a>),
    /// DBPointer (deprecated).
    DbPointer(DbPointer<'a>),
    /// JavaScript code.
    JavaScriptCode(Cow<'a, str>),
    /// Symbol (deprecated).
    Symbol(Cow<'a, str>),
    /// JavaScript code with scope.
    JavaScriptCodeWithScope(CodeWithScope<'a>),
    /// 32-bit integer.
    Int32(i32),
    /// Timestamp.
    Timestamp(Timestamp),
    /// 64-bit integer.
    Int64(i64),
    /// 128-bit decimal.
    Decimal128(Decimal128),
    /// Max key.
    MaxKey,
    /// Min key.
    MinKey,
}

impl Value<'_> {
    /// The element type tag this value encodes under.
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(..) => ElementType::Double,
            Value::String(..) => ElementType::String,
            Value::Document(..) => ElementType::EmbeddedDocument,
            Value::Array(..) => ElementType::Array,
            Value::Binary(..) => ElementType::Binary,
            Value::Undefined => ElementType::Undefined,
            Value::ObjectId(..) => ElementType::ObjectId,
            Value::Boolean(..) => ElementType::Boolean,
            Value::DateTime(..) => ElementType::DateTime,
            Value::Null => ElementType::Null,
            Value::RegularExpression(..) => ElementType::RegularExpression,
            Value::DbPointer(..) => ElementType::DbPointer,
            Value::JavaScriptCode(..) => ElementType::JavaScriptCode,
            Value::Symbol(..) => ElementType::Symbol,
            Value::JavaScriptCodeWithScope(..) => ElementType::JavaScriptCodeWithScope,
            Value::Int32(..) => ElementType::Int32,
            Value::Timestamp(..) => ElementType::Timestamp,
            Value::Int64(..) => ElementType::Int64,
            Value::Decimal128(..) => ElementType::Decimal128,
            Value::MaxKey => ElementType::MaxKey,
            Value::MinKey => ElementType::MinKey,
        }
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<f32> for Value<'_> {
    fn from(v: f32) -> Self {
        Value::Double(v.into())
    }
}

impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::String(Cow::Borrowed(v))
    }
}

impl From<String> for Value<'_> {
    fn from(v: String) -> Self {
        Value::String(Cow::Owned(v))
    }
}

impl From<ObjectId> for Value<'_> {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<DateTime> for Value<'_> {
    fn from(v: DateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<Timestamp> for Value<'_> {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Decimal128> for Value<'_> {
    fn from(v: Decimal128) -> Self {
        Value::Decimal128(v)
    }
}

impl<'a> From<Regex<'a>> for Value<'a> {
    fn from(v: Regex<'a>) -> Self {
        Value::RegularExpression(v)
    }
}

impl<'a> From<Binary<'a>> for Value<'a> {
    fn from(v: Binary<'a>) -> Self {
        Value::Binary(v)
    }
}

impl<'a> From<DbPointer<'a>> for Value<'a> {
    fn from(v: DbPointer<'a>) -> Self {
        Value::DbPointer(v)
    }
}

impl<'a> From<CodeWithScope<'a>> for Value<'a> {
    fn from(v: CodeWithScope<'a>) -> Self {
        Value::JavaScriptCodeWithScope(v)
    }
}

impl<'a> From<DocRef<'a>> for Value<'a> {
    fn from(v: DocRef<'a>) -> Self {
        Value::Document(v)
    }
}

impl<'a> From<ArrayRef<'a>> for Value<'a> {
    fn from(v: ArrayRef<'a>) -> Self {
        Value::Array(v)
    }
}

impl<'a> From<&'a Doc> for Value<'a> {
    fn from(v: &'a Doc) -> Self {
        Value::Document(v.view())
    }
}

impl<'a> From<&'a crate::array::Array> for Value<'a> {
    fn from(v: &'a crate::array::Array) -> Self {
        Value::Array(v.view())
    }
}

/// An immutable, length-validated view of one encoded value inside a
/// document buffer.
///
/// Construction determines the value's exact byte length from its type tag
/// and rejects every ill-formed layout; a failed parse yields a view whose
/// [`err`](ValueView::err) is set rather than a panic or an unwinding error.
/// The view borrows the source buffer and cannot outlive it; use
/// [`to_owned`](ValueView::to_owned) for a copy that can.
pub struct ValueView<'a> {
    factory: &'a Factory,
    element_type: ElementType,
    data: &'a [u8],
    err: Option<Error>,
}

impl<'a> ValueView<'a> {
    /// Parses the value of type `tag` starting at `src[0]` (the byte just
    /// after the element key's terminator).
    pub(crate) fn parse(factory: &'a Factory, src: &'a [u8], tag: u8) -> Self {
        let element_type = match tag {
            0 => return Self::end(factory),
            t => match ElementType::from_u8(t) {
                Some(et) => et,
                None => {
                    return Self {
                        factory,
                        element_type: ElementType::Invalid,
                        data: &[],
                        err: Some(Error::unsupported_type(t)),
                    }
                }
            },
        };
        match locate(element_type, src) {
            Ok(data) => Self {
                factory,
                element_type,
                data,
                err: None,
            },
            Err(err) => Self {
                factory,
                element_type,
                data: &[],
                err: Some(err),
            },
        }
    }

    /// The view an exhausted iterator reports: invalid type, no data, no
    /// error.
    pub(crate) fn end(factory: &'a Factory) -> Self {
        Self {
            factory,
            element_type: ElementType::Invalid,
            data: &[],
            err: None,
        }
    }

    pub(crate) fn record_err(&mut self, err: Error) {
        self.err = Some(err);
    }

    /// The value's element type, or [`ElementType::Invalid`] past the end of
    /// a document.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The value's raw payload bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty (true for null, undefined, min key, and
    /// max key).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Any error recorded while parsing the value.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Copies the payload bytes into `dst`, returning the number of bytes
    /// copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let n = self.data.len().min(dst.len());
        dst[..n].copy_from_slice(&self.data[..n]);
        n
    }

    /// Decodes the payload into a [`Value`]. Returns `None` if the view did
    /// not parse cleanly or the iterator that produced it was exhausted.
    ///
    /// Embedded documents and arrays in the result borrow this view's
    /// buffer; all other variants are cheap copies or borrows of the raw
    /// bytes.
    pub fn get(&self) -> Option<Value<'a>> {
        if self.err.is_some() {
            return None;
        }

        // Length checks in the constructor guarantee the slices below.
        Some(match self.element_type {
            ElementType::Invalid => return None,
            ElementType::Null => Value::Null,
            ElementType::Undefined => Value::Undefined,
            ElementType::MinKey => Value::MinKey,
            ElementType::MaxKey => Value::MaxKey,
            ElementType::Boolean => Value::Boolean(self.data[0] != 0),
            ElementType::Int32 => Value::Int32(encode::read_i32(self.data, 0).ok()?),
            ElementType::Double => Value::Double(encode::read_f64(self.data, 0).ok()?),
            ElementType::Int64 => Value::Int64(encode::read_i64(self.data, 0).ok()?),
            ElementType::DateTime => {
                Value::DateTime(DateTime::from_millis(encode::read_i64(self.data, 0).ok()?))
            }
            ElementType::Timestamp => Value::Timestamp(Timestamp {
                increment: encode::read_u32(self.data, 0).ok()?,
                time: encode::read_u32(self.data, 4).ok()?,
            }),
            ElementType::ObjectId => {
                Value::ObjectId(ObjectId::from_bytes(self.data[..12].try_into().ok()?))
            }
            ElementType::Decimal128 => Value::Decimal128(Decimal128::from_parts(
                encode::read_u64(self.data, 8).ok()?,
                encode::read_u64(self.data, 0).ok()?,
            )),
            ElementType::String => Value::String(self.lenstring()),
            ElementType::Symbol => Value::Symbol(self.lenstring()),
            ElementType::JavaScriptCode => Value::JavaScriptCode(self.lenstring()),
            ElementType::EmbeddedDocument => {
                Value::Document(DocRef::new(self.factory, self.data))
            }
            ElementType::Array => {
                Value::Array(ArrayRef::new(DocRef::new(self.factory, self.data)))
            }
            ElementType::JavaScriptCodeWithScope => {
                let str_len = encode::read_i32(self.data, 4).ok()? as usize;
                let code = String::from_utf8_lossy(&self.data[8..8 + str_len - 1]);
                let scope = DocRef::new(self.factory, &self.data[8 + str_len..]);
                Value::JavaScriptCodeWithScope(CodeWithScope {
                    code,
                    scope: Some(scope),
                })
            }
            ElementType::Binary => {
                let subtype = BinarySubtype::from(self.data[4]);
                let mut payload = &self.data[5..];
                // The legacy subtype carries its own length prefix, which is
                // not part of the payload.
                if subtype == BinarySubtype::BinaryOld && payload.len() >= 4 {
                    payload = &payload[4..];
                }
                Value::Binary(Binary {
                    subtype,
                    bytes: Cow::Borrowed(payload),
                })
            }
            ElementType::RegularExpression => {
                let pattern = encode::read_cstring(self.data, 0).ok()?;
                let options = encode::read_cstring(self.data, pattern.len() + 1).ok()?;
                Value::RegularExpression(Regex {
                    pattern: String::from_utf8_lossy(pattern),
                    options: String::from_utf8_lossy(options),
                })
            }
            ElementType::DbPointer => {
                let str_len = encode::read_i32(self.data, 0).ok()? as usize;
                let namespace = String::from_utf8_lossy(&self.data[4..4 + str_len - 1]);
                let id = ObjectId::from_bytes(
                    self.data[4 + str_len..4 + str_len + 12].try_into().ok()?,
                );
                Value::DbPointer(DbPointer { namespace, id })
            }
        })
    }

    fn lenstring(&self) -> Cow<'a, str> {
        // Skip the length prefix and omit the trailing null byte.
        String::from_utf8_lossy(&self.data[4..self.data.len() - 1])
    }

    /// Copies the payload into a fresh pool-allocated buffer and returns an
    /// [`OwnedValue`] that may outlive the source document.
    pub fn to_owned(&self) -> OwnedValue {
        let buf = if self.element_type != ElementType::Invalid {
            let buf = self.factory.acquire();
            let mut buf = self.factory.resize(buf, self.data.len());
            buf.copy_from_slice(self.data);
            buf
        } else {
            Vec::new()
        };
        OwnedValue {
            factory: self.factory.clone(),
            element_type: self.element_type,
            buf,
            err: self.err.clone(),
        }
    }
}

impl std::fmt::Debug for ValueView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueView")
            .field("element_type", &self.element_type)
            .field("data", &hex::encode(self.data))
            .field("err", &self.err)
            .finish()
    }
}

/// Determines the byte length of a value of type `et` at the start of `src`
/// and returns the validated sub-slice.
fn locate(et: ElementType, src: &[u8]) -> Result<&[u8], Error> {
    use ElementType::*;

    let fixed = |n: usize| -> Result<&[u8], Error> {
        encode::has_enough_bytes(src, 0, n)?;
        Ok(&src[..n])
    };

    match et {
        Invalid => Ok(&src[0..0]),
        Null | Undefined | MinKey | MaxKey => Ok(&src[0..0]),
        Boolean => fixed(1),
        Int32 => fixed(4),
        Double | Int64 | DateTime | Timestamp => fixed(8),
        ObjectId => fixed(12),
        Decimal128 => fixed(16),

        String | Symbol | JavaScriptCode => {
            // Minimum bytes: length + null == 5
            encode::has_enough_bytes(src, 0, 5)?;
            let n = encode::read_i32(src, 0)? as i64;
            if n < 1 {
                return Err(Error::short_buffer());
            }
            // The encoded length does not include the prefix itself.
            let len = (n + 4) as usize;
            encode::has_enough_bytes(src, 0, len)?;
            Ok(&src[..len])
        }

        EmbeddedDocument | Array => {
            // Minimum bytes: length + null == 5
            encode::has_enough_bytes(src, 0, 5)?;
            let n = encode::read_i32(src, 0)? as i64;
            if n < 5 {
                return Err(Error::short_buffer());
            }
            // The encoded length includes itself.
            let len = n as usize;
            encode::has_enough_bytes(src, 0, len)?;
            if src[len - 1] != 0 {
                return Err(Error::missing_terminator(format!("{et} value")));
            }
            Ok(&src[..len])
        }

        JavaScriptCodeWithScope => {
            // Minimum bytes: length + length + null + length + null == 14
            encode::has_enough_bytes(src, 0, 14)?;
            let total = encode::read_i32(src, 0)? as i64;
            if total < 14 {
                return Err(Error::short_buffer());
            }
            // The encoded length includes itself.
            encode::has_enough_bytes(src, 0, total as usize)?;
            let str_len = encode::read_i32(src, 4)? as i64;
            if str_len < 1 {
                return Err(Error::code_with_scope(
                    CodeWithScopeKind::NonPositiveStringLength,
                ));
            }
            // The encoded string length must leave room for doc length +
            // null.
            if total - str_len < 5 {
                return Err(Error::code_with_scope(CodeWithScopeKind::StringLengthTooLong));
            }
            // The encoded doc length must consume the rest of the bytes and
            // describe a minimally-sized document.
            let doc_len = usize::try_from(8 + str_len)
                .ok()
                .and_then(|off| encode::read_i32(src, off).ok())
                .unwrap_or(0) as i64;
            if total != 8 + str_len + doc_len || doc_len < 5 {
                return Err(Error::code_with_scope(CodeWithScopeKind::ScopeSizeInvalid));
            }
            let len = total as usize;
            if src[len - 1] != 0 {
                return Err(Error::code_with_scope(
                    CodeWithScopeKind::ScopeMissingTerminator,
                ));
            }
            Ok(&src[..len])
        }

        Binary => {
            // Minimum bytes: length + subtype byte == 5
            encode::has_enough_bytes(src, 0, 5)?;
            let n = encode::read_i32(src, 0)? as i64;
            if n < 0 {
                return Err(Error::short_buffer());
            }
            // The encoded length includes neither itself nor the subtype
            // byte. No check of the legacy inner length for subtype 2.
            let len = (n + 5) as usize;
            encode::has_enough_bytes(src, 0, len)?;
            Ok(&src[..len])
        }

        RegularExpression => {
            // Minimum bytes: two cstring null terminators
            encode::has_enough_bytes(src, 0, 2)?;
            let first = src
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(Error::missing_cstring_terminator)?;
            let second = src[first + 1..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(Error::missing_cstring_terminator)?;
            Ok(&src[..first + second + 2])
        }

        DbPointer => {
            // Minimum bytes: length + null + 12-byte id == 17
            encode::has_enough_bytes(src, 0, 17)?;
            let n = encode::read_i32(src, 0)? as i64;
            if n < 1 {
                return Err(Error::short_buffer());
            }
            // The encoded length includes neither itself nor the trailing 12
            // id bytes.
            let len = (n + 16) as usize;
            encode::has_enough_bytes(src, 0, len)?;
            Ok(&src[..len])
        }
    }
}

/// A value plus a pool-allocated copy of its payload bytes.
///
/// Unlike a [`ValueView`], an owned value does not borrow the source document
/// and may outlive it. The copy is returned to the pool by
/// [`release`](OwnedValue::release) or on drop.
pub struct OwnedValue {
    factory: Factory,
    element_type: ElementType,
    buf: Vec<u8>,
    err: Option<Error>,
}

impl OwnedValue {
    /// The value's element type.
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// The copied payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The payload length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Any error carried over from the view this value was cloned from, or
    /// recorded by [`release`](OwnedValue::release).
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// A borrowing view of the copied payload.
    pub fn view(&self) -> ValueView<'_> {
        ValueView {
            factory: &self.factory,
            element_type: self.element_type,
            data: &self.buf,
            err: self.err.clone(),
        }
    }

    /// Decodes the payload into a [`Value`] borrowing from this owned copy.
    pub fn get(&self) -> Option<Value<'_>> {
        self.view().get()
    }

    /// Copies the payload bytes into `dst`, returning the number of bytes
    /// copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let n = self.buf.len().min(dst.len());
        dst[..n].copy_from_slice(&self.buf[..n]);
        n
    }

    /// Returns the copied buffer to the pool. Afterwards the value reports
    /// [`ElementType::Invalid`] and a "value released" error.
    pub fn release(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        if buf.capacity() > 0 {
            self.factory.release_buf(buf);
        }
        self.element_type = ElementType::Invalid;
        self.err = Some(Error::value_released());
    }
}

impl Drop for OwnedValue {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        if buf.capacity() > 0 {
            self.factory.release_buf(buf);
        }
    }
}

impl std::fmt::Debug for OwnedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnedValue")
            .field("element_type", &self.element_type)
            .field("data", &hex::encode(&self.buf))
            .field("err", &self.err)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorKind;

    fn parse<'a>(factory: &'a Factory, src: &'a [u8], et: ElementType) -> ValueView<'a> {
        ValueView::parse(factory, src, et as u8)
    }

    // Every type except null, undefined, min key, and max key requires a
    // fixed or minimum number of bytes.
    #[test]
    fn parse_rejects_short_buffers() {
        let factory = Factory::new();

        let cases: &[(usize, &[ElementType])] = &[
            (1, &[ElementType::Boolean]),
            (2, &[ElementType::RegularExpression]),
            (4, &[ElementType::Int32]),
            (
                5,
                &[
                    ElementType::String,
                    ElementType::EmbeddedDocument,
                    ElementType::Array,
                    ElementType::Binary,
                    ElementType::Symbol,
                    ElementType::JavaScriptCode,
                ],
            ),
            (
                8,
                &[
                    ElementType::Double,
                    ElementType::Int64,
                    ElementType::DateTime,
                    ElementType::Timestamp,
                ],
            ),
            (12, &[ElementType::ObjectId]),
            (14, &[ElementType::JavaScriptCodeWithScope]),
            (16, &[ElementType::Decimal128]),
            (17, &[ElementType::DbPointer]),
        ];

        for (min_len, types) in cases {
            for &et in *types {
                let empty = parse(&factory, &[], et);
                assert_eq!(
                    empty.err().map(|e| &e.kind),
                    Some(&ErrorKind::ShortBuffer),
                    "{et} with empty buffer"
                );

                let short = vec![0u8; min_len - 1];
                let view = parse(&factory, &short, et);
                assert_eq!(
                    view.err().map(|e| &e.kind),
                    Some(&ErrorKind::ShortBuffer),
                    "{et} with {} bytes",
                    min_len - 1
                );
            }
        }
    }

    // Some types have a leading length, though they vary in whether it
    // counts itself. A declared length that exceeds the available bytes must
    // be rejected.
    #[test]
    fn parse_rejects_bad_leading_lengths() {
        let factory = Factory::new();

        let cases: &[(ElementType, bool)] = &[
            (ElementType::String, false),
            (ElementType::EmbeddedDocument, true),
            (ElementType::Array, true),
            (ElementType::Binary, false),
            (ElementType::JavaScriptCode, false),
            (ElementType::Symbol, false),
        ];

        for &(et, length_includes_self) in cases {
            let min_len = 5;
            let mut declared = min_len as i32 + 1;
            if !length_includes_self {
                declared -= 4;
            }

            let mut buf = vec![0u8; min_len];
            buf[..4].copy_from_slice(&declared.to_le_bytes());
            let view = parse(&factory, &buf, et);
            assert_eq!(
                view.err().map(|e| &e.kind),
                Some(&ErrorKind::ShortBuffer),
                "{et} with zeroed tail"
            );

            // Nonzero sentinel bytes after the length, with a null where the
            // layout expects one.
            let mut buf = vec![0xFFu8; min_len];
            buf[..4].copy_from_slice(&declared.to_le_bytes());
            buf[4] = 0;
            let view = parse(&factory, &buf, et);
            assert_eq!(
                view.err().map(|e| &e.kind),
                Some(&ErrorKind::ShortBuffer),
                "{et} with sentinel tail"
            );
        }
    }

    #[test]
    fn parse_requires_subdocument_terminator() {
        let factory = Factory::new();
        // Declared length of 5 but the last byte is not null.
        let buf = [5u8, 0, 0, 0, 1];
        for et in [ElementType::EmbeddedDocument, ElementType::Array] {
            let view = parse(&factory, &buf, et);
            assert!(
                matches!(
                    view.err().map(|e| &e.kind),
                    Some(ErrorKind::MissingTerminator { .. })
                ),
                "{et}"
            );
        }
    }

    // Code with scope has several ways the internal structure can be
    // invalid.
    #[test]
    fn parse_rejects_bad_code_with_scope_layouts() {
        let factory = Factory::new();

        let cases: &[(&str, &str, ErrorKind)] = &[
            (
                "declared length exceeds buffer",
                "0f000000 01000000 00 05000000 00",
                ErrorKind::ShortBuffer,
            ),
            (
                "unterminated scope",
                "0e000000 01000000 00 05000000 ff",
                ErrorKind::CodeWithScopeBadLayout {
                    kind: CodeWithScopeKind::ScopeMissingTerminator,
                },
            ),
            (
                "zero string length",
                "0e000000 00000000 00 05000000 00",
                ErrorKind::CodeWithScopeBadLayout {
                    kind: CodeWithScopeKind::NonPositiveStringLength,
                },
            ),
            (
                "string length too long",
                "0e000000 0a000000 00 05000000 00",
                ErrorKind::CodeWithScopeBadLayout {
                    kind: CodeWithScopeKind::StringLengthTooLong,
                },
            ),
            (
                "scope size mismatch",
                "0f000000 01000000 00 05000000 00 00",
                ErrorKind::CodeWithScopeBadLayout {
                    kind: CodeWithScopeKind::ScopeSizeInvalid,
                },
            ),
        ];

        for (label, src, want) in cases {
            let buf = hex::decode(src.replace(' ', "")).unwrap();
            let view = parse(&factory, &buf, ElementType::JavaScriptCodeWithScope);
            assert_eq!(view.err().map(|e| &e.kind), Some(want), "{label}");
        }
    }

    #[test]
    fn parse_rejects_unterminated_regex() {
        let factory = Factory::new();
        let view = parse(&factory, b"abc", ElementType::RegularExpression);
        assert_eq!(
            view.err().map(|e| &e.kind),
            Some(&ErrorKind::MissingCStringTerminator)
        );
        // Terminated pattern, unterminated options.
        let view = parse(&factory, b"abc\0im", ElementType::RegularExpression);
        assert_eq!(
            view.err().map(|e| &e.kind),
            Some(&ErrorKind::MissingCStringTerminator)
        );
        // Empty pattern and options are legal.
        let view = parse(&factory, b"\0\0", ElementType::RegularExpression);
        assert!(view.err().is_none());
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn parse_rejects_unknown_tags() {
        let factory = Factory::new();
        let view = ValueView::parse(&factory, &[1, 2, 3], 0x42);
        assert_eq!(view.element_type(), ElementType::Invalid);
        assert_eq!(
            view.err().map(|e| &e.kind),
            Some(&ErrorKind::UnsupportedType { tag: 0x42 })
        );
    }

    #[test]
    fn empty_payload_types_parse_and_decode_without_error() {
        let factory = Factory::new();
        for (et, want) in [
            (ElementType::Null, Value::Null),
            (ElementType::Undefined, Value::Undefined),
            (ElementType::MinKey, Value::MinKey),
            (ElementType::MaxKey, Value::MaxKey),
        ] {
            let view = parse(&factory, &[], et);
            assert!(view.err().is_none(), "{et}");
            assert_eq!(view.len(), 0);
            assert_eq!(view.get(), Some(want));
        }
    }

    #[test]
    fn binary_old_decode_skips_inner_length() {
        let factory = Factory::new();
        // n = 6: inner length (4) + two payload bytes.
        let buf = hex::decode("060000000202000000ffff").unwrap();
        let view = parse(&factory, &buf, ElementType::Binary);
        assert!(view.err().is_none());
        match view.get() {
            Some(Value::Binary(bin)) => {
                assert_eq!(bin.subtype, BinarySubtype::BinaryOld);
                assert_eq!(&*bin.bytes, &[0xFF, 0xFF]);
            }
            other => panic!("expected binary, got {other:?}"),
        }

        // A mismatched inner length still parses; only the outer length is
        // authoritative.
        let buf = hex::decode("060000000263000000ffff").unwrap();
        let view = parse(&factory, &buf, ElementType::Binary);
        assert!(view.err().is_none());
        assert_eq!(view.len(), 11);
    }

    #[test]
    fn owned_value_outlives_its_source() {
        let factory = Factory::new();
        let owned = {
            let mut doc = factory.new_doc();
            doc.add_str("a", "hello");
            let mut iter = doc.iter();
            assert!(iter.advance());
            let owned = iter.value().unwrap();
            doc.release();
            owned
        };
        assert_eq!(owned.element_type(), ElementType::String);
        assert_eq!(owned.get(), Some(Value::String("hello".into())));
    }

    #[test]
    fn owned_value_release_is_observable() {
        let factory = Factory::new();
        let mut doc = factory.new_doc();
        doc.add_i32("i", 7);
        let mut iter = doc.iter();
        assert!(iter.advance());
        let mut owned = iter.value().unwrap();
        owned.release();
        assert_eq!(owned.element_type(), ElementType::Invalid);
        assert_eq!(owned.err().unwrap().kind, ErrorKind::ValueReleased);
        assert_eq!(owned.get(), None);
    }
}
