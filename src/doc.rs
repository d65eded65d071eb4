//! The mutable document builder and the borrowed document view.

use std::fmt;

use crate::{
    array::ArrayRef,
    datetime::DateTime,
    decimal128::Decimal128,
    encode,
    error::{Error, Result},
    factory::Factory,
    iter::DocIter,
    oid::ObjectId,
    spec::{BinarySubtype, ElementType},
    value::{Timestamp, Value, ValueView},
};

/// Checks the framing invariant: a leading little-endian length equal to the
/// buffer length and a trailing null byte.
pub(crate) fn validate_framing(buf: &[u8]) -> Result<()> {
    let length = encode::read_i32(buf, 0)?;
    if buf.len() < 5 {
        return Err(Error::short_buffer());
    }
    if buf.len() != length as usize {
        return Err(Error::invalid_length());
    }
    if buf[buf.len() - 1] != 0 {
        return Err(Error::missing_terminator("document buffer"));
    }
    Ok(())
}

/// An owned, mutable BSON document backed by a pooled buffer.
///
/// The buffer is a valid encoded document at every step: each append grows it
/// in place, writes the new element over the old terminator, and restores the
/// leading length and trailing null byte.
///
/// Append operations return `&mut Self` so they can be chained; a failed
/// append records a sticky error observable through [`Doc::err`] and leaves
/// the document bytes untouched. [`Doc::release`] returns the buffer to the
/// factory's pool early; dropping an unreleased document does the same.
///
/// ```
/// use bsonbuf::Factory;
///
/// let factory = Factory::new();
/// let mut doc = factory.new_doc();
/// doc.add_str("greeting", "hello").add_i32("count", 3);
/// assert!(doc.err().is_none());
/// assert_eq!(doc.len(), 36);
/// ```
pub struct Doc {
    factory: Factory,
    buf: Vec<u8>,
    valid: bool,
    err: Option<Error>,
}

impl Doc {
    pub(crate) fn new_empty(factory: Factory) -> Self {
        let buf = factory.acquire();
        let mut doc = Self {
            factory,
            buf,
            valid: true,
            err: None,
        };
        doc.grow(5);
        doc
    }

    pub(crate) fn from_bytes(factory: Factory, buf: Vec<u8>) -> Result<Self> {
        validate_framing(&buf)?;
        Ok(Self {
            factory,
            buf,
            valid: true,
            err: None,
        })
    }

    /// Indicates whether the document is valid for use. A document becomes
    /// invalid once its storage is released.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns any sticky error recorded on the document.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// The encoded length in bytes, including the length prefix and
    /// terminator. Zero after release.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the document contains no elements.
    pub fn is_empty(&self) -> bool {
        self.buf.len() <= 5
    }

    /// The raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// A borrowed, immutable view of this document.
    pub fn view(&self) -> DocRef<'_> {
        DocRef::new(&self.factory, &self.buf)
    }

    /// Returns an iterator positioned before the first element.
    pub fn iter(&self) -> DocIter<'_> {
        self.view().iter()
    }

    /// Copies the encoded bytes into `dst`, returning the number of bytes
    /// copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let n = self.buf.len().min(dst.len());
        dst[..n].copy_from_slice(&self.buf[..n]);
        n
    }

    /// Returns the buffer to the pool. Afterwards the document is invalid and
    /// any prior sticky error is replaced with a "buffer released" error.
    pub fn release(&mut self) {
        if self.valid {
            self.factory.release_buf(std::mem::take(&mut self.buf));
            self.valid = false;
        }
        self.err = Some(Error::buffer_released());
    }

    /// Appends the body of `src` (everything between its length prefix and
    /// terminator) to this document.
    pub fn concat<'v>(&mut self, src: impl Into<DocRef<'v>>) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let src = src.into();
        let body = match src.as_bytes() {
            bytes if bytes.len() >= 5 => &bytes[4..bytes.len() - 1],
            _ => return self,
        };
        let offset = self.buf.len() - 1;
        self.grow(body.len());
        self.buf[offset..offset + body.len()].copy_from_slice(body);
        self.terminate()
    }

    /// Appends a value, dispatching on the variant of `value`. Accepts
    /// anything convertible into a [`Value`], including plain `f64`, `i32`,
    /// `i64`, `bool`, and `&str` values as well as the wrapper types.
    pub fn add<'v>(&mut self, key: &str, value: impl Into<Value<'v>>) -> &mut Self {
        match value.into() {
            Value::Double(v) => self.add_double(key, v),
            Value::String(v) => self.add_str(key, &v),
            Value::Document(v) => self.add_doc(key, v),
            Value::Array(v) => self.add_array(key, v),
            Value::Binary(v) => self.add_binary(key, v.subtype, &v.bytes),
            Value::Undefined => self.add_undefined(key),
            Value::ObjectId(v) => self.add_oid(key, v),
            Value::Boolean(v) => self.add_bool(key, v),
            Value::DateTime(v) => self.add_datetime(key, v),
            Value::Null => self.add_null(key),
            Value::RegularExpression(v) => self.add_regex(key, &v.pattern, &v.options),
            Value::DbPointer(v) => self.add_dbpointer(key, &v.namespace, v.id),
            Value::JavaScriptCode(v) => self.add_javascript(key, &v),
            Value::Symbol(v) => self.add_symbol(key, &v),
            Value::JavaScriptCodeWithScope(v) => match v.scope {
                Some(scope) => self.add_code_with_scope(key, &v.code, scope),
                None => self.add_javascript(key, &v.code),
            },
            Value::Int32(v) => self.add_i32(key, v),
            Value::Timestamp(v) => self.add_timestamp(key, v),
            Value::Int64(v) => self.add_i64(key, v),
            Value::Decimal128(v) => self.add_decimal128(key, v),
            Value::MaxKey => self.add_max_key(key),
            Value::MinKey => self.add_min_key(key),
        }
    }

    /// Re-appends a parsed element under `key`, preserving its tag and
    /// copying its payload bytes verbatim. This is the bit-exact path for
    /// re-emitting iterated elements into a fresh document.
    pub fn add_element(&mut self, key: &str, value: &ValueView<'_>) -> &mut Self {
        if !self.ready() {
            return self;
        }
        if let Some(err) = value.err() {
            self.err = Some(err.clone().with_key(key));
            return self;
        }
        let tag = value.element_type();
        if tag == ElementType::Invalid {
            self.err = Some(Error::unsupported_type(tag as u8).with_key(key));
            return self;
        }
        let data = value.as_bytes();
        let offset = self.buf.len() - 1;
        self.grow(2 + key.len() + data.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, tag, key);
        self.buf[offset..offset + data.len()].copy_from_slice(data);
        self.terminate()
    }

    /// Appends a 64-bit float.
    pub fn add_double(&mut self, key: &str, value: f64) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 8 float bytes
        self.grow(10 + key.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::Double, key);
        encode::write_f64(&mut self.buf, offset, value);
        self.terminate()
    }

    /// Appends a UTF-8 string.
    pub fn add_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.add_lenstring(ElementType::String, key, value)
    }

    /// Appends JavaScript code.
    pub fn add_javascript(&mut self, key: &str, value: &str) -> &mut Self {
        self.add_lenstring(ElementType::JavaScriptCode, key, value)
    }

    /// Appends a symbol.
    pub fn add_symbol(&mut self, key: &str, value: &str) -> &mut Self {
        self.add_lenstring(ElementType::Symbol, key, value)
    }

    fn add_lenstring(&mut self, tag: ElementType, key: &str, value: &str) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + length prefix + string + null
        self.grow(7 + key.len() + value.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, tag, key);
        encode::write_string(&mut self.buf, offset, value);
        self.terminate()
    }

    /// Appends an embedded document.
    pub fn add_doc<'v>(&mut self, key: &str, value: impl Into<DocRef<'v>>) -> &mut Self {
        self.add_doc_bytes(ElementType::EmbeddedDocument, key, value.into().as_bytes())
    }

    /// Appends an array.
    pub fn add_array<'v>(&mut self, key: &str, value: impl Into<ArrayRef<'v>>) -> &mut Self {
        self.add_doc_bytes(ElementType::Array, key, value.into().as_bytes())
    }

    fn add_doc_bytes(&mut self, tag: ElementType, key: &str, bytes: &[u8]) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + inner document bytes
        self.grow(2 + key.len() + bytes.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, tag, key);
        self.buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.terminate()
    }

    /// Appends binary data under the given subtype. Subtype
    /// [`BinarySubtype::BinaryOld`] wraps the payload in an extra inner
    /// length prefix, which the declared length includes.
    pub fn add_binary(&mut self, key: &str, subtype: BinarySubtype, data: &[u8]) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let legacy = subtype == BinarySubtype::BinaryOld;
        let data_size = data.len() + if legacy { 4 } else { 0 };
        let offset = self.buf.len() - 1;
        // tag + key + null + length prefix + subtype byte + payload
        self.grow(7 + key.len() + data_size);
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::Binary, key);
        let mut offset = encode::write_i32(&mut self.buf, offset, data_size as i32);
        self.buf[offset] = subtype.into();
        offset += 1;
        if legacy {
            offset = encode::write_i32(&mut self.buf, offset, data.len() as i32);
        }
        self.buf[offset..offset + data.len()].copy_from_slice(data);
        self.terminate()
    }

    /// Appends an undefined value.
    pub fn add_undefined(&mut self, key: &str) -> &mut Self {
        self.add_empty(ElementType::Undefined, key)
    }

    /// Appends a null value.
    pub fn add_null(&mut self, key: &str) -> &mut Self {
        self.add_empty(ElementType::Null, key)
    }

    /// Appends a min key.
    pub fn add_min_key(&mut self, key: &str) -> &mut Self {
        self.add_empty(ElementType::MinKey, key)
    }

    /// Appends a max key.
    pub fn add_max_key(&mut self, key: &str) -> &mut Self {
        self.add_empty(ElementType::MaxKey, key)
    }

    fn add_empty(&mut self, tag: ElementType, key: &str) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null; no payload
        self.grow(2 + key.len());
        encode::write_type_and_key(&mut self.buf, offset, tag, key);
        self.terminate()
    }

    /// Appends an ObjectId.
    pub fn add_oid(&mut self, key: &str, value: ObjectId) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 12 id bytes
        self.grow(14 + key.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::ObjectId, key);
        self.buf[offset..offset + 12].copy_from_slice(&value.bytes());
        self.terminate()
    }

    /// Appends a boolean.
    pub fn add_bool(&mut self, key: &str, value: bool) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 1 boolean byte
        self.grow(3 + key.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::Boolean, key);
        self.buf[offset] = value as u8;
        self.terminate()
    }

    /// Appends a UTC datetime.
    pub fn add_datetime(&mut self, key: &str, value: DateTime) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 8 millisecond bytes
        self.grow(10 + key.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::DateTime, key);
        encode::write_i64(&mut self.buf, offset, value.timestamp_millis());
        self.terminate()
    }

    /// Appends a regular expression as two back-to-back C-strings, pattern
    /// then options.
    pub fn add_regex(&mut self, key: &str, pattern: &str, options: &str) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + pattern + null + options + null
        self.grow(4 + key.len() + pattern.len() + options.len());
        let offset =
            encode::write_type_and_key(&mut self.buf, offset, ElementType::RegularExpression, key);
        let offset = encode::write_cstring(&mut self.buf, offset, pattern);
        encode::write_cstring(&mut self.buf, offset, options);
        self.terminate()
    }

    /// Appends a DBPointer: a length-prefixed namespace string followed by a
    /// 12-byte ObjectId.
    pub fn add_dbpointer(&mut self, key: &str, namespace: &str, id: ObjectId) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + length prefix + namespace + null + 12 id bytes
        self.grow(19 + key.len() + namespace.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::DbPointer, key);
        let offset = encode::write_string(&mut self.buf, offset, namespace);
        self.buf[offset..offset + 12].copy_from_slice(&id.bytes());
        self.terminate()
    }

    /// Appends JavaScript code with a scope document. The payload is an
    /// overall length (counting itself), the length-prefixed code string, and
    /// the scope document's bytes.
    pub fn add_code_with_scope<'v>(
        &mut self,
        key: &str,
        code: &str,
        scope: impl Into<DocRef<'v>>,
    ) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let scope = scope.into();
        // total length bytes + code length bytes + code + null + scope bytes
        let data_size = 9 + code.len() + scope.len();
        let offset = self.buf.len() - 1;
        self.grow(2 + key.len() + data_size);
        let offset = encode::write_type_and_key(
            &mut self.buf,
            offset,
            ElementType::JavaScriptCodeWithScope,
            key,
        );
        let offset = encode::write_i32(&mut self.buf, offset, data_size as i32);
        let offset = encode::write_string(&mut self.buf, offset, code);
        self.buf[offset..offset + scope.len()].copy_from_slice(scope.as_bytes());
        self.terminate()
    }

    /// Appends a 32-bit integer.
    pub fn add_i32(&mut self, key: &str, value: i32) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 4 integer bytes
        self.grow(6 + key.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::Int32, key);
        encode::write_i32(&mut self.buf, offset, value);
        self.terminate()
    }

    /// Appends a timestamp: increment word first, then seconds.
    pub fn add_timestamp(&mut self, key: &str, value: Timestamp) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 8 timestamp bytes
        self.grow(10 + key.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::Timestamp, key);
        let offset = encode::write_u32(&mut self.buf, offset, value.increment);
        encode::write_u32(&mut self.buf, offset, value.time);
        self.terminate()
    }

    /// Appends a 64-bit integer.
    pub fn add_i64(&mut self, key: &str, value: i64) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 8 integer bytes
        self.grow(10 + key.len());
        let offset = encode::write_type_and_key(&mut self.buf, offset, ElementType::Int64, key);
        encode::write_i64(&mut self.buf, offset, value);
        self.terminate()
    }

    /// Appends a 128-bit decimal, low half first.
    pub fn add_decimal128(&mut self, key: &str, value: Decimal128) -> &mut Self {
        if !self.ready() {
            return self;
        }
        let offset = self.buf.len() - 1;
        // tag + key + null + 16 decimal bytes
        self.grow(18 + key.len());
        let offset =
            encode::write_type_and_key(&mut self.buf, offset, ElementType::Decimal128, key);
        let offset = encode::write_u64(&mut self.buf, offset, value.low());
        encode::write_u64(&mut self.buf, offset, value.high());
        self.terminate()
    }

    /// Records a sticky error and reports whether the document can be
    /// mutated.
    fn ready(&mut self) -> bool {
        if !self.valid {
            self.err = Some(Error::immutable_or_invalid());
            return false;
        }
        true
    }

    pub(crate) fn record_invalid(&mut self) {
        self.err = Some(Error::immutable_or_invalid());
    }

    /// Grows the buffer by `n` bytes through the pool and rewrites the
    /// leading length.
    fn grow(&mut self, n: usize) {
        let new_len = self.buf.len() + n;
        let buf = std::mem::take(&mut self.buf);
        self.buf = self.factory.resize(buf, new_len);
        encode::write_i32(&mut self.buf, 0, new_len as i32);
    }

    fn terminate(&mut self) -> &mut Self {
        let last = self.buf.len() - 1;
        self.buf[last] = 0;
        self
    }
}

impl Clone for Doc {
    /// Returns a fresh document with identical bytes, allocated through the
    /// same pool.
    fn clone(&self) -> Self {
        if !self.valid {
            return Self {
                factory: self.factory.clone(),
                buf: Vec::new(),
                valid: false,
                err: self.err.clone(),
            };
        }
        let mut doc = self.factory.new_doc();
        doc.concat(self.view());
        doc
    }
}

impl Drop for Doc {
    fn drop(&mut self) {
        if self.valid {
            self.factory.release_buf(std::mem::take(&mut self.buf));
            self.valid = false;
        }
    }
}

impl PartialEq for Doc {
    fn eq(&self, other: &Self) -> bool {
        self.buf == other.buf
    }
}

impl fmt::Debug for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Doc")
            .field("data", &hex::encode(&self.buf))
            .finish()
    }
}

/// A borrowed, immutable view of an encoded document.
///
/// Views are handed out for embedded documents during iteration and share the
/// container's buffer; the borrow keeps them from outliving it. A view has no
/// append operations and nothing to release. [`DocRef::to_doc`] clones the
/// bytes into a fresh pool-backed [`Doc`] that may outlive the source.
#[derive(Clone, Copy)]
pub struct DocRef<'a> {
    factory: &'a Factory,
    data: &'a [u8],
}

impl<'a> DocRef<'a> {
    pub(crate) fn new(factory: &'a Factory, data: &'a [u8]) -> Self {
        Self { factory, data }
    }

    /// The raw encoded bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// The encoded length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the document contains no elements.
    pub fn is_empty(&self) -> bool {
        self.data.len() <= 5
    }

    /// Returns an iterator positioned before the first element.
    pub fn iter(&self) -> DocIter<'a> {
        DocIter::new(*self)
    }

    /// Copies the encoded bytes into `dst`, returning the number of bytes
    /// copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let n = self.data.len().min(dst.len());
        dst[..n].copy_from_slice(&self.data[..n]);
        n
    }

    /// Clones the bytes into a fresh mutable document allocated through the
    /// pool.
    pub fn to_doc(&self) -> Doc {
        let mut doc = self.factory.new_doc();
        doc.concat(*self);
        doc
    }

    pub(crate) fn factory(&self) -> &'a Factory {
        self.factory
    }
}

impl<'a> From<&'a Doc> for DocRef<'a> {
    fn from(doc: &'a Doc) -> Self {
        doc.view()
    }
}

impl PartialEq for DocRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl fmt::Debug for DocRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocRef")
            .field("data", &hex::encode(self.data))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorKind;

    fn assert_doc_hex(doc: &Doc, want: &str, label: &str) {
        assert_eq!(
            hex::encode(doc.as_bytes()),
            want.to_lowercase(),
            "encoded doc incorrect: {label}"
        );
    }

    #[test]
    fn add_cases_match_reference_encodings() {
        let factory = Factory::new();
        let test_oid = ObjectId::parse_str("56e1fc72e0c917e9c4714161").unwrap();
        let empty_doc = factory.new_doc();
        let empty_array = factory.new_array();
        let scope = factory.new_doc();

        let cases: Vec<(&str, &str, Value<'_>, &str)> = vec![
            ("double", "d", Value::from(1.0_f64), "10000000016400000000000000F03F00"),
            ("f32 promotes", "d", Value::from(1.0_f32), "10000000016400000000000000F03F00"),
            ("string", "a", Value::from("b"), "0E00000002610002000000620000"),
            ("doc", "x", Value::from(&empty_doc), "0D000000037800050000000000"),
            ("array", "x", Value::from(&empty_array), "0D000000047800050000000000"),
            (
                "binary",
                "x",
                Value::from(crate::value::Binary::new(
                    BinarySubtype::Function,
                    vec![255, 255],
                )),
                "0F0000000578000200000001FFFF00",
            ),
            (
                "binary old",
                "x",
                Value::from(crate::value::Binary::new(
                    BinarySubtype::BinaryOld,
                    vec![255, 255],
                )),
                "13000000057800060000000202000000FFFF00",
            ),
            ("undefined", "a", Value::Undefined, "0800000006610000"),
            (
                "oid",
                "a",
                Value::from(test_oid),
                "1400000007610056E1FC72E0C917E9C471416100",
            ),
            ("boolean", "b", Value::from(true), "090000000862000100"),
            (
                "datetime",
                "a",
                Value::from(DateTime::from_millis(1_356_351_330_501)),
                "10000000096100C5D8D6CC3B01000000",
            ),
            ("null", "a", Value::Null, "080000000a610000"),
            (
                "regex",
                "a",
                Value::from(crate::value::Regex::new("abc", "im")),
                "0F0000000B610061626300696D0000",
            ),
            (
                "dbpointer",
                "a",
                Value::from(crate::value::DbPointer::new("b", test_oid)),
                "1A0000000C610002000000620056E1FC72E0C917E9C471416100",
            ),
            (
                "javascript",
                "a",
                Value::JavaScriptCode("b".into()),
                "0E0000000D610002000000620000",
            ),
            (
                "symbol",
                "a",
                Value::Symbol("b".into()),
                "0E0000000E610002000000620000",
            ),
            (
                "code with scope",
                "a",
                Value::from(crate::value::CodeWithScope::new("abcd", Some(scope.view()))),
                "1A0000000F610012000000050000006162636400050000000000",
            ),
            (
                "code with nil scope encodes as javascript",
                "a",
                Value::from(crate::value::CodeWithScope::new("abcd", None)),
                "110000000D610005000000616263640000",
            ),
            ("int32", "i", Value::from(-1_i32), "0C000000106900FFFFFFFF00"),
            (
                "timestamp",
                "a",
                Value::from(Timestamp {
                    time: 123_456_789,
                    increment: 42,
                }),
                "100000001161002A00000015CD5B0700",
            ),
            ("int64", "a", Value::from(1_i64), "10000000126100010000000000000000"),
            (
                "decimal128",
                "d",
                Value::from(Decimal128::from_parts(0x3040_0000_0000_0000, 0)),
                "180000001364000000000000000000000000000000403000",
            ),
            ("minkey", "a", Value::MinKey, "08000000FF610000"),
            ("maxkey", "a", Value::MaxKey, "080000007F610000"),
        ];

        for (label, key, value, want) in cases {
            let mut doc = factory.new_doc();
            doc.add(key, value);
            assert!(doc.err().is_none(), "unexpected error for {label}");
            assert_doc_hex(&doc, want, label);
            doc.release();
        }
    }

    #[test]
    fn string_append_grows_by_documented_amount() {
        let factory = Factory::new();
        let mut doc = factory.new_doc();
        let before = doc.len();
        doc.add_str("key", "value");
        assert_eq!(doc.len() - before, 7 + "key".len() + "value".len());
    }

    #[test]
    fn framing_invariant_holds_after_every_append() {
        let factory = Factory::new();
        let mut doc = factory.new_doc();
        let appends: Vec<Box<dyn Fn(&mut Doc)>> = vec![
            Box::new(|d| {
                d.add_double("d", -123.25);
            }),
            Box::new(|d| {
                d.add_str("s", "text");
            }),
            Box::new(|d| {
                d.add_i32("i", 42);
            }),
            Box::new(|d| {
                d.add_regex("r", "^a+", "i");
            }),
            Box::new(|d| {
                d.add_null("n");
            }),
        ];
        for append in appends {
            append(&mut doc);
            let buf = doc.as_bytes();
            assert!(buf.len() >= 5);
            assert_eq!(
                i32::from_le_bytes(buf[..4].try_into().unwrap()) as usize,
                buf.len()
            );
            assert_eq!(buf[buf.len() - 1], 0);
        }
    }

    #[test]
    fn release_invalidates_and_records_error() {
        let factory = Factory::new();
        let mut doc = factory.new_doc();
        assert!(doc.is_valid());
        doc.release();
        assert!(!doc.is_valid());
        assert_eq!(doc.len(), 0);
        assert_eq!(doc.err().unwrap().kind, ErrorKind::BufferReleased);
    }

    #[test]
    fn appends_after_release_are_sticky_noops() {
        let factory = Factory::new();
        let mut doc = factory.new_doc();
        doc.release();
        doc.add_i32("i", 1).add_str("s", "x");
        assert_eq!(doc.len(), 0);
        assert_eq!(doc.err().unwrap().kind, ErrorKind::ImmutableOrInvalid);
    }

    #[test]
    fn clone_produces_equal_bytes_in_a_fresh_buffer() {
        let factory = Factory::new();
        let mut doc = factory.new_doc();
        doc.add_double("d", 1.0).add_str("s", "x");
        let copy = doc.clone();
        assert_eq!(doc.as_bytes(), copy.as_bytes());
        // Mutating the clone must not affect the original.
        let mut copy = copy;
        copy.add_i32("i", 7);
        assert_ne!(doc.as_bytes(), copy.as_bytes());
    }

    #[test]
    fn concat_appends_source_body() {
        let factory = Factory::new();
        let mut a = factory.new_doc();
        a.add_i32("i", -1);
        let mut b = factory.new_doc();
        b.add_str("a", "b");
        a.concat(&b);

        let mut expected = factory.new_doc();
        expected.add_i32("i", -1).add_str("a", "b");
        assert_eq!(a.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn add_element_round_trips_payload_bytes() {
        let factory = Factory::new();
        let mut src = factory.new_doc();
        src.add_regex("a", "abc", "im").add_i32("n", 9);

        let mut dst = factory.new_doc();
        let mut iter = src.iter();
        while iter.advance() {
            let key = iter.key().unwrap().into_owned();
            dst.add_element(&key, iter.value_unsafe().unwrap());
        }
        assert_eq!(dst.as_bytes(), src.as_bytes());
    }
}
