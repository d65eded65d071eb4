//! The array layer: a thin wrapper issuing decimal index keys over a
//! document.

use std::fmt;

use crate::{
    datetime::DateTime,
    decimal128::Decimal128,
    doc::{Doc, DocRef},
    factory::Factory,
    iter::ArrayIter,
    oid::ObjectId,
    spec::BinarySubtype,
    value::{Timestamp, Value, ValueView},
};

/// An owned, mutable BSON array.
///
/// Internally an array is a document whose keys are the decimal
/// representations of successive integers starting at `"0"`; every push
/// issues the next index. All buffer and error behavior is that of the
/// wrapped [`Doc`].
pub struct Array {
    // Number of elements; the wrapped document's keys are "0".."n-1".
    n: usize,
    doc: Doc,
}

impl Array {
    pub(crate) fn new_empty(factory: Factory) -> Self {
        Self {
            n: 0,
            doc: Doc::new_empty(factory),
        }
    }

    /// Indicates whether the array is valid for use. An array is invalid
    /// after its storage has been released.
    pub fn is_valid(&self) -> bool {
        self.doc.is_valid()
    }

    /// Returns any sticky error recorded on the array.
    pub fn err(&self) -> Option<&crate::error::Error> {
        self.doc.err()
    }

    /// The encoded length in bytes.
    pub fn len(&self) -> usize {
        self.doc.len()
    }

    /// Whether the array contains no elements.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The number of elements.
    pub fn count(&self) -> usize {
        self.n
    }

    /// The raw encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.doc.as_bytes()
    }

    /// A borrowed, immutable view of this array.
    pub fn view(&self) -> ArrayRef<'_> {
        ArrayRef::new(self.doc.view())
    }

    /// Returns an iterator positioned before the first element.
    pub fn iter(&self) -> ArrayIter<'_> {
        self.view().iter()
    }

    /// Copies the encoded bytes into `dst`, returning the number of bytes
    /// copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        self.doc.copy_to(dst)
    }

    /// Returns the buffer to the pool. Afterwards the array is invalid.
    pub fn release(&mut self) {
        self.doc.release();
    }

    /// Appends every element of `src`, re-issuing index keys so the
    /// contiguous-index invariant holds. Stops at the first element of `src`
    /// that does not parse cleanly.
    pub fn concat(&mut self, src: ArrayRef<'_>) -> &mut Self {
        if !self.doc.is_valid() {
            self.doc.record_invalid();
            return self;
        }
        let mut iter = src.doc.iter();
        while iter.advance() {
            let Some(view) = iter.value_unsafe() else {
                break;
            };
            if view.err().is_some() {
                break;
            }
            let key = self.n.to_string();
            self.doc.add_element(&key, view);
            self.n += 1;
        }
        self
    }

    /// Appends a value, dispatching on the variant of `value`.
    pub fn push<'v>(&mut self, value: impl Into<Value<'v>>) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add(key, value);
        })
    }

    /// Re-appends a parsed element, preserving its tag and payload bytes.
    pub fn push_element(&mut self, value: &ValueView<'_>) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_element(key, value);
        })
    }

    /// Appends a 64-bit float.
    pub fn push_double(&mut self, value: f64) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_double(key, value);
        })
    }

    /// Appends a UTF-8 string.
    pub fn push_str(&mut self, value: &str) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_str(key, value);
        })
    }

    /// Appends an embedded document.
    pub fn push_doc<'v>(&mut self, value: impl Into<DocRef<'v>>) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_doc(key, value);
        })
    }

    /// Appends a nested array.
    pub fn push_array<'v>(&mut self, value: impl Into<ArrayRef<'v>>) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_array(key, value);
        })
    }

    /// Appends binary data under the given subtype.
    pub fn push_binary(&mut self, subtype: BinarySubtype, data: &[u8]) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_binary(key, subtype, data);
        })
    }

    /// Appends an undefined value.
    pub fn push_undefined(&mut self) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_undefined(key);
        })
    }

    /// Appends an ObjectId.
    pub fn push_oid(&mut self, value: ObjectId) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_oid(key, value);
        })
    }

    /// Appends a boolean.
    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_bool(key, value);
        })
    }

    /// Appends a UTC datetime.
    pub fn push_datetime(&mut self, value: DateTime) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_datetime(key, value);
        })
    }

    /// Appends a null value.
    pub fn push_null(&mut self) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_null(key);
        })
    }

    /// Appends a regular expression.
    pub fn push_regex(&mut self, pattern: &str, options: &str) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_regex(key, pattern, options);
        })
    }

    /// Appends a DBPointer.
    pub fn push_dbpointer(&mut self, namespace: &str, id: ObjectId) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_dbpointer(key, namespace, id);
        })
    }

    /// Appends JavaScript code.
    pub fn push_javascript(&mut self, value: &str) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_javascript(key, value);
        })
    }

    /// Appends a symbol.
    pub fn push_symbol(&mut self, value: &str) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_symbol(key, value);
        })
    }

    /// Appends JavaScript code with a scope document.
    pub fn push_code_with_scope<'v>(
        &mut self,
        code: &str,
        scope: impl Into<DocRef<'v>>,
    ) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_code_with_scope(key, code, scope);
        })
    }

    /// Appends a 32-bit integer.
    pub fn push_i32(&mut self, value: i32) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_i32(key, value);
        })
    }

    /// Appends a timestamp.
    pub fn push_timestamp(&mut self, value: Timestamp) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_timestamp(key, value);
        })
    }

    /// Appends a 64-bit integer.
    pub fn push_i64(&mut self, value: i64) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_i64(key, value);
        })
    }

    /// Appends a 128-bit decimal.
    pub fn push_decimal128(&mut self, value: Decimal128) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_decimal128(key, value);
        })
    }

    /// Appends a min key.
    pub fn push_min_key(&mut self) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_min_key(key);
        })
    }

    /// Appends a max key.
    pub fn push_max_key(&mut self) -> &mut Self {
        self.push_with(|doc, key| {
            doc.add_max_key(key);
        })
    }

    fn push_with(&mut self, append: impl FnOnce(&mut Doc, &str)) -> &mut Self {
        if !self.doc.is_valid() {
            self.doc.record_invalid();
            return self;
        }
        let key = self.n.to_string();
        append(&mut self.doc, &key);
        self.n += 1;
        self
    }
}

impl Clone for Array {
    /// Returns a fresh array with identical bytes, allocated through the
    /// same pool.
    fn clone(&self) -> Self {
        Self {
            n: self.n,
            doc: self.doc.clone(),
        }
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("data", &hex::encode(self.doc.as_bytes()))
            .finish()
    }
}

/// A borrowed, immutable view of an encoded array.
#[derive(Clone, Copy)]
pub struct ArrayRef<'a> {
    doc: DocRef<'a>,
}

impl<'a> ArrayRef<'a> {
    pub(crate) fn new(doc: DocRef<'a>) -> Self {
        Self { doc }
    }

    /// The raw encoded bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.doc.as_bytes()
    }

    /// The encoded length in bytes.
    pub fn len(&self) -> usize {
        self.doc.len()
    }

    /// Whether the array contains no elements.
    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }

    /// Returns an iterator positioned before the first element.
    pub fn iter(&self) -> ArrayIter<'a> {
        ArrayIter::new(self.doc.iter())
    }

    /// Copies the encoded bytes into `dst`, returning the number of bytes
    /// copied.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        self.doc.copy_to(dst)
    }

    /// Clones the bytes into a fresh mutable array allocated through the
    /// pool.
    pub fn to_array(&self) -> Array {
        let doc = self.doc.to_doc();
        let mut iter = self.doc.iter();
        let mut n = 0;
        while iter.advance() {
            n += 1;
        }
        Array { n, doc }
    }
}

impl<'a> From<&'a Array> for ArrayRef<'a> {
    fn from(ary: &'a Array) -> Self {
        ary.view()
    }
}

impl PartialEq for ArrayRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc
    }
}

impl fmt::Debug for ArrayRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayRef")
            .field("data", &hex::encode(self.as_bytes()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn push_issues_decimal_index_keys() {
        let factory = Factory::new();
        let mut ary = factory.new_array();
        ary.push_i32(-1).push_str("b").push_bool(true);
        assert_eq!(ary.count(), 3);

        let mut expected = factory.new_doc();
        expected.add_i32("0", -1).add_str("1", "b").add_bool("2", true);
        assert_eq!(ary.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn push_matches_doc_encoding_with_index_key() {
        let factory = Factory::new();
        let values: Vec<Value<'_>> = vec![
            Value::from(1.0_f64),
            Value::from("b"),
            Value::Null,
            Value::from(-1_i32),
            Value::from(Timestamp {
                time: 123_456_789,
                increment: 42,
            }),
            Value::MinKey,
            Value::MaxKey,
        ];

        for value in values {
            let mut ary = factory.new_array();
            ary.push(value.clone());

            let mut doc = factory.new_doc();
            doc.add("0", value);

            assert_eq!(ary.as_bytes(), doc.as_bytes());
        }
    }

    #[test]
    fn index_keys_continue_across_push_kinds() {
        let factory = Factory::new();
        let mut inner = factory.new_doc();
        inner.add_i32("a", 1);

        let mut ary = factory.new_array();
        ary.push_doc(&inner).push_null().push_double(2.5);

        let mut iter = ary.iter();
        let mut indices = Vec::new();
        while iter.advance() {
            indices.push(iter.index().unwrap());
        }
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn concat_reissues_contiguous_indices() {
        let factory = Factory::new();
        let mut a = factory.new_array();
        a.push_i32(10).push_i32(11);
        let mut b = factory.new_array();
        b.push_i32(12).push_str("x");

        a.concat(b.view());
        assert_eq!(a.count(), 4);

        let mut expected = factory.new_array();
        expected.push_i32(10).push_i32(11).push_i32(12).push_str("x");
        assert_eq!(a.as_bytes(), expected.as_bytes());
    }

    #[test]
    fn release_invalidates_and_pushes_become_noops() {
        let factory = Factory::new();
        let mut ary = factory.new_array();
        ary.push_i32(1);
        ary.release();
        assert!(!ary.is_valid());
        assert_eq!(ary.err().unwrap().kind, ErrorKind::BufferReleased);

        ary.push_i32(2);
        assert_eq!(ary.err().unwrap().kind, ErrorKind::ImmutableOrInvalid);
        assert_eq!(ary.count(), 1);
    }

    #[test]
    fn clone_preserves_bytes_and_count() {
        let factory = Factory::new();
        let mut ary = factory.new_array();
        ary.push_str("a").push_str("b");
        let copy = ary.clone();
        assert_eq!(copy.as_bytes(), ary.as_bytes());
        assert_eq!(copy.count(), 2);

        // Further pushes on the clone continue from the copied count.
        let mut copy = copy;
        copy.push_str("c");
        let mut iter = copy.iter();
        let mut last = None;
        while iter.advance() {
            last = iter.index();
        }
        assert_eq!(last, Some(2));
    }
}
