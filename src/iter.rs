//! Forward-only cursors over documents and arrays.

use std::borrow::Cow;

use crate::{
    doc::DocRef,
    error::Error,
    spec::ElementType,
    value::{OwnedValue, Value, ValueView},
};

/// A forward-only cursor over a document's elements.
///
/// An initial call to [`advance`](DocIter::advance) is required to position
/// the cursor on the first element; each later call steps to the next one.
/// Iteration is single-pass; construct a new iterator to start over.
///
/// The cursor and every [`ValueView`] it yields borrow the source buffer, so
/// they cannot outlive the document. Use [`value`](DocIter::value) for an
/// owned copy that can.
///
/// ```
/// use bsonbuf::Factory;
///
/// let factory = Factory::new();
/// let mut doc = factory.new_doc();
/// doc.add_str("hi", "y'all");
///
/// let mut iter = doc.iter();
/// while iter.advance() {
///     println!("{:?} = {:?}", iter.key(), iter.get());
/// }
/// ```
pub struct DocIter<'a> {
    doc: DocRef<'a>,
    /// Offset of the current element's type byte, or of the terminator.
    offset: usize,
    /// `None` means end-of-document or an unterminated key.
    key_len: Option<usize>,
    /// View of the current value; `None` until the first advance.
    view: Option<ValueView<'a>>,
}

impl<'a> DocIter<'a> {
    pub(crate) fn new(doc: DocRef<'a>) -> Self {
        Self {
            doc,
            offset: 4,
            key_len: None,
            view: None,
        }
    }

    /// Advances the cursor, if possible. Returns `true` if an element is
    /// available. The first call positions the cursor on the first element
    /// without stepping past it.
    pub fn advance(&mut self) -> bool {
        if self.view.is_some() {
            let Some(key_len) = self.key_len else {
                // Already exhausted; stay there.
                return false;
            };
            // The next element (or final null byte) starts after the type
            // byte, key, key terminator, and value bytes.
            let view_len = self.view.as_ref().map_or(0, ValueView::len);
            self.offset += 1 + key_len + 1 + view_len;
        }
        self.parse_next();
        self.key_len.is_some()
    }

    fn parse_next(&mut self) {
        let buf = self.doc.as_bytes();

        // At or beyond the terminator means we're done.
        if self.offset >= buf.len().saturating_sub(1) {
            self.key_len = None;
            self.view = Some(ValueView::end(self.doc.factory()));
            return;
        }

        // The key starts after the type byte and runs to a null byte. A
        // missing null byte means a corrupt document; the cleared key length
        // signals the problem.
        let key_len = match buf[self.offset + 1..].iter().position(|&b| b == 0) {
            Some(n) => n,
            None => {
                self.key_len = None;
                self.view = Some(ValueView::end(self.doc.factory()));
                return;
            }
        };
        self.key_len = Some(key_len);

        // The value begins after the type byte, key, and key terminator.
        let value_start = self.offset + 1 + key_len + 1;
        let mut view = ValueView::parse(self.doc.factory(), &buf[value_start..], buf[self.offset]);

        // If the element would consume the document terminator, its declared
        // length lies about the container.
        if view.err().is_none() && value_start + view.len() >= buf.len() {
            view.record_err(Error::internal_length_exceeds_container());
        }
        self.view = Some(view);
    }

    /// The current element's key, lossily decoded. `None` at the end of the
    /// document.
    pub fn key(&self) -> Option<Cow<'a, str>> {
        let n = self.key_len?;
        let buf = self.doc.as_bytes();
        Some(String::from_utf8_lossy(
            &buf[self.offset + 1..self.offset + 1 + n],
        ))
    }

    /// The current element's type, or [`ElementType::Invalid`] at the end of
    /// the document or when the current element did not parse.
    pub fn element_type(&self) -> ElementType {
        self.view
            .as_ref()
            .map_or(ElementType::Invalid, ValueView::element_type)
    }

    /// The borrowing view of the current value. The view shares the source
    /// buffer and must not outlive the document. `None` before the first
    /// [`advance`](DocIter::advance).
    pub fn value_unsafe(&self) -> Option<&ValueView<'a>> {
        self.view.as_ref()
    }

    /// A pool-backed copy of the current value, safe to keep after the
    /// source document is released. `None` at the end of the document.
    pub fn value(&self) -> Option<OwnedValue> {
        match self.view.as_ref() {
            Some(view) if view.element_type() != ElementType::Invalid => Some(view.to_owned()),
            _ => None,
        }
    }

    /// Decodes the current value. `None` at the end of the document or if
    /// the value could not be parsed.
    pub fn get(&self) -> Option<Value<'a>> {
        self.view.as_ref()?.get()
    }

    /// Any error recorded while parsing the current value.
    pub fn err(&self) -> Option<&Error> {
        self.view.as_ref()?.err()
    }
}

/// A forward-only cursor over an array's elements.
///
/// Wraps a [`DocIter`] and tracks the zero-based index of the current
/// element. It does not re-validate that keys equal the decimal index; arrays
/// built through this crate maintain that invariant by construction.
pub struct ArrayIter<'a> {
    iter: DocIter<'a>,
    n: Option<usize>,
}

impl<'a> ArrayIter<'a> {
    pub(crate) fn new(iter: DocIter<'a>) -> Self {
        Self { iter, n: None }
    }

    /// Advances the cursor, if possible. Returns `true` if an element is
    /// available.
    pub fn advance(&mut self) -> bool {
        if self.iter.advance() {
            self.n = Some(self.n.map_or(0, |n| n + 1));
            true
        } else {
            self.n = None;
            false
        }
    }

    /// The zero-based index of the current element. `None` before the first
    /// [`advance`](ArrayIter::advance) and after the end of the array.
    pub fn index(&self) -> Option<usize> {
        self.n
    }

    /// The current element's type, or [`ElementType::Invalid`] at the end of
    /// the array or when the current element did not parse.
    pub fn element_type(&self) -> ElementType {
        self.iter.element_type()
    }

    /// The borrowing view of the current value. See
    /// [`DocIter::value_unsafe`].
    pub fn value_unsafe(&self) -> Option<&ValueView<'a>> {
        self.iter.value_unsafe()
    }

    /// A pool-backed copy of the current value. See [`DocIter::value`].
    pub fn value(&self) -> Option<OwnedValue> {
        self.iter.value()
    }

    /// Decodes the current value. See [`DocIter::get`].
    pub fn get(&self) -> Option<Value<'a>> {
        self.iter.get()
    }

    /// Any error recorded while parsing the current value.
    pub fn err(&self) -> Option<&Error> {
        self.iter.err()
    }
}
