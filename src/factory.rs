//! The entry point for minting documents and arrays bound to a shared pool.

use std::{fmt, sync::Arc};

use crate::{
    array::Array,
    doc::Doc,
    error::Result,
    pool::{BytePool, Pool},
};

/// A factory for BSON documents and arrays.
///
/// Every buffer behind a document or array minted by a factory is acquired
/// from, grown through, and released back to the factory's [`Pool`]. Cloning a
/// factory is cheap and shares the pool, so distinct documents can be built on
/// separate threads.
#[derive(Clone)]
pub struct Factory {
    pool: Arc<dyn Pool>,
}

impl Factory {
    /// Creates a factory backed by a [`BytePool`] with a minimum buffer
    /// capacity of 256 bytes and no maximum.
    pub fn new() -> Self {
        Self::with_pool(Arc::new(BytePool::default()))
    }

    /// Creates a factory backed by the provided pool.
    pub fn with_pool(pool: Arc<dyn Pool>) -> Self {
        Self { pool }
    }

    /// Returns a new, empty, mutable document.
    pub fn new_doc(&self) -> Doc {
        Doc::new_empty(self.clone())
    }

    /// Returns a new, empty array.
    pub fn new_array(&self) -> Array {
        Array::new_empty(self.clone())
    }

    /// Returns a document backed by `buf`, which must satisfy the framing
    /// invariant: at least five bytes, a little-endian leading length equal to
    /// the buffer length, and a trailing null byte. On failure the buffer is
    /// not adopted and an error describing the violation is returned. The
    /// element bytes between the framing are not validated here; errors in
    /// them surface during iteration.
    pub fn doc_from_bytes(&self, buf: Vec<u8>) -> Result<Doc> {
        Doc::from_bytes(self.clone(), buf)
    }

    pub(crate) fn acquire(&self) -> Vec<u8> {
        self.pool.acquire()
    }

    pub(crate) fn release_buf(&self, buf: Vec<u8>) {
        self.pool.release(buf)
    }

    pub(crate) fn resize(&self, buf: Vec<u8>, len: usize) -> Vec<u8> {
        self.pool.resize(buf, len)
    }
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn new_doc_is_the_empty_document() {
        let factory = Factory::new();
        let doc = factory.new_doc();
        assert_eq!(doc.as_bytes(), b"\x05\x00\x00\x00\x00");
    }

    #[test]
    fn new_array_is_backed_by_the_empty_document() {
        let factory = Factory::new();
        let ary = factory.new_array();
        assert_eq!(ary.as_bytes(), b"\x05\x00\x00\x00\x00");
    }

    #[test]
    fn doc_from_bytes_validates_framing() {
        let factory = Factory::new();

        let ok = factory.doc_from_bytes(vec![5, 0, 0, 0, 0]);
        assert!(ok.is_ok());

        let short = factory.doc_from_bytes(vec![]);
        assert_eq!(short.unwrap_err().kind, ErrorKind::ShortBuffer);

        let bad_length = factory.doc_from_bytes(vec![5, 0, 0, 0, 0, 0]);
        assert_eq!(bad_length.unwrap_err().kind, ErrorKind::InvalidLength);

        let unterminated = factory.doc_from_bytes(vec![5, 0, 0, 0, 1]);
        assert!(matches!(
            unterminated.unwrap_err().kind,
            ErrorKind::MissingTerminator { .. }
        ));
    }

    #[test]
    fn factories_share_their_pool_across_clones() {
        let factory = Factory::new();
        let other = factory.clone();
        let mut doc = factory.new_doc();
        doc.add_i32("a", 1);
        // Releasing through a clone's document must not panic or lose the
        // buffer; both handles point at the same pool.
        let mut doc2 = other.new_doc();
        doc2.release();
        doc.release();
    }
}
