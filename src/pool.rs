//! The byte-buffer pool capability backing a [`Factory`](crate::Factory).

use std::sync::Mutex;

/// A source of reusable byte buffers.
///
/// Any implementation may back a [`Factory`](crate::Factory); all buffers a
/// factory hands to its documents are acquired from and released back to the
/// same pool. Implementations must be callable from multiple threads.
pub trait Pool: Send + Sync {
    /// Returns a zero-length buffer. Any recycled storage behind the buffer
    /// must be zeroed, so that growing a document in place never exposes
    /// bytes written by a previous owner.
    fn acquire(&self) -> Vec<u8>;

    /// Accepts a buffer back. Implementations may drop it or recycle it.
    fn release(&self, buf: Vec<u8>);

    /// Returns a buffer of length `len` containing the original contents as a
    /// prefix (zero-filled beyond them). If the existing capacity suffices
    /// the same buffer is returned reshaped; otherwise a larger buffer is
    /// allocated and the original is discarded without returning to the pool,
    /// so that transient grow-copies don't churn the free list.
    fn resize(&self, buf: Vec<u8>, len: usize) -> Vec<u8>;
}

/// The default [`Pool`]: a mutex-guarded free list that recycles buffers whose
/// capacity falls within a configured range.
pub struct BytePool {
    min_cap: usize,
    max_cap: Option<usize>,
    free: Mutex<Vec<Vec<u8>>>,
}

impl BytePool {
    /// Creates a pool whose fresh buffers start with `min_cap` capacity and
    /// which recycles returned buffers of capacity at most `max_cap`
    /// (`None` means no cap).
    pub fn new(min_cap: usize, max_cap: Option<usize>) -> Self {
        Self {
            min_cap,
            max_cap,
            free: Mutex::new(Vec::new()),
        }
    }
}

impl Default for BytePool {
    fn default() -> Self {
        Self::new(256, None)
    }
}

impl Pool for BytePool {
    fn acquire(&self) -> Vec<u8> {
        let recycled = self.free.lock().unwrap().pop();
        match recycled {
            Some(mut buf) => {
                // Zero the full storage so a later in-place grow can't leak a
                // previous owner's bytes.
                buf.clear();
                buf.resize(buf.capacity(), 0);
                buf.clear();
                buf
            }
            None => Vec::with_capacity(self.min_cap),
        }
    }

    fn release(&self, buf: Vec<u8>) {
        if self.max_cap.map_or(true, |cap| buf.capacity() <= cap) {
            self.free.lock().unwrap().push(buf);
        }
    }

    fn resize(&self, mut buf: Vec<u8>, len: usize) -> Vec<u8> {
        if len <= buf.capacity() {
            buf.resize(len, 0);
            return buf;
        }
        let mut grown = Vec::with_capacity(len.max(buf.capacity() * 2));
        grown.extend_from_slice(&buf);
        grown.resize(len, 0);
        // `buf` drops here rather than going back on the free list.
        grown
    }
}
