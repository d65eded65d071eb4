//! A pooled, in-place builder and zero-copy reader for BSON documents.
//!
//! A [`Doc`] is always a valid encoded BSON buffer: every append grows the
//! buffer in place, writes the new element over the old terminator, and
//! restores the leading length and the trailing null byte. Buffers come from
//! a shared [`Pool`] via a [`Factory`], which keeps allocation behavior
//! predictable under load and lets released documents recycle their storage.
//!
//! ```
//! use bsonbuf::{Factory, Value};
//!
//! let factory = Factory::new();
//! let mut doc = factory.new_doc();
//! doc.add_str("hi", "y'all").add_i32("n", 2);
//!
//! let mut iter = doc.iter();
//! assert!(iter.advance());
//! assert_eq!(iter.key().as_deref(), Some("hi"));
//! assert_eq!(iter.get(), Some(Value::String("y'all".into())));
//! ```
//!
//! Importing existing bytes validates the framing invariant up front; the
//! element bytes are parsed lazily, one value at a time, during iteration:
//!
//! ```
//! use bsonbuf::Factory;
//!
//! let factory = Factory::new();
//! let bytes = b"\x13\x00\x00\x00\x02hi\x00\x06\x00\x00\x00y'all\x00\x00".to_vec();
//! let doc = factory.doc_from_bytes(bytes)?;
//! let mut iter = doc.iter();
//! assert!(iter.advance());
//! assert_eq!(iter.key().as_deref(), Some("hi"));
//! # Ok::<(), bsonbuf::Error>(())
//! ```
//!
//! Iteration yields [`ValueView`]s that borrow the source buffer without
//! copying; [`DocIter::value`] clones a view into an [`OwnedValue`] backed by
//! its own pooled buffer when it must outlive the source. Embedded documents
//! and arrays decode to immutable [`DocRef`]/[`ArrayRef`] views sharing the
//! container's buffer.
//!
//! This crate does not validate that string values are well-formed UTF-8;
//! decoded strings are produced lossily and bit-exact round-tripping goes
//! through the raw element path ([`Doc::add_element`]).

#![warn(missing_docs)]

mod array;
mod datetime;
mod decimal128;
mod doc;
mod encode;
mod factory;
mod iter;
mod value;

pub mod error;
pub mod oid;
pub mod pool;
pub mod spec;

pub use self::{
    array::{Array, ArrayRef},
    datetime::DateTime,
    decimal128::Decimal128,
    doc::{Doc, DocRef},
    error::{Error, ErrorKind, Result},
    factory::Factory,
    iter::{ArrayIter, DocIter},
    oid::ObjectId,
    pool::{BytePool, Pool},
    spec::{BinarySubtype, ElementType},
    value::{Binary, CodeWithScope, DbPointer, OwnedValue, Regex, Timestamp, Value, ValueView},
};
