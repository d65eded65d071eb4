//! Module containing functionality related to BSON ObjectIds.

use std::{
    fmt,
    result,
    sync::atomic::{AtomicU32, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use hex::FromHexError;
use once_cell::sync::Lazy;
use rand::{random, thread_rng, Rng};

const TIMESTAMP_SIZE: usize = 4;
const PROCESS_ID_SIZE: usize = 5;

const TIMESTAMP_OFFSET: usize = 0;
const PROCESS_ID_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_SIZE;
const COUNTER_OFFSET: usize = PROCESS_ID_OFFSET + PROCESS_ID_SIZE;

const MAX_U24: u32 = 0xFF_FFFF;

static OID_COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(thread_rng().gen_range(0..=MAX_U24)));

static PROCESS_UNIQUE: Lazy<[u8; PROCESS_ID_SIZE]> = Lazy::new(random);

/// Errors that can occur during ObjectId construction and generation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The provided hex string was not 24 characters long.
    #[error("invalid length {length} for ObjectId hex string \"{hex}\"")]
    InvalidHexStringLength {
        /// The length of the provided string.
        length: usize,
        /// The provided string.
        hex: String,
    },

    /// An error occurred parsing a hex string.
    #[error(transparent)]
    FromHex(#[from] FromHexError),
}

/// Alias for `Result<T, oid::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// A wrapper around a raw 12-byte ObjectId: a 4-byte big-endian seconds
/// timestamp, a 5-byte per-process random value, and a 3-byte big-endian
/// counter initialized to a random value.
#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct ObjectId {
    id: [u8; 12],
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectId {
    /// Generates a new ObjectId from the current time, the process-unique
    /// random value, and the shared counter.
    pub fn new() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        let counter = OID_COUNTER.fetch_add(1, Ordering::SeqCst) & MAX_U24;

        let mut id = [0u8; 12];
        id[TIMESTAMP_OFFSET..PROCESS_ID_OFFSET].copy_from_slice(&timestamp.to_be_bytes());
        id[PROCESS_ID_OFFSET..COUNTER_OFFSET].copy_from_slice(&*PROCESS_UNIQUE);
        id[COUNTER_OFFSET..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self { id }
    }

    /// Constructs an ObjectId from its raw byte representation.
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self { id: bytes }
    }

    /// Returns the raw byte representation.
    pub const fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// Constructs an ObjectId from a 24-character hexadecimal string.
    pub fn parse_str(s: impl AsRef<str>) -> Result<Self> {
        let s = s.as_ref();
        if s.len() != 24 {
            return Err(Error::InvalidHexStringLength {
                length: s.len(),
                hex: s.to_string(),
            });
        }
        let bytes: Vec<u8> = hex::decode(s.as_bytes())?;
        let mut id = [0u8; 12];
        id.copy_from_slice(&bytes);
        Ok(Self { id })
    }

    /// The hexadecimal representation.
    pub fn to_hex(self) -> String {
        hex::encode(self.id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.to_hex()).finish()
    }
}
