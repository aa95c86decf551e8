//! BLAKE3 hashing primitives for content-addressed image storage

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::io::Read;
use std::str::FromStr;

/// Prefix of the textual key form, e.g. `blake3-9f86d0...`
pub const KEY_PREFIX: &str = "blake3-";

/// A BLAKE3 hash (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Blake3Hash([u8; 32]);

impl Blake3Hash {
    /// Create a new Blake3Hash from bytes
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to lowercase hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64 character hex string
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != 64 {
            return Err(Error::decode(
                "hash",
                format!("expected 64 hex characters, got {}", s.len()),
            ));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| Error::decode("hash", e))?;
        Ok(Self(bytes))
    }

    /// Store key form: `blake3-<hex>`
    pub fn to_key(&self) -> String {
        format!("{}{}", KEY_PREFIX, self.to_hex())
    }

    /// Parse the `blake3-<hex>` key form
    pub fn from_key(key: &str) -> Result<Self> {
        let hex = key
            .strip_prefix(KEY_PREFIX)
            .ok_or_else(|| Error::decode("hash", format!("'{}' lacks the {} prefix", key, KEY_PREFIX)))?;
        Self::from_hex(hex)
    }

    /// First 12 hex characters, for log lines and tree output
    pub fn short(&self) -> String {
        self.to_hex()[..12].to_string()
    }
}

impl std::fmt::Debug for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Blake3Hash({})", self.to_hex())
    }
}

impl std::fmt::Display for Blake3Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", KEY_PREFIX, self.to_hex())
    }
}

impl FromStr for Blake3Hash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_key(s)
    }
}

impl Serialize for Blake3Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_key())
    }
}

impl<'de> Deserialize<'de> for Blake3Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_key(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash bytes using BLAKE3
pub fn hash_bytes(data: &[u8]) -> Blake3Hash {
    let hash = blake3::hash(data);
    Blake3Hash::from_bytes(*hash.as_bytes())
}

/// Hash everything a reader yields (streaming)
pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<Blake3Hash> {
    let mut hasher = IncrementalHasher::new();
    let mut buffer = [0u8; 8192]; // 8KB buffer
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize())
}

/// Incremental hasher for building hashes across multiple chunks
pub struct IncrementalHasher {
    inner: blake3::Hasher,
}

impl IncrementalHasher {
    /// Create a new incremental hasher
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    /// Update the hash with more data
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the hash
    pub fn finalize(self) -> Blake3Hash {
        let hash = self.inner.finalize();
        Blake3Hash::from_bytes(*hash.as_bytes())
    }
}

impl Default for IncrementalHasher {
    fn default() -> Self {
        Self::new()
    }
}
