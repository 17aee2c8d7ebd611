//! Owned secret buffers that are zero-filled when dropped.

use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::{Zeroize, Zeroizing};

use crate::error::KeyError;

/// A heap buffer holding secret bytes (passphrases, derived keys,
/// unwrapped key material).
///
/// The buffer is allocated once at its final size and never grows, so no
/// stale copy is left behind by a reallocation. Its whole capacity is
/// zeroed on drop.
#[derive(Clone)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    /// Allocates a zero-filled buffer of `len` bytes.
    pub fn zeroed(len: usize) -> Result<Self, KeyError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| KeyError::Allocation)?;
        buf.resize(len, 0);
        Ok(Self(Zeroizing::new(buf)))
    }

    /// Copies `bytes` into a freshly allocated secret buffer.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let mut secret = Self::zeroed(bytes.len())?;
        secret.copy_from_slice(bytes);
        Ok(secret)
    }

    /// Shortens the buffer, wiping the bytes that are cut off.
    pub fn truncate(&mut self, len: usize) {
        if len < self.0.len() {
            self.0[len..].zeroize();
            self.0.truncate(len);
        }
    }

    /// Compares two secrets without short-circuiting on the first
    /// differing byte.
    pub fn ct_eq(&self, other: &SecretBytes) -> bool {
        constant_time_eq(self, other)
    }
}

impl Deref for SecretBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl DerefMut for SecretBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AsRef<[u8]> for SecretBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<String> for SecretBytes {
    /// Takes over the string's allocation without copying it.
    fn from(value: String) -> Self {
        Self(Zeroizing::new(value.into_bytes()))
    }
}

impl From<Zeroizing<String>> for SecretBytes {
    fn from(mut value: Zeroizing<String>) -> Self {
        Self::from(std::mem::take(&mut *value))
    }
}

impl fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretBytes([REDACTED; {}])", self.0.len())
    }
}

/// Full-length comparison; only the lengths leak through timing.
pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
