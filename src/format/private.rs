//! Private container file.

use super::{push_pem, split_pem};
use crate::crypto::{SALT_LEN, WRAPPED_PRF_KEY_LEN};
use crate::error::KeyError;
use crate::rsakey::ENCRYPTED_PRIVATE_KEY_LABEL;

/// Length of the binary tail after the PEM block.
pub const TAIL_LEN: usize = SALT_LEN + WRAPPED_PRF_KEY_LEN;

/// Parsed private container file. Everything in it is encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateFile {
    pem: String,
    salt: [u8; SALT_LEN],
    wrapped_v: [u8; WRAPPED_PRF_KEY_LEN],
}

impl PrivateFile {
    pub fn new(pem: String, salt: [u8; SALT_LEN], wrapped_v: [u8; WRAPPED_PRF_KEY_LEN]) -> Self {
        Self {
            pem,
            salt,
            wrapped_v,
        }
    }

    /// The passphrase-encrypted PKCS #8 PEM block.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// PBKDF2 salt for the key-encryption key.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// AES-KW ciphertext of the zero-padded PRF key.
    pub fn wrapped_v(&self) -> &[u8; WRAPPED_PRF_KEY_LEN] {
        &self.wrapped_v
    }

    /// Parses a private container file.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the PEM block is malformed or the tail is not
    /// exactly salt plus wrapped key.
    pub fn parse(data: &[u8]) -> Result<Self, KeyError> {
        let (pem, tail) = split_pem(data, ENCRYPTED_PRIVATE_KEY_LABEL)?;

        if tail.len() < TAIL_LEN {
            return Err(KeyError::format("private key file is truncated"));
        }
        if tail.len() > TAIL_LEN {
            return Err(KeyError::format("trailing bytes after wrapped PRF key"));
        }

        let (salt, wrapped_v) = tail.split_at(SALT_LEN);
        Ok(Self {
            pem: pem.to_string(),
            salt: salt
                .try_into()
                .map_err(|_| KeyError::format("bad salt length"))?,
            wrapped_v: wrapped_v
                .try_into()
                .map_err(|_| KeyError::format("bad wrapped PRF key length"))?,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pem.len() + 1 + TAIL_LEN);
        push_pem(&mut out, &self.pem);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.wrapped_v);
        out
    }
}
