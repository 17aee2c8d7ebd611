//! AES Key Wrap (NIST SP 800-38F / RFC 3394).
//!
//! Wraps a key of `n` 64-bit semiblocks under a 128, 192 or 256 bit
//! key-encryption key, producing `n + 1` semiblocks. The first semiblock
//! carries the integrity value that `unwrap` checks.
//!
//! The step counter is XORed into the low byte of the integrity register
//! only. This matches RFC 3394 for keys up to 336 bytes; longer keys keep
//! the container's historical behaviour.

use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit, generic_array::GenericArray};
use aes::{Aes128, Aes192, Aes256};
use zeroize::Zeroizing;

use crate::error::KeyError;
use crate::secret::{SecretBytes, constant_time_eq};

/// Size of one register (semiblock) in bytes.
pub const SEMIBLOCK_LEN: usize = 8;
/// Extra bytes added by wrapping.
pub const WRAP_OVERHEAD: usize = SEMIBLOCK_LEN;
/// Smallest key that may be wrapped (two semiblocks).
pub const MIN_KEY_LEN: usize = 2 * SEMIBLOCK_LEN;

const DEFAULT_IV: [u8; SEMIBLOCK_LEN] = [0xA6; SEMIBLOCK_LEN];
const ROUNDS: usize = 6;

enum KekCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl KekCipher {
    fn new(kek: &[u8]) -> Result<Self, KeyError> {
        let invalid = |_| KeyError::InvalidArgument("KEK must be 16, 24 or 32 bytes");
        match kek.len() {
            16 => Aes128::new_from_slice(kek).map(Self::Aes128).map_err(invalid),
            24 => Aes192::new_from_slice(kek).map(Self::Aes192).map_err(invalid),
            32 => Aes256::new_from_slice(kek).map(Self::Aes256).map_err(invalid),
            _ => Err(KeyError::InvalidArgument("KEK must be 16, 24 or 32 bytes")),
        }
    }

    fn encrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

// Only the low byte of the step counter is mixed into A, so it wraps
// after 255 steps.
fn xor_counter(a: &mut [u8; SEMIBLOCK_LEN], t: usize) {
    a[SEMIBLOCK_LEN - 1] ^= t as u8;
}

/// Wraps `key` under `kek`.
///
/// `key` must be a multiple of 8 bytes and at least 16 bytes long. The
/// result is `key.len() + 8` bytes.
///
/// # Errors
///
/// Returns `InvalidArgument` for empty or misaligned input or a KEK of the
/// wrong size, and `Allocation` if the output buffer cannot be reserved.
pub fn wrap(key: &[u8], kek: &[u8]) -> Result<Vec<u8>, KeyError> {
    if key.is_empty() || kek.is_empty() {
        return Err(KeyError::InvalidArgument("key and KEK must not be empty"));
    }
    if key.len() % SEMIBLOCK_LEN != 0 || key.len() < MIN_KEY_LEN {
        return Err(KeyError::InvalidArgument(
            "key must be a multiple of 8 bytes and at least 16 bytes",
        ));
    }

    let cipher = KekCipher::new(kek)?;
    let n = key.len() / SEMIBLOCK_LEN;

    // Registers are worked on in a secret buffer; only the finished
    // ciphertext is copied out.
    let mut a = Zeroizing::new(DEFAULT_IV);
    let mut r = SecretBytes::from_slice(key)?;
    let mut block = Zeroizing::new([0u8; 16]);

    for j in 0..ROUNDS {
        for (i, reg) in r.chunks_exact_mut(SEMIBLOCK_LEN).enumerate() {
            block[..SEMIBLOCK_LEN].copy_from_slice(&*a);
            block[SEMIBLOCK_LEN..].copy_from_slice(reg);
            cipher.encrypt(&mut block);

            a.copy_from_slice(&block[..SEMIBLOCK_LEN]);
            xor_counter(&mut *a, n * j + i + 1);
            reg.copy_from_slice(&block[SEMIBLOCK_LEN..]);
        }
    }

    let mut out = Vec::new();
    out.try_reserve_exact(key.len() + WRAP_OVERHEAD)
        .map_err(|_| KeyError::Allocation)?;
    out.extend_from_slice(&*a);
    out.extend_from_slice(&r);
    Ok(out)
}

/// Unwraps `ciphertext` under `kek` and checks its integrity value.
///
/// The result is `ciphertext.len() - 8` bytes.
///
/// # Errors
///
/// Returns `Integrity` if the integrity value does not match, which means
/// a wrong KEK or a modified ciphertext. No partial plaintext is returned.
pub fn unwrap(ciphertext: &[u8], kek: &[u8]) -> Result<SecretBytes, KeyError> {
    if ciphertext.is_empty() || kek.is_empty() {
        return Err(KeyError::InvalidArgument("ciphertext and KEK must not be empty"));
    }
    if ciphertext.len() % SEMIBLOCK_LEN != 0 || ciphertext.len() < MIN_KEY_LEN + WRAP_OVERHEAD {
        return Err(KeyError::InvalidArgument(
            "wrapped key must be a multiple of 8 bytes and at least 24 bytes",
        ));
    }

    let cipher = KekCipher::new(kek)?;
    let n = ciphertext.len() / SEMIBLOCK_LEN - 1;

    let mut a = Zeroizing::new([0u8; SEMIBLOCK_LEN]);
    a.copy_from_slice(&ciphertext[..SEMIBLOCK_LEN]);
    let mut r = SecretBytes::from_slice(&ciphertext[SEMIBLOCK_LEN..])?;
    let mut block = Zeroizing::new([0u8; 16]);

    for j in (0..ROUNDS).rev() {
        for (i, reg) in r.chunks_exact_mut(SEMIBLOCK_LEN).enumerate().rev() {
            xor_counter(&mut *a, n * j + i + 1);
            block[..SEMIBLOCK_LEN].copy_from_slice(&*a);
            block[SEMIBLOCK_LEN..].copy_from_slice(reg);
            cipher.decrypt(&mut block);

            a.copy_from_slice(&block[..SEMIBLOCK_LEN]);
            reg.copy_from_slice(&block[SEMIBLOCK_LEN..]);
        }
    }

    if !constant_time_eq(&*a, &DEFAULT_IV) {
        return Err(KeyError::Integrity);
    }

    Ok(r)
}
