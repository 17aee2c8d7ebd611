//! PBKDF2 (PKCS #5 v2, RFC 8018) over HMAC-SHA1.

use hmac::{Hmac, Mac};
use sha1::Sha1;
use zeroize::{Zeroize, Zeroizing};

use super::{KEK_LEN, PBKDF2_ITERATIONS};
use crate::error::KeyError;
use crate::secret::SecretBytes;

type HmacSha1 = Hmac<Sha1>;

/// HMAC-SHA1 output length.
pub const DIGEST_LEN: usize = 20;

/// Parameters for deriving a key-encryption key from a passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
    key_len: usize,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // fixed by the container format
            iterations: PBKDF2_ITERATIONS,
            // AES-128 KEK
            key_len: KEK_LEN,
        }
    }
}

impl KdfParams {
    pub fn new(iterations: u32, key_len: usize) -> Result<Self, KeyError> {
        let params = Self {
            iterations,
            key_len,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn validate(&self) -> Result<(), KeyError> {
        if self.iterations < 1 {
            return Err(KeyError::InvalidArgument("PBKDF2 iterations must be >= 1"));
        }
        if !matches!(self.key_len, 16 | 24 | 32) {
            return Err(KeyError::InvalidArgument("KEK length must be 16, 24 or 32 bytes"));
        }
        Ok(())
    }
}

/// Derives a key-encryption key from `password` and `salt`.
pub fn derive_kek(password: &[u8], salt: &[u8], kdf: KdfParams) -> Result<SecretBytes, KeyError> {
    kdf.validate()?;
    pbkdf2_hmac_sha1(password, salt, kdf.iterations, kdf.key_len)
}

/// PBKDF2-HMAC-SHA1 producing `output_len` bytes.
///
/// # Errors
///
/// Returns `InvalidArgument` if the password, salt, iteration count or
/// output length is empty or zero.
pub fn pbkdf2_hmac_sha1(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Result<SecretBytes, KeyError> {
    if password.is_empty() || salt.is_empty() {
        return Err(KeyError::InvalidArgument("password and salt must not be empty"));
    }
    if iterations == 0 || output_len == 0 {
        return Err(KeyError::InvalidArgument(
            "iteration count and output length must be non-zero",
        ));
    }
    if output_len.div_ceil(DIGEST_LEN) > u32::MAX as usize {
        return Err(KeyError::InvalidArgument("derived key too long"));
    }

    let prf = HmacSha1::new_from_slice(password)
        .map_err(|_| KeyError::Crypto("HMAC key setup failed"))?;

    let mut derived = SecretBytes::zeroed(output_len)?;
    for (index, chunk) in derived.chunks_mut(DIGEST_LEN).enumerate() {
        // block indices start at 1
        let t = block(&prf, salt, iterations, index as u32 + 1)?;
        chunk.copy_from_slice(&t[..chunk.len()]);
    }

    Ok(derived)
}

/// `F(P, S, c, i) = U1 ^ U2 ^ ... ^ Uc`
fn block(
    prf: &HmacSha1,
    salt: &[u8],
    iterations: u32,
    index: u32,
) -> Result<Zeroizing<[u8; DIGEST_LEN]>, KeyError> {
    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&index.to_be_bytes());

    let mut u = finalize(mac)?;
    let mut t = u.clone();

    for _ in 1..iterations {
        let mut mac = prf.clone();
        mac.update(&*u);
        u = finalize(mac)?;
        t.iter_mut().zip(u.iter()).for_each(|(t, u)| *t ^= u);
    }

    Ok(t)
}

fn finalize(mac: HmacSha1) -> Result<Zeroizing<[u8; DIGEST_LEN]>, KeyError> {
    let mut tag = mac.finalize().into_bytes();
    let digest: Result<[u8; DIGEST_LEN], _> = tag.as_slice().try_into();
    tag.as_mut_slice().zeroize();
    digest
        .map(Zeroizing::new)
        .map_err(|_| KeyError::Crypto("unexpected HMAC digest length"))
}
