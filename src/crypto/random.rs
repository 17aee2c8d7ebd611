use super::{PRF_KEY_SIZE, SALT_LEN};
use crate::error::KeyError;
use getrandom::fill;
use zeroize::Zeroizing;

/// Fill buffer with cryptographically secure random bytes
pub fn secure_random(buf: &mut [u8]) -> Result<(), KeyError> {
    fill(buf).map_err(|_| KeyError::Rng)
}

/// Generate salt
pub fn generate_salt() -> Result<[u8; SALT_LEN], KeyError> {
    let mut salt = [0u8; SALT_LEN];
    secure_random(&mut salt)?;
    Ok(salt)
}

/// Generate a fresh PRF key `v`
pub fn generate_prf_key() -> Result<Zeroizing<[u8; PRF_KEY_SIZE]>, KeyError> {
    let mut v = Zeroizing::new([0u8; PRF_KEY_SIZE]);
    secure_random(v.as_mut())?;
    Ok(v)
}
