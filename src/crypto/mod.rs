//! Cryptographic primitives for the key container.
//!
//! Provides the AES key wrap, PBKDF2 key derivation and OS randomness.

pub mod kdf;
pub mod keywrap;
pub mod random;

pub use kdf::{KdfParams, derive_kek, pbkdf2_hmac_sha1};
pub use keywrap::{unwrap, wrap};
pub use random::{generate_prf_key, generate_salt, secure_random};

/// Length of the PRF key `v` (one SHA-1 digest, 20 bytes).
pub const PRF_KEY_SIZE: usize = 20;
/// Length of the PBKDF2 salt stored in the private file (20 bytes).
pub const SALT_LEN: usize = PRF_KEY_SIZE;
/// Length of the key-encryption key (16 bytes / AES-128).
pub const KEK_LEN: usize = 16;
/// PBKDF2 iteration count fixed by the container format.
pub const PBKDF2_ITERATIONS: u32 = 10_000;
/// `v` zero-padded to a whole number of 8-byte semiblocks before wrapping.
pub const PADDED_PRF_KEY_LEN: usize = 32;
/// Length of the wrapped `v` (32 bytes + 8 byte integrity block).
pub const WRAPPED_PRF_KEY_LEN: usize = PADDED_PRF_KEY_LEN + keywrap::WRAP_OVERHEAD;
