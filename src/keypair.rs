//! The in-memory PDP key pair: RSA key, PRF key `v` and generator `g`.

use std::fmt;

use num_bigint_dig::RandBigInt;
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rsa::BigUint;
use zeroize::Zeroizing;

use crate::crypto::{PRF_KEY_SIZE, generate_prf_key};
use crate::error::KeyError;
use crate::rsakey::RsaKey;

/// PRF key `v`.
pub type PrfKey = Zeroizing<[u8; PRF_KEY_SIZE]>;

/// Candidates drawn before generator selection gives up.
const MAX_GENERATOR_ATTEMPTS: usize = 1000;

/// A PDP key pair.
///
/// `v` is present exactly when the RSA key is private. All secret parts
/// are wiped when the value is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    rsa: RsaKey,
    v: Option<PrfKey>,
    g: BigUint,
}

impl KeyPair {
    /// Generates a new private key pair with an RSA modulus of `rsa_bits`.
    pub fn generate(rsa_bits: usize) -> Result<Self, KeyError> {
        let rsa = RsaKey::generate(rsa_bits)?;
        let v = generate_prf_key()?;
        let g = pick_generator(rsa.modulus())?;
        Self::from_parts(rsa, Some(v), g)
    }

    /// Assembles a key pair from its parts.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `v` is given for a public key or missing for a
    /// private one, or if `g` is zero.
    pub fn from_parts(rsa: RsaKey, v: Option<PrfKey>, g: BigUint) -> Result<Self, KeyError> {
        if rsa.is_private() != v.is_some() {
            return Err(KeyError::InvalidArgument(
                "PRF key must be present exactly for private key pairs",
            ));
        }
        if g.is_zero() {
            return Err(KeyError::InvalidArgument("generator must not be zero"));
        }
        Ok(Self { rsa, v, g })
    }

    pub fn rsa(&self) -> &RsaKey {
        &self.rsa
    }

    pub fn v(&self) -> Option<&[u8; PRF_KEY_SIZE]> {
        self.v.as_deref()
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    pub fn is_private(&self) -> bool {
        self.rsa.is_private()
    }

    /// Copy without `v` or any private RSA parameters.
    pub fn to_public(&self) -> Self {
        Self {
            rsa: RsaKey::Public(self.rsa.public_key()),
            v: None,
            g: self.g.clone(),
        }
    }

    /// Releases the key pair, wiping its secret parts.
    pub fn destroy(self) {
        drop(self);
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("rsa", &self.rsa)
            .field("v", &self.v.as_ref().map(|_| "[REDACTED]"))
            .field("g_bits", &self.g.bits())
            .finish()
    }
}

/// Picks a PDP generator for modulus `n`.
///
/// Draws `a < n` with `gcd(a, n)`, `gcd(a - 1, n)` and `gcd(a + 1, n)` all
/// equal to one and returns `a² mod n`, a quadratic residue of the group.
pub fn pick_generator(n: &BigUint) -> Result<BigUint, KeyError> {
    let one = BigUint::one();
    if *n <= BigUint::from(3u32) {
        return Err(KeyError::InvalidArgument("modulus too small"));
    }

    let mut rng = OsRng;
    for _ in 0..MAX_GENERATOR_ATTEMPTS {
        let a = rng.gen_biguint_below(n);
        if a <= one {
            continue;
        }
        let coprime = |x: &BigUint| x.gcd(n).is_one();
        if coprime(&a) && coprime(&(&a - &one)) && coprime(&(&a + &one)) {
            return Ok((&a * &a) % n);
        }
    }

    Err(KeyError::KeyGeneration(
        "no suitable generator found for modulus".into(),
    ))
}
