//! RSA key handle used by the key pair.
//!
//! Only the operations the container needs are exposed: generation,
//! the consistency check and the two PEM serializations.

use std::fmt;

use pkcs8::der::{Document, Encode};
use pkcs8::pkcs5::pbes2;
use pkcs8::{EncryptedPrivateKeyInfo, LineEnding, PrivateKeyInfo};
use rand::rngs::OsRng;
use rsa::pkcs1::{self, DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use zeroize::Zeroizing;

use crate::crypto::secure_random;
use crate::error::KeyError;

/// PEM label of the encrypted private key.
pub const ENCRYPTED_PRIVATE_KEY_LABEL: &str = "ENCRYPTED PRIVATE KEY";
/// PEM label of the PKCS #1 public key.
pub const RSA_PUBLIC_KEY_LABEL: &str = "RSA PUBLIC KEY";

/// PBKDF2 rounds protecting the PEM private key.
const PEM_PBKDF2_ITERATIONS: u32 = 2048;
const PEM_SALT_LEN: usize = 16;
const PEM_IV_LEN: usize = 16;

#[derive(Clone, PartialEq, Eq)]
pub enum RsaKey {
    Private(RsaPrivateKey),
    Public(RsaPublicKey),
}

impl RsaKey {
    /// Generates a fresh private key with exponent 65537.
    pub fn generate(bits: usize) -> Result<Self, KeyError> {
        RsaPrivateKey::new(&mut OsRng, bits)
            .map(Self::Private)
            .map_err(|e| KeyError::KeyGeneration(e.to_string()))
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }

    /// Checks that the private components agree with the public ones.
    pub fn check(&self) -> Result<(), KeyError> {
        match self {
            Self::Private(key) => key.validate().map_err(|_| KeyError::KeyIntegrity),
            Self::Public(_) => Ok(()),
        }
    }

    pub fn public_key(&self) -> RsaPublicKey {
        match self {
            Self::Private(key) => key.to_public_key(),
            Self::Public(key) => key.clone(),
        }
    }

    pub fn modulus(&self) -> &BigUint {
        match self {
            Self::Private(key) => key.n(),
            Self::Public(key) => key.n(),
        }
    }

    pub fn exponent(&self) -> &BigUint {
        match self {
            Self::Private(key) => key.e(),
            Self::Public(key) => key.e(),
        }
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        self.modulus().bits()
    }

    /// Serializes the private key as passphrase-encrypted PKCS #8 PEM
    /// (PBES2 with PBKDF2-HMAC-SHA256 and AES-256-CBC).
    pub fn to_encrypted_pem(&self, password: &[u8]) -> Result<Zeroizing<String>, KeyError> {
        let Self::Private(key) = self else {
            return Err(KeyError::InvalidArgument("public key has no private half"));
        };
        if password.is_empty() {
            return Err(KeyError::EmptyPassphrase);
        }

        let mut salt = [0u8; PEM_SALT_LEN];
        let mut iv = [0u8; PEM_IV_LEN];
        secure_random(&mut salt)?;
        secure_random(&mut iv)?;

        let params = pbes2::Parameters::pbkdf2_sha256_aes256cbc(PEM_PBKDF2_ITERATIONS, &salt, &iv)
            .map_err(|_| KeyError::Crypto("invalid PBES2 parameters"))?;

        let der = private_key_to_pkcs1(key)?;
        let encrypted = PrivateKeyInfo::new(pkcs1::ALGORITHM_ID, &der)
            .encrypt_with_params(params, password)
            .map_err(|_| KeyError::Crypto("private key encryption failed"))?;

        encrypted
            .to_pem(ENCRYPTED_PRIVATE_KEY_LABEL, LineEnding::LF)
            .map_err(|_| KeyError::Crypto("PEM encoding failed"))
    }

    /// Decrypts a PKCS #8 PEM private key.
    ///
    /// A wrong passphrase and a malformed key give the same `Decryption`
    /// error.
    pub fn from_encrypted_pem(pem: &str, password: &[u8]) -> Result<Self, KeyError> {
        let (label, der) = Document::from_pem(pem).map_err(|_| KeyError::Decryption)?;
        if label != ENCRYPTED_PRIVATE_KEY_LABEL {
            return Err(KeyError::Decryption);
        }

        let encrypted =
            EncryptedPrivateKeyInfo::try_from(der.as_bytes()).map_err(|_| KeyError::Decryption)?;
        let plain = encrypted
            .decrypt(password)
            .map_err(|_| KeyError::Decryption)?;

        private_key_from_pkcs8(plain.as_bytes()).map(Self::Private)
    }

    pub fn to_public_pem(&self) -> Result<String, KeyError> {
        self.public_key()
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|_| KeyError::Crypto("PEM encoding failed"))
    }

    pub fn from_public_pem(pem: &str) -> Result<Self, KeyError> {
        RsaPublicKey::from_pkcs1_pem(pem)
            .map(Self::Public)
            .map_err(|e| KeyError::format(format!("invalid RSA public key: {e}")))
    }
}

/// Encodes the private key as PKCS #1 DER, keeping every byte copy of a
/// private component in a wiped buffer.
fn private_key_to_pkcs1(key: &RsaPrivateKey) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let [p, q] = key.primes() else {
        return Err(KeyError::InvalidArgument("multi-prime keys are not supported"));
    };
    let missing = || KeyError::Crypto("CRT parameters missing");

    let n = key.n().to_bytes_be();
    let e = key.e().to_bytes_be();
    let d = Zeroizing::new(key.d().to_bytes_be());
    let p = Zeroizing::new(p.to_bytes_be());
    let q = Zeroizing::new(q.to_bytes_be());
    let dp = Zeroizing::new(key.dp().ok_or_else(missing)?.to_bytes_be());
    let dq = Zeroizing::new(key.dq().ok_or_else(missing)?.to_bytes_be());
    let qinv = Zeroizing::new(key.crt_coefficient().ok_or_else(missing)?.to_bytes_be());

    fn uint(bytes: &[u8]) -> Result<pkcs1::UintRef<'_>, KeyError> {
        pkcs1::UintRef::new(bytes).map_err(|_| KeyError::Crypto("PKCS #1 encoding failed"))
    }

    let pkcs1_key = pkcs1::RsaPrivateKey {
        modulus: uint(&n)?,
        public_exponent: uint(&e)?,
        private_exponent: uint(&d)?,
        prime1: uint(&p)?,
        prime2: uint(&q)?,
        exponent1: uint(&dp)?,
        exponent2: uint(&dq)?,
        coefficient: uint(&qinv)?,
        other_prime_infos: None,
    };

    pkcs1_key
        .to_der()
        .map(Zeroizing::new)
        .map_err(|_| KeyError::Crypto("PKCS #1 encoding failed"))
}

/// Builds an RSA private key from decrypted PKCS #8 DER.
///
/// The private components are converted through wiped little-endian
/// copies; `BigUint::from_bytes_be` would leave an unwiped reversed copy
/// behind.
fn private_key_from_pkcs8(der: &[u8]) -> Result<RsaPrivateKey, KeyError> {
    let info = PrivateKeyInfo::try_from(der).map_err(|_| KeyError::Decryption)?;
    if info.algorithm.oid != pkcs1::ALGORITHM_OID {
        return Err(KeyError::Decryption);
    }

    let key = pkcs1::RsaPrivateKey::try_from(info.private_key).map_err(|_| KeyError::Decryption)?;
    if key.version() != pkcs1::Version::TwoPrime {
        return Err(KeyError::Decryption);
    }

    let n = BigUint::from_bytes_be(key.modulus.as_bytes());
    let e = BigUint::from_bytes_be(key.public_exponent.as_bytes());
    let d = secret_uint(key.private_exponent.as_bytes());
    let primes = vec![
        secret_uint(key.prime1.as_bytes()),
        secret_uint(key.prime2.as_bytes()),
    ];

    RsaPrivateKey::from_components(n, e, d, primes).map_err(|_| KeyError::Decryption)
}

fn secret_uint(be: &[u8]) -> BigUint {
    let mut le = Zeroizing::new(be.to_vec());
    le.reverse();
    BigUint::from_bytes_le(&le)
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_private() { "Private" } else { "Public" };
        f.debug_struct("RsaKey")
            .field("kind", &kind)
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}
