//! Encoding a key pair into its two container files and back.

use num_traits::Zero;
use rsa::BigUint;
use zeroize::Zeroizing;

use crate::crypto::{
    KdfParams, PADDED_PRF_KEY_LEN, PRF_KEY_SIZE, WRAPPED_PRF_KEY_LEN, derive_kek, generate_salt,
    keywrap,
};
use crate::error::KeyError;
use crate::format::{PrivateFile, PublicFile};
use crate::keypair::{KeyPair, PrfKey};
use crate::rsakey::RsaKey;
use crate::secret::SecretBytes;

/// Serialized contents of both container files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedContainer {
    pub private: Vec<u8>,
    pub public: Vec<u8>,
}

/// Encodes a private key pair under `password`.
///
/// A fresh salt is drawn for every call, so encoding the same key pair
/// twice gives different bytes.
///
/// # Errors
///
/// `InvalidArgument` for a public-only key pair, `EmptyPassphrase` for an
/// empty password, and any error from key derivation or wrapping.
pub fn encode(keypair: &KeyPair, password: &[u8]) -> Result<EncodedContainer, KeyError> {
    let v = keypair
        .v()
        .ok_or(KeyError::InvalidArgument("cannot encode a public-only key pair"))?;
    if password.is_empty() {
        return Err(KeyError::EmptyPassphrase);
    }

    let salt = generate_salt()?;
    let wrapped_v = wrap_prf_key(v, password, &salt)?;
    let pem = keypair.rsa().to_encrypted_pem(password)?;
    let private = PrivateFile::new(pem.to_string(), salt, wrapped_v).serialize();

    let public = PublicFile::new(keypair.rsa().to_public_pem()?, keypair.g().to_bytes_be())
        .serialize()?;

    Ok(EncodedContainer { private, public })
}

/// Decodes a private key pair from both container files.
///
/// # Errors
///
/// `Decryption` for a wrong passphrase, an undecryptable private key or a
/// wrapped PRF key that fails its integrity check. `KeyIntegrity` if the RSA
/// key is inconsistent or the public file belongs to another key. `Format`
/// for malformed files.
pub fn decode(private: &[u8], public: &[u8], password: &[u8]) -> Result<KeyPair, KeyError> {
    if password.is_empty() {
        return Err(KeyError::EmptyPassphrase);
    }

    let private = PrivateFile::parse(private)?;
    let rsa = RsaKey::from_encrypted_pem(private.pem(), password)?;
    rsa.check()?;

    let v = unwrap_prf_key(private.wrapped_v(), password, private.salt())?;

    let (stored, g) = parse_public(public)?;
    if stored.public_key() != rsa.public_key() {
        return Err(KeyError::KeyIntegrity);
    }

    KeyPair::from_parts(rsa, Some(v), g)
}

/// Decodes a public-only key pair from the public container file.
pub fn decode_public(public: &[u8]) -> Result<KeyPair, KeyError> {
    let (rsa, g) = parse_public(public)?;
    KeyPair::from_parts(rsa, None, g)
}

fn parse_public(public: &[u8]) -> Result<(RsaKey, BigUint), KeyError> {
    let public = PublicFile::parse(public)?;
    let rsa = RsaKey::from_public_pem(public.pem())?;

    let g = BigUint::from_bytes_be(public.generator());
    if g.is_zero() {
        return Err(KeyError::format("generator is zero"));
    }
    Ok((rsa, g))
}

fn wrap_prf_key(
    v: &[u8; PRF_KEY_SIZE],
    password: &[u8],
    salt: &[u8],
) -> Result<[u8; WRAPPED_PRF_KEY_LEN], KeyError> {
    let kek = derive_kek(password, salt, KdfParams::default())?;

    // AES-KW works on 8-byte semiblocks
    let mut padded = SecretBytes::zeroed(PADDED_PRF_KEY_LEN)?;
    padded[..PRF_KEY_SIZE].copy_from_slice(v);

    let wrapped = keywrap::wrap(&padded, &kek)?;
    wrapped
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::Crypto("unexpected wrapped key length"))
}

fn unwrap_prf_key(
    wrapped: &[u8; WRAPPED_PRF_KEY_LEN],
    password: &[u8],
    salt: &[u8],
) -> Result<PrfKey, KeyError> {
    let kek = derive_kek(password, salt, KdfParams::default())?;

    let padded = keywrap::unwrap(wrapped, &kek).map_err(|e| match e {
        KeyError::Integrity => KeyError::Decryption,
        other => other,
    })?;

    let mut v = Zeroizing::new([0u8; PRF_KEY_SIZE]);
    v.copy_from_slice(&padded[..PRF_KEY_SIZE]);
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SALT_LEN;
    use crate::keypair::pick_generator;
    use crate::rsakey::tests::fixture_key;

    const GOLDEN_PRI: &[u8] = include_bytes!("../tests/fixtures/golden.pri");
    const GOLDEN_PUB: &[u8] = include_bytes!("../tests/fixtures/golden.pub");
    const GOLDEN_G: &str = include_str!("../tests/fixtures/golden_g.hex");
    const GOLDEN_PASSPHRASE: &[u8] = b"fixture-passphrase";

    fn fixture_pair() -> KeyPair {
        let rsa = fixture_key();
        let g = pick_generator(rsa.modulus()).unwrap();
        let v: Vec<u8> = (0u8..20).map(|b| b.wrapping_mul(13)).collect();
        let v: [u8; PRF_KEY_SIZE] = v.try_into().unwrap();
        KeyPair::from_parts(rsa, Some(Zeroizing::new(v)), g).unwrap()
    }

    #[test]
    fn container_roundtrip() {
        let pair = fixture_pair();
        let encoded = encode(&pair, b"pw1").unwrap();

        let decoded = decode(&encoded.private, &encoded.public, b"pw1").unwrap();
        assert_eq!(decoded, pair);
    }

    #[test]
    fn wrong_password_is_rejected() {
        let encoded = encode(&fixture_pair(), b"pw1").unwrap();
        assert!(matches!(
            decode(&encoded.private, &encoded.public, b"pw2"),
            Err(KeyError::Decryption)
        ));
    }

    #[test]
    fn tampered_wrapped_key_reads_as_decryption_failure() {
        let encoded = encode(&fixture_pair(), b"pw").unwrap();
        let mut private = encoded.private.clone();
        let last = private.len() - 1;
        private[last] ^= 0x01;

        let err = decode(&private, &encoded.public, b"pw").unwrap_err();
        assert!(matches!(err, KeyError::Decryption));
        assert_eq!(err.to_string(), "wrong passphrase or corrupted key");
    }

    #[test]
    fn tampered_salt_reads_as_decryption_failure() {
        let encoded = encode(&fixture_pair(), b"pw").unwrap();
        let mut private = encoded.private.clone();
        let salt_at = private.len() - WRAPPED_PRF_KEY_LEN - SALT_LEN;
        private[salt_at] ^= 0x80;

        assert!(matches!(
            decode(&private, &encoded.public, b"pw"),
            Err(KeyError::Decryption)
        ));
    }

    #[test]
    fn public_file_of_other_key_is_integrity_failure() {
        let pair = fixture_pair();
        let other = KeyPair::generate(512).unwrap();

        let ours = encode(&pair, b"pw").unwrap();
        let theirs = encode(&other, b"pw").unwrap();

        let err = decode(&ours.private, &theirs.public, b"pw").unwrap_err();
        assert!(matches!(err, KeyError::KeyIntegrity));
        assert_eq!(
            err.to_string(),
            KeyError::Decryption.to_string(),
            "integrity and decryption failures must look the same"
        );
    }

    #[test]
    fn salt_is_fresh_per_encoding() {
        let pair = fixture_pair();
        let a = encode(&pair, b"pw").unwrap();
        let b = encode(&pair, b"pw").unwrap();

        assert_ne!(a.private, b.private);
        assert_eq!(a.public, b.public);
    }

    #[test]
    fn public_only_pair_cannot_be_encoded() {
        let public = fixture_pair().to_public();
        assert!(matches!(
            encode(&public, b"pw"),
            Err(KeyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn empty_password_is_rejected() {
        let pair = fixture_pair();
        assert!(matches!(encode(&pair, b""), Err(KeyError::EmptyPassphrase)));

        let encoded = encode(&pair, b"pw").unwrap();
        assert!(decode(&encoded.private, &encoded.public, b"").is_err());
    }

    #[test]
    fn decode_public_returns_public_pair() {
        let pair = fixture_pair();
        let encoded = encode(&pair, b"pw").unwrap();

        let public = decode_public(&encoded.public).unwrap();
        assert_eq!(public, pair.to_public());
    }

    #[test]
    fn zero_generator_is_format_error() {
        let pair = fixture_pair();
        let pem = pair.rsa().to_public_pem().unwrap();
        let public = PublicFile::new(pem, vec![0, 0]).serialize().unwrap();

        assert!(matches!(decode_public(&public), Err(KeyError::Format(_))));
    }

    #[test]
    fn golden_container_decodes() {
        let pair = decode(GOLDEN_PRI, GOLDEN_PUB, GOLDEN_PASSPHRASE).unwrap();

        let v: Vec<u8> = (0xA0..0xB4).collect();
        assert_eq!(&pair.v().unwrap()[..], &v[..]);
        assert_eq!(hex::encode(pair.g().to_bytes_be()), GOLDEN_G.trim());
        assert_eq!(pair.rsa(), &fixture_key());
    }

    #[test]
    fn golden_container_rejects_wrong_passphrase() {
        assert!(matches!(
            decode(GOLDEN_PRI, GOLDEN_PUB, b"not-the-passphrase"),
            Err(KeyError::Decryption)
        ));
    }

    #[test]
    fn reencoded_golden_pair_keeps_public_file() {
        let pair = decode(GOLDEN_PRI, GOLDEN_PUB, GOLDEN_PASSPHRASE).unwrap();
        let encoded = encode(&pair, GOLDEN_PASSPHRASE).unwrap();
        assert_eq!(encoded.public, GOLDEN_PUB);
    }
}
