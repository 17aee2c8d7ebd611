//! Public container file.

use super::{MAX_GENERATOR_LEN, push_pem, split_pem};
use crate::error::KeyError;
use crate::rsakey::RSA_PUBLIC_KEY_LABEL;

/// Width of the generator length prefix.
pub const LEN_PREFIX: usize = 8;

/// Parsed public container file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicFile {
    pem: String,
    generator: Vec<u8>,
}

impl PublicFile {
    pub fn new(pem: String, generator: Vec<u8>) -> Self {
        Self { pem, generator }
    }

    /// The PKCS #1 public key PEM block.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Generator as a big-endian unsigned integer.
    pub fn generator(&self) -> &[u8] {
        &self.generator
    }

    /// Parses a public container file.
    ///
    /// # Errors
    ///
    /// Returns `Format` for a malformed PEM block, a generator length of
    /// zero or above [`MAX_GENERATOR_LEN`], or a tail whose size does not
    /// match the length prefix. `Allocation` if the generator buffer cannot
    /// be reserved.
    pub fn parse(data: &[u8]) -> Result<Self, KeyError> {
        let (pem, tail) = split_pem(data, RSA_PUBLIC_KEY_LABEL)?;

        if tail.len() < LEN_PREFIX {
            return Err(KeyError::format("missing generator length"));
        }
        let (prefix, body) = tail.split_at(LEN_PREFIX);
        let prefix: [u8; LEN_PREFIX] = prefix
            .try_into()
            .map_err(|_| KeyError::format("bad generator length prefix"))?;
        let len = u64::from_le_bytes(prefix);

        if len == 0 {
            return Err(KeyError::format("empty generator"));
        }
        if len > MAX_GENERATOR_LEN as u64 {
            return Err(KeyError::format(format!(
                "generator length {len} exceeds {MAX_GENERATOR_LEN} bytes"
            )));
        }
        let len = len as usize;

        if body.len() < len {
            return Err(KeyError::format("public key file is truncated"));
        }
        if body.len() > len {
            return Err(KeyError::format("trailing bytes after generator"));
        }

        let mut generator = Vec::new();
        generator
            .try_reserve_exact(len)
            .map_err(|_| KeyError::Allocation)?;
        generator.extend_from_slice(body);

        Ok(Self {
            pem: pem.to_string(),
            generator,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, KeyError> {
        if self.generator.is_empty() || self.generator.len() > MAX_GENERATOR_LEN {
            return Err(KeyError::InvalidArgument("generator length out of range"));
        }

        let mut out = Vec::with_capacity(self.pem.len() + 1 + LEN_PREFIX + self.generator.len());
        push_pem(&mut out, &self.pem);
        out.extend_from_slice(&(self.generator.len() as u64).to_le_bytes());
        out.extend_from_slice(&self.generator);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN RSA PUBLIC KEY-----\nMEgC\n-----END RSA PUBLIC KEY-----";

    fn file_with_tail(tail: &[u8]) -> Vec<u8> {
        let mut out = format!("{PEM}\n").into_bytes();
        out.extend_from_slice(tail);
        out
    }

    #[test]
    fn layout_is_pem_newline_len_generator() {
        let bytes = PublicFile::new(PEM.to_string(), vec![0xAB, 0xCD])
            .serialize()
            .unwrap();

        assert_eq!(bytes, file_with_tail(&[2, 0, 0, 0, 0, 0, 0, 0, 0xAB, 0xCD]));
    }

    #[test]
    fn parse_reads_serialized_file() {
        let file = PublicFile::new(PEM.to_string(), vec![9; 128]);
        let parsed = PublicFile::parse(&file.serialize().unwrap()).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn zero_length_generator_is_rejected() {
        let data = file_with_tail(&[0; 8]);
        assert!(matches!(PublicFile::parse(&data), Err(KeyError::Format(_))));
    }

    #[test]
    fn oversized_length_is_rejected_without_allocating() {
        let data = file_with_tail(&u64::MAX.to_le_bytes());
        let err = PublicFile::parse(&data).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn truncated_generator_is_rejected() {
        let data = file_with_tail(&[4, 0, 0, 0, 0, 0, 0, 0, 1, 2]);
        let err = PublicFile::parse(&data).unwrap_err();
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let data = file_with_tail(&[1, 0, 0, 0, 0, 0, 0, 0, 1, 2]);
        let err = PublicFile::parse(&data).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn short_prefix_is_rejected() {
        let data = file_with_tail(&[1, 0, 0]);
        assert!(PublicFile::parse(&data).is_err());
    }

    #[test]
    fn empty_generator_cannot_be_serialized() {
        assert!(PublicFile::new(PEM.to_string(), Vec::new()).serialize().is_err());
    }

    #[test]
    fn golden_file_parses() {
        let data = include_bytes!("../../tests/fixtures/golden.pub");
        let file = PublicFile::parse(data).unwrap();
        let expected = include_str!("../../tests/fixtures/golden_g.hex");
        assert_eq!(hex::encode(file.generator()), expected.trim());
    }
}
