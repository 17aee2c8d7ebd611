//! Byte layout of the two container files.
//!
//! Neither file has a magic number or version field. Each starts with a
//! self-delimiting PEM block followed by exactly one line ending and a
//! fixed binary tail:
//!
//! ```text
//! private: ENCRYPTED PRIVATE KEY PEM | SALT (20) | WRAPPED V (40)
//! public:  RSA PUBLIC KEY PEM | GENERATOR LEN (8, LE) | GENERATOR (BE)
//! ```

use crate::error::KeyError;

pub mod private;
pub mod public;

pub use private::PrivateFile;
pub use public::PublicFile;

/// Upper bound on the stored generator length (64 KiB).
pub const MAX_GENERATOR_LEN: usize = 64 * 1024;

/// Splits `data` into a PEM block with the given label and the bytes that
/// follow it.
///
/// The returned PEM text includes the END line but not the line ending
/// after it, which may be LF or CRLF.
///
/// # Errors
///
/// Returns `Format` if the data does not start with the expected BEGIN line,
/// has no matching END line, is not UTF-8 or lacks the line ending.
pub fn split_pem<'a>(data: &'a [u8], label: &str) -> Result<(&'a str, &'a [u8]), KeyError> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    if !data.starts_with(begin.as_bytes()) {
        return Err(KeyError::format(format!("expected {label} PEM block")));
    }

    let end_at = find(data, end.as_bytes())
        .ok_or_else(|| KeyError::format(format!("unterminated {label} PEM block")))?;
    let pem_len = end_at + end.len();

    let rest = &data[pem_len..];
    let rest = if let Some(rest) = rest.strip_prefix(b"\r\n") {
        rest
    } else if let Some(rest) = rest.strip_prefix(b"\n") {
        rest
    } else {
        return Err(KeyError::format(format!(
            "missing line ending after {label} PEM block"
        )));
    };

    let pem = std::str::from_utf8(&data[..pem_len])
        .map_err(|_| KeyError::format(format!("{label} PEM block is not valid text")))?;

    Ok((pem, rest))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Appends `pem` and a single LF.
pub(crate) fn push_pem(out: &mut Vec<u8>, pem: &str) {
    let pem = pem.trim_end_matches(['\r', '\n']);
    out.extend_from_slice(pem.as_bytes());
    out.push(b'\n');
}
