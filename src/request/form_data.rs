//! `multipart/form-data` header values
//!
//! Boundary generation and checks, the body `Content-Type`, and quoting of
//! names and filenames inside `Content-Disposition`. Part framing itself is
//! done by `mpart_async`.

use std::fmt::Write;
use std::io;

use super::RequestError;

/// Content type declared for file parts
pub const FILE_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest boundary allowed by RFC 2046
const MAX_BOUNDARY_LEN: usize = 70;

/// Random bytes behind a generated boundary (hex encoded, so 60 chars)
const RANDOM_BOUNDARY_BYTES: usize = 30;

pub(crate) fn random_boundary() -> String {
    let bytes: [u8; RANDOM_BOUNDARY_BYTES] = rand::random();
    hex::encode(bytes)
}

/// Check a caller-chosen boundary
///
/// 1 to 70 characters from the RFC 2046 set, not ending in a space.
pub(crate) fn validate_boundary(boundary: &str) -> Result<(), RequestError> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(RequestError::InvalidBoundary(format!(
            "boundary must be 1 to {} characters, got {}",
            MAX_BOUNDARY_LEN,
            boundary.len()
        )));
    }

    if boundary.ends_with(' ') {
        return Err(RequestError::InvalidBoundary(
            "boundary must not end with a space".into(),
        ));
    }

    if let Some(c) = boundary
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(*c)))
    {
        return Err(RequestError::InvalidBoundary(format!(
            "boundary contains invalid character {:?}",
            c
        )));
    }

    Ok(())
}

/// `Content-Type` header value for a body using `boundary`
pub(crate) fn content_type(boundary: &str) -> String {
    if boundary.contains(|c: char| "()<>@,;:\\\"/[]?= ".contains(c)) {
        format!("multipart/form-data; boundary=\"{}\"", boundary)
    } else {
        format!("multipart/form-data; boundary={}", boundary)
    }
}

/// Reject field names that cannot be carried in a part header
pub(crate) fn check_field_name(name: &str) -> io::Result<()> {
    match name.chars().find(|c| c.is_control()) {
        Some(c) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("field name contains control character {:?}", c),
        )),
        None => Ok(()),
    }
}

/// Quote a `Content-Disposition` parameter value
///
/// Backslashes and quotes are escaped; control characters are
/// percent-encoded so they never reach the header line.
pub(crate) fn quote_param(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            c if c.is_ascii_control() => {
                let _ = write!(quoted, "%{:02X}", c as u32);
            }
            c => quoted.push(c),
        }
    }
    quoted
}
