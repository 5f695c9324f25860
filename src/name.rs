//! Domain names and labels.

use bytes::Bytes;
use std::fmt;

use crate::wire::DecodeError;

/// The maximum number of pointer hops `DomainName::decode` will follow before giving up.
///
/// RFC 1035 doesn't specify a limit; this matches the depth a message of the maximum wire
/// size (65535 bytes) could plausibly chain through, with headroom to spare.
const MAX_POINTER_HOPS: usize = 128;

/// The maximum total length, in bytes, of the labels making up a name (RFC 1035 § 3.1).
const MAX_NAME_BYTES: usize = 255;

/// A fully-qualified domain name: an ordered sequence of labels.
///
/// The root name is the empty sequence and renders as `.`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DomainName(Vec<Bytes>);

impl DomainName {
    /// The root name.
    pub fn root() -> DomainName {
        DomainName(Vec::new())
    }

    /// Extracts a slice of the labels in the name.
    pub fn labels(&self) -> &[Bytes] {
        &self.0
    }

    /// Decodes a name starting at `pos` in `buf`, returning the name and the offset immediately
    /// following the name *as it appears at `pos`* (i.e. following a pointer, not its target).
    pub fn decode(buf: &[u8], pos: usize) -> Result<(DomainName, usize), DecodeError> {
        let mut labels = Vec::new();
        let mut cursor = pos;
        // Position to resume the caller's cursor at, set the first time we take a pointer.
        let mut resume_at: Option<usize> = None;
        let mut hops = 0usize;
        let mut total_len = 0usize;

        loop {
            let marker = *buf.get(cursor).ok_or(DecodeError::Truncated)?;
            match marker >> 6 {
                0b00 => {
                    let len = (marker & 0x3f) as usize;
                    if len == 0 {
                        let end = cursor + 1;
                        return Ok((DomainName(labels), resume_at.unwrap_or(end)));
                    }
                    total_len += len + 1;
                    if total_len > MAX_NAME_BYTES {
                        return Err(DecodeError::LimitExceeded);
                    }
                    let start = cursor + 1;
                    let end = start + len;
                    let label = buf.get(start..end).ok_or(DecodeError::Truncated)?;
                    labels.push(Bytes::copy_from_slice(label));
                    cursor = end;
                }
                0b11 => {
                    let lo = *buf.get(cursor + 1).ok_or(DecodeError::Truncated)?;
                    let target = (((marker & 0x3f) as usize) << 8) | lo as usize;
                    if resume_at.is_none() {
                        resume_at = Some(cursor + 2);
                    }
                    if target >= cursor {
                        return Err(DecodeError::BadPointer);
                    }
                    hops += 1;
                    if hops > MAX_POINTER_HOPS {
                        return Err(DecodeError::LoopDetected);
                    }
                    cursor = target;
                }
                _ => return Err(DecodeError::BadLabel),
            }
        }
    }

    /// Appends the name to `buf` uncompressed: each label length-prefixed, terminated by a zero
    /// octet.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        for label in &self.0 {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label);
        }
        buf.push(0);
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        for (i, label) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}

impl From<Vec<Bytes>> for DomainName {
    fn from(v: Vec<Bytes>) -> DomainName {
        DomainName(v)
    }
}
