//! ## DSR mesh wire format
//!
//! Every radio frame carries exactly one ASCII message. Fields are
//! colon-separated, the first field names the kind, and source routes are
//! hyphen-joined lists of node identifiers:
//!
//! ```text
//! HELLO : <id>
//! RREQ  : <src> : <dst> : <stamp> : [<n1>-<n2>-...-<nk>]
//! RREP  : <src> : <dst> : <stamp> : <n1>-<n2>-...-<nk>
//! DATA  : <src> : <dst> : <stamp> : <n1>-<n2>-...-<nk>
//! RESP  : <src> : <dst> : <stamp> : <n1>-<n2>-...-<nk> : <payload> : <check>
//! ```
//!
//! An empty route is encoded as an empty field; both the empty trailing
//! field and a present hyphen list are accepted on RREQ and RREP, because
//! both encodings exist on the air. RESP is the only kind protected by an
//! integrity check, a 16-bit one's-complement sum over everything before
//! the final `:`.

pub mod frame;

use std::str::Utf8Error;

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    UnknownKind,
    MissingField,
    EmptyToken,
    InvalidToken,
    InvalidStamp,
    InvalidCheck,
    Utf8Error(Utf8Error),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Self::Utf8Error(value)
    }
}

/// 16-bit one's-complement sum of the message bytes.
///
/// Byte pairs are packed big-endian, carries are folded back into the low
/// 16 bits, and the final sum is inverted. A message with an odd length is
/// padded implicitly by treating the last byte as a whole word.
///
/// # Test
///
/// ```
/// use mesh_node_codec::checksum;
///
/// assert_eq!(checksum(b""), 0xffff);
/// assert_eq!(checksum(b"RESP:C:A:1:B:23.5,60.1"), checksum(b"RESP:C:A:1:B:23.5,60.1"));
/// assert_ne!(checksum(b"RESP:C:A:1:B:23.5,60.1"), checksum(b"RESP:C:A:1:B:23.5,60.2"));
/// ```
pub fn checksum(message: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    for pair in message.chunks(2) {
        let word = if pair.len() == 2 {
            ((pair[0] as u32) << 8) + pair[1] as u32
        } else {
            pair[0] as u32
        };

        sum += word;
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !sum as u16
}

/// Checks a message whose final colon-separated field is a decimal check
/// value computed by [`checksum`] over everything before that final `:`.
///
/// # Test
///
/// ```
/// use mesh_node_codec::{checksum, verify};
///
/// let text = format!("RESP:C:A:1:B:23.5,60.1:{}", checksum(b"RESP:C:A:1:B:23.5,60.1"));
///
/// assert!(verify(text.as_bytes()));
/// assert!(!verify(b"RESP:C:A:1:B:23.5,60.1:0"));
/// assert!(!verify(b"no check field at all"));
/// ```
pub fn verify(message: &[u8]) -> bool {
    let Some(at) = message.iter().rposition(|b| *b == b':') else {
        return false;
    };

    let Ok(received) = std::str::from_utf8(&message[at + 1..])
        .map_err(|_| ())
        .and_then(|it| it.parse::<u16>().map_err(|_| ()))
    else {
        return false;
    };

    received == checksum(&message[..at])
}
