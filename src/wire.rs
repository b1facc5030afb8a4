//! Binary envelope and base64 text encoding for the transport boundary.
//!
//! # Format
//!
//! ```text
//! offset  size  field
//! 0       4     magic "CKTL"
//! 4       1     version (1)
//! 5       1     payload kind
//! 6       2     reserved, zero
//! 8       4     payload length, u32 LE
//! 12      n     bincode payload (fixed-width little-endian integers)
//! ```
//!
//! Decoding checks every header field, requires the buffer to end exactly
//! after the payload and bounds allocation by the declared length.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bincode::Options;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Cursor, Read};

use crate::error::{Result, TallyError};
use crate::rlwe::{Ciphertext, PublicKeyBundle};

/// Envelope magic bytes
pub const MAGIC: [u8; 4] = *b"CKTL";

/// Current envelope version
pub const VERSION: u8 = 1;

/// Header size in bytes
pub const HEADER_LEN: usize = 12;

/// Largest payload accepted (64 MiB)
pub const MAX_PAYLOAD_LEN: usize = 64 << 20;

/// What an envelope carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireKind {
    /// [`PublicKeyBundle`]
    PublicKeyBundle = 1,
    /// [`Ciphertext`]
    Ciphertext = 2,
}

impl WireKind {
    fn from_u8(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::PublicKeyBundle),
            2 => Some(Self::Ciphertext),
            _ => None,
        }
    }
}

/// Values that travel inside an envelope
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Kind byte written to the header
    const KIND: WireKind;
}

impl WireMessage for Ciphertext {
    const KIND: WireKind = WireKind::Ciphertext;
}

impl WireMessage for PublicKeyBundle {
    const KIND: WireKind = WireKind::PublicKeyBundle;
}

fn bincode_options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .with_limit(limit)
        .reject_trailing_bytes()
}

/// Serialize `value` into an envelope
pub fn to_bytes<T: WireMessage>(value: &T) -> Result<Vec<u8>> {
    let payload = bincode_options(MAX_PAYLOAD_LEN as u64).serialize(value)?;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.write_u8(VERSION)?;
    out.write_u8(T::KIND as u8)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(payload.len() as u32)?;
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse an envelope holding a `T`
pub fn from_bytes<T: WireMessage>(bytes: &[u8]) -> Result<T> {
    let mut cursor = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    cursor
        .read_exact(&mut magic)
        .map_err(|_| malformed("envelope shorter than its header"))?;
    if magic != MAGIC {
        return Err(malformed("bad magic"));
    }

    let version = cursor.read_u8()?;
    if version != VERSION {
        return Err(TallyError::Serialization(format!(
            "unsupported envelope version {}",
            version
        )));
    }

    let kind = cursor.read_u8()?;
    match WireKind::from_u8(kind) {
        Some(k) if k == T::KIND => {}
        Some(k) => {
            return Err(TallyError::Serialization(format!(
                "envelope holds {:?}, expected {:?}",
                k,
                T::KIND
            )))
        }
        None => {
            return Err(TallyError::Serialization(format!(
                "unknown payload kind {}",
                kind
            )))
        }
    }

    if cursor.read_u16::<LittleEndian>()? != 0 {
        return Err(malformed("reserved header bits set"));
    }

    let len = cursor.read_u32::<LittleEndian>()? as usize;
    if len > MAX_PAYLOAD_LEN {
        return Err(TallyError::Serialization(format!(
            "payload of {} bytes exceeds the {} byte limit",
            len, MAX_PAYLOAD_LEN
        )));
    }
    let payload = &bytes[HEADER_LEN..];
    if payload.len() != len {
        return Err(TallyError::Serialization(format!(
            "header declares {} payload bytes, found {}",
            len,
            payload.len()
        )));
    }

    Ok(bincode_options(len as u64).deserialize(payload)?)
}

/// Envelope rendered as standard base64
pub fn to_base64<T: WireMessage>(value: &T) -> Result<String> {
    Ok(encode_base64(&to_bytes(value)?))
}

/// Parse a standard-base64 envelope
pub fn from_base64<T: WireMessage>(text: &str) -> Result<T> {
    from_bytes(&decode_base64(text)?)
}

/// Standard base64 with padding
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode standard base64; surrounding whitespace is ignored
pub fn decode_base64(text: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(text.trim())?)
}

fn malformed(msg: &str) -> TallyError {
    TallyError::Serialization(msg.to_string())
}
