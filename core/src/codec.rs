//! Posting-list integer codecs.
//!
//! Sequences handed to [`Codec::encode`] are ascending doc ids or positions.
//! `VarByte` stores the first value followed by successive gaps, each written
//! with 7 data bits per byte and the high bit set on every byte but the last.
//! `Generic` runs the varbyte bytes through zstd. [`Codec::encode_counts`] is
//! the same without the gap transform, for values that are not ordered.

use crate::config::Compression;
use crate::error::{IndexError, Result};
use byteorder::{ByteOrder, LittleEndian};

const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    compression: Compression,
}

impl Codec {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Encode a strictly increasing sequence.
    pub fn encode(&self, values: &[u32]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(encode_fixed(values)),
            Compression::VarByte => encode_gaps(values),
            Compression::Generic => compress(&encode_gaps(values)?),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<u32>> {
        match self.compression {
            Compression::None => decode_fixed(bytes),
            Compression::VarByte => decode_gaps(bytes),
            Compression::Generic => decode_gaps(&decompress(bytes)?),
        }
    }

    /// Encode values with no ordering requirement (term frequencies).
    pub fn encode_counts(&self, values: &[u32]) -> Result<Vec<u8>> {
        match self.compression {
            Compression::None => Ok(encode_fixed(values)),
            Compression::VarByte => Ok(encode_varints(values)),
            Compression::Generic => compress(&encode_varints(values)),
        }
    }

    pub fn decode_counts(&self, bytes: &[u8]) -> Result<Vec<u32>> {
        match self.compression {
            Compression::None => decode_fixed(bytes),
            Compression::VarByte => decode_varints(bytes),
            Compression::Generic => decode_varints(&decompress(bytes)?),
        }
    }
}

fn encode_fixed(values: &[u32]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * 4];
    LittleEndian::write_u32_into(values, &mut out);
    out
}

fn decode_fixed(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(IndexError::codec(format!(
            "fixed-width stream of {} bytes is not a multiple of 4",
            bytes.len()
        )));
    }
    let mut out = vec![0u32; bytes.len() / 4];
    LittleEndian::read_u32_into(bytes, &mut out);
    Ok(out)
}

/// Append one variable-byte encoded integer.
pub fn write_varint(value: u32, out: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let mut byte = (v & 0x7F) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if v == 0 {
            break;
        }
    }
}

/// Read one variable-byte encoded integer starting at `*pos`.
pub fn read_varint(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    loop {
        let Some(&byte) = bytes.get(*pos) else {
            return Err(IndexError::codec(format!("truncated varint at byte {}", *pos)));
        };
        *pos += 1;
        let payload = (byte & 0x7F) as u32;
        // The fifth byte may only carry the top four bits of a u32.
        if shift == 28 && payload > 0x0F {
            return Err(IndexError::codec("varint overflows u32"));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 28 {
            return Err(IndexError::codec("varint longer than 5 bytes"));
        }
    }
}

fn encode_varints(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len());
    for &v in values {
        write_varint(v, &mut out);
    }
    out
}

fn decode_varints(bytes: &[u8]) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        out.push(read_varint(bytes, &mut pos)?);
    }
    Ok(out)
}

fn encode_gaps(values: &[u32]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<u32> = None;
    for &v in values {
        let gap = match prev {
            None => v,
            Some(p) if v > p => v - p,
            Some(p) => {
                return Err(IndexError::codec(format!(
                    "gap encoding needs a strictly increasing sequence, saw {v} after {p}"
                )))
            }
        };
        write_varint(gap, &mut out);
        prev = Some(v);
    }
    Ok(out)
}

fn decode_gaps(bytes: &[u8]) -> Result<Vec<u32>> {
    let mut out = Vec::new();
    let mut pos = 0;
    let mut acc: Option<u32> = None;
    while pos < bytes.len() {
        let gap = read_varint(bytes, &mut pos)?;
        let value = match acc {
            None => gap,
            Some(prev) => prev
                .checked_add(gap)
                .ok_or_else(|| IndexError::codec("decoded value overflows u32"))?,
        };
        out.push(value);
        acc = Some(value);
    }
    Ok(out)
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    zstd::stream::encode_all(bytes, ZSTD_LEVEL).map_err(|e| IndexError::codec(format!("zstd compress: {e}")))
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    zstd::stream::decode_all(bytes).map_err(|e| IndexError::codec(format!("zstd decompress: {e}")))
}
