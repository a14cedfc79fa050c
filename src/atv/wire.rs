// Minimal protobuf encoding for the remote protocol messages. Only varint and
// length-delimited fields are produced; fixed-width fields are skipped when
// decoding.
//
// Every message on the wire is prefixed with its length as a varint.

use std::io;
use std::io::{Read, Write};

const MAX_FRAME_SIZE: usize = 64 * 1024;
const MAX_VARINT_BYTES: usize = 10;
const MAX_LENGTH_BYTES: u32 = 4;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum WireError {
    #[error("Message is truncated")]
    Truncated,
    #[error("Unsupported wire type {0}")]
    UnsupportedWireType(u8),
}

impl From<WireError> for io::Error {
    fn from(err: WireError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, err)
    }
}

#[derive(Debug, PartialEq)]
pub enum Value<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
}

impl<'a> Value<'a> {
    pub fn as_varint(&self) -> Option<u64> {
        match self {
            Value::Varint(v) => Some(*v),
            Value::Bytes(_) => None,
        }
    }
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self {
            Value::Varint(_) => None,
            Value::Bytes(b) => Some(*b),
        }
    }
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

pub fn read_varint(bytes: &[u8], cursor: &mut usize) -> Option<u64> {
    let mut value = 0u64;
    for shift in 0..MAX_VARINT_BYTES {
        let byte = *bytes.get(*cursor)?;
        *cursor += 1;
        value |= u64::from(byte & 0x7f) << (shift * 7);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

pub fn write_varint_field(out: &mut Vec<u8>, field_number: u32, value: u64) {
    write_varint(out, u64::from(field_number) << 3);
    write_varint(out, value);
}

pub fn write_bytes_field(out: &mut Vec<u8>, field_number: u32, value: &[u8]) {
    write_varint(out, (u64::from(field_number) << 3) | 2);
    write_varint(out, value.len() as u64);
    out.extend_from_slice(value);
}

pub fn write_string_field(out: &mut Vec<u8>, field_number: u32, value: &str) {
    write_bytes_field(out, field_number, value.as_bytes());
}

/// Splits one message into its top-level fields, in wire order.
pub fn fields(bytes: &[u8]) -> Result<Vec<(u32, Value<'_>)>, WireError> {
    let mut cursor = 0usize;
    let mut out = vec![];
    while cursor < bytes.len() {
        let key = read_varint(bytes, &mut cursor).ok_or(WireError::Truncated)?;
        let field_number = (key >> 3) as u32;
        match (key & 0x07) as u8 {
            0 => {
                let value = read_varint(bytes, &mut cursor).ok_or(WireError::Truncated)?;
                out.push((field_number, Value::Varint(value)));
            }
            1 => cursor = skip(bytes, cursor, 8)?,
            2 => {
                let len = read_varint(bytes, &mut cursor).ok_or(WireError::Truncated)? as usize;
                let end = skip(bytes, cursor, len)?;
                out.push((field_number, Value::Bytes(&bytes[cursor..end])));
                cursor = end;
            }
            5 => cursor = skip(bytes, cursor, 4)?,
            wire_type => return Err(WireError::UnsupportedWireType(wire_type)),
        }
    }
    Ok(out)
}

fn skip(bytes: &[u8], cursor: usize, len: usize) -> Result<usize, WireError> {
    match cursor.checked_add(len) {
        Some(end) if end <= bytes.len() => Ok(end),
        _ => Err(WireError::Truncated),
    }
}

pub fn write_frame(w: &mut impl Write, message: &[u8]) -> io::Result<()> {
    let mut frame = Vec::with_capacity(message.len() + 2);
    write_varint(&mut frame, message.len() as u64);
    frame.extend_from_slice(message);
    w.write_all(&frame)?;
    w.flush()
}

pub fn read_frame(r: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut len = 0u64;
    let mut byte = [0u8; 1];
    let mut shift = 0;
    loop {
        r.read_exact(&mut byte)?;
        len |= u64::from(byte[0] & 0x7f) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 7 * MAX_LENGTH_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "frame length is not a valid varint",
            ));
        }
    }
    let len = len as usize;
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes is too large"),
        ));
    }
    let mut message = vec![0; len];
    r.read_exact(&mut message)?;
    Ok(message)
}
