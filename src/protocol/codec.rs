//! PostgreSQL wire protocol encoding and decoding primitives.
//!
//! PostgreSQL uses big-endian (network byte order) for all integers.

use crate::error::{Error, Result};

#[inline]
fn read_array<'a, const N: usize>(data: &'a [u8], what: &str) -> Result<([u8; N], &'a [u8])> {
    let (head, rest) = data.split_first_chunk::<N>().ok_or_else(|| {
        Error::Protocol(format!(
            "{}: buffer too short: {} < {}",
            what,
            data.len(),
            N
        ))
    })?;
    Ok((*head, rest))
}

/// Read 2-byte big-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (bytes, rest) = read_array::<2>(data, "read_u16")?;
    Ok((u16::from_be_bytes(bytes), rest))
}

/// Read 4-byte big-endian signed integer.
#[inline]
pub fn read_i32(data: &[u8]) -> Result<(i32, &[u8])> {
    let (bytes, rest) = read_array::<4>(data, "read_i32")?;
    Ok((i32::from_be_bytes(bytes), rest))
}

/// Read 4-byte big-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (bytes, rest) = read_array::<4>(data, "read_u32")?;
    Ok((u32::from_be_bytes(bytes), rest))
}

/// Read null-terminated string (PostgreSQL String type).
/// Returns the string bytes (without the null terminator) and remaining data.
#[inline]
pub fn read_cstring(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(pos) => Ok((&data[..pos], &data[pos + 1..])),
        None => Err(Error::Protocol(
            "read_cstring: no null terminator found".into(),
        )),
    }
}

/// Read null-terminated string as &str.
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_cstring(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Largest message the server may send (1 GiB).
pub const MAX_MESSAGE_LEN: usize = 1 << 30;

/// Validate the length word of a message header and return the payload length.
///
/// The length word counts itself but not the type byte.
pub fn payload_len(type_byte: u8, length: u32) -> Result<usize> {
    let length = length as usize;
    if !(4..=MAX_MESSAGE_LEN).contains(&length) {
        return Err(Error::Protocol(format!(
            "Invalid message length {} for message '{}'",
            length, type_byte as char
        )));
    }
    Ok(length - 4)
}

/// Write null-terminated string from &str.
#[inline]
pub fn write_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Message builder helper that handles the length field.
///
/// PostgreSQL message format:
/// - Type byte (1 byte) - NOT included in length
/// - Length (4 bytes) - includes itself
/// - Payload (Length - 4 bytes)
pub struct MessageBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> MessageBuilder<'a> {
    /// Start building a message with a type byte.
    pub fn new(buf: &'a mut Vec<u8>, type_byte: u8) -> Self {
        buf.push(type_byte);
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]); // Placeholder for length
        Self { buf, start }
    }

    /// Write a u8.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write an i16.
    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a u16.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write an i32.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a u32.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Write null-terminated string.
    pub fn write_cstr(&mut self, s: &str) {
        write_cstr(self.buf, s);
    }

    /// Finish building the message and fill in the length field.
    pub fn finish(self) {
        let len = (self.buf.len() - self.start) as i32;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reads_are_protocol_errors() {
        assert!(matches!(read_i32(&[0, 1]), Err(Error::Protocol(_))));
        assert!(matches!(read_u16(&[]), Err(Error::Protocol(_))));
        assert!(matches!(read_cstr(b"no terminator"), Err(Error::Protocol(_))));
    }

    #[test]
    fn reads_advance_through_buffer() {
        let data = [0xff, 0xff, 0xff, 0xff, 0x00, 0x02, b'o', b'k', 0, 7];
        let (len, rest) = read_i32(&data).unwrap();
        assert_eq!(len, -1);
        let (n, rest) = read_u16(rest).unwrap();
        assert_eq!(n, 2);
        let (s, rest) = read_cstr(rest).unwrap();
        assert_eq!(s, "ok");
        assert_eq!(rest, &[7]);
    }

    #[test]
    fn payload_len_bounds() {
        assert_eq!(payload_len(b'Z', 5).unwrap(), 1);
        assert_eq!(payload_len(b'I', 4).unwrap(), 0);
        assert!(payload_len(b'C', 3).is_err());
        assert!(payload_len(b'D', u32::MAX).is_err());
    }

    #[test]
    fn builder_fills_length() {
        let mut buf = Vec::new();
        let mut msg = MessageBuilder::new(&mut buf, b'C');
        msg.write_cstr("SELECT 1");
        msg.finish();
        assert_eq!(buf[0], b'C');
        assert_eq!(i32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]), 13);
        assert_eq!(&buf[5..], b"SELECT 1\0");
    }
}
