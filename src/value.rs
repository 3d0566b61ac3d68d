//! Column value decoding.
//!
//! A [`RowBuffer`](crate::row::RowBuffer) hands each column's raw bytes, type OID and
//! format code to a [`FromWireValue`] implementation. A target type that is not wired
//! to a column's OID reports [`Error::Unsupported`]; bytes that do not parse as the
//! expected type report [`Error::Decode`].

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::protocol::types::{Oid, oid};

/// Trait for decoding PostgreSQL values into Rust types.
///
/// - `from_null()` - Handle NULL values
/// - `from_text()` - Decode from text format
/// - `from_binary()` - Decode from binary format
pub trait FromWireValue<'a>: Sized {
    /// Decode from NULL value.
    ///
    /// Default implementation returns an error. Override for types that can
    /// represent NULL (like `Option<T>`).
    fn from_null() -> Result<Self> {
        Err(Error::Decode("unexpected NULL value".into()))
    }

    /// Decode from text format bytes.
    fn from_text(oid: Oid, bytes: &'a [u8]) -> Result<Self>;

    /// Decode from binary format bytes.
    ///
    /// Integers are big-endian, floats are IEEE 754.
    fn from_binary(oid: Oid, bytes: &'a [u8]) -> Result<Self>;
}

impl<'a, T: FromWireValue<'a>> FromWireValue<'a> for Option<T> {
    fn from_null() -> Result<Self> {
        Ok(None)
    }

    fn from_text(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        T::from_text(oid, bytes).map(Some)
    }

    fn from_binary(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        T::from_binary(oid, bytes).map(Some)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    simdutf8::compat::from_utf8(bytes).map_err(|e| Error::Decode(format!("invalid UTF-8: {}", e)))
}

fn parse_text<T: FromStr>(bytes: &[u8], target: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    utf8(bytes)?
        .parse()
        .map_err(|e| Error::Decode(format!("invalid {}: {}", target, e)))
}

fn be_array<const N: usize>(bytes: &[u8], target: &str) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| Error::Decode(format!("invalid {} length: {}", target, bytes.len())))
}

// === Boolean ===

impl FromWireValue<'_> for bool {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BOOL {
            return Err(Error::unsupported_oid(oid, "bool"));
        }
        match bytes {
            b"t" | b"true" | b"TRUE" | b"T" | b"1" => Ok(true),
            b"f" | b"false" | b"FALSE" | b"F" | b"0" => Ok(false),
            _ => Err(Error::Decode(format!(
                "invalid boolean: {:?}",
                String::from_utf8_lossy(bytes)
            ))),
        }
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BOOL {
            return Err(Error::unsupported_oid(oid, "bool"));
        }
        let [b] = be_array::<1>(bytes, "boolean")?;
        Ok(b != 0)
    }
}

// === Integer types ===

impl FromWireValue<'_> for i16 {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::INT2 {
            return Err(Error::unsupported_oid(oid, "i16"));
        }
        parse_text(bytes, "i16")
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::INT2 {
            return Err(Error::unsupported_oid(oid, "i16"));
        }
        Ok(i16::from_be_bytes(be_array(bytes, "i16")?))
    }
}

impl FromWireValue<'_> for i32 {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if !matches!(oid, oid::INT2 | oid::INT4) {
            return Err(Error::unsupported_oid(oid, "i32"));
        }
        parse_text(bytes, "i32")
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        match oid {
            oid::INT2 => Ok(i16::from_be_bytes(be_array(bytes, "i16")?) as i32),
            oid::INT4 => Ok(i32::from_be_bytes(be_array(bytes, "i32")?)),
            _ => Err(Error::unsupported_oid(oid, "i32")),
        }
    }
}

impl FromWireValue<'_> for i64 {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if !matches!(oid, oid::INT2 | oid::INT4 | oid::INT8 | oid::OID) {
            return Err(Error::unsupported_oid(oid, "i64"));
        }
        parse_text(bytes, "i64")
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        match oid {
            oid::INT2 => Ok(i16::from_be_bytes(be_array(bytes, "i16")?) as i64),
            oid::INT4 => Ok(i32::from_be_bytes(be_array(bytes, "i32")?) as i64),
            oid::OID => Ok(u32::from_be_bytes(be_array(bytes, "oid")?) as i64),
            oid::INT8 => Ok(i64::from_be_bytes(be_array(bytes, "i64")?)),
            _ => Err(Error::unsupported_oid(oid, "i64")),
        }
    }
}

// === Floating point ===

impl FromWireValue<'_> for f32 {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::FLOAT4 {
            return Err(Error::unsupported_oid(oid, "f32"));
        }
        parse_text(bytes, "f32")
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::FLOAT4 {
            return Err(Error::unsupported_oid(oid, "f32"));
        }
        Ok(f32::from_be_bytes(be_array(bytes, "f32")?))
    }
}

impl FromWireValue<'_> for f64 {
    /// Text NUMERIC values are accepted and rounded to the nearest `f64`.
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if !matches!(oid, oid::FLOAT4 | oid::FLOAT8 | oid::NUMERIC) {
            return Err(Error::unsupported_oid(oid, "f64"));
        }
        parse_text(bytes, "f64")
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        match oid {
            oid::FLOAT4 => Ok(f32::from_be_bytes(be_array(bytes, "f32")?) as f64),
            oid::FLOAT8 => Ok(f64::from_be_bytes(be_array(bytes, "f64")?)),
            _ => Err(Error::unsupported_oid(oid, "f64")),
        }
    }
}

// === Strings ===

fn is_textual(oid: Oid) -> bool {
    matches!(
        oid,
        oid::TEXT
            | oid::VARCHAR
            | oid::BPCHAR
            | oid::NAME
            | oid::CHAR
            | oid::UNKNOWN
            | oid::JSON
            | oid::JSONB
    )
}

impl<'a> FromWireValue<'a> for &'a str {
    fn from_text(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        if !is_textual(oid) {
            return Err(Error::unsupported_oid(oid, "str"));
        }
        utf8(bytes)
    }

    fn from_binary(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        match oid {
            // Binary jsonb carries a one-byte format version before the text
            oid::JSONB => match bytes.split_first() {
                Some((&1, rest)) => utf8(rest),
                Some((version, _)) => Err(Error::Decode(format!(
                    "unsupported jsonb version: {}",
                    version
                ))),
                None => Err(Error::Decode("empty jsonb value".into())),
            },
            _ if is_textual(oid) => utf8(bytes),
            _ => Err(Error::unsupported_oid(oid, "str")),
        }
    }
}

impl FromWireValue<'_> for String {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        <&str>::from_text(oid, bytes).map(str::to_owned)
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        <&str>::from_binary(oid, bytes).map(str::to_owned)
    }
}

// === Bytes ===

impl<'a> FromWireValue<'a> for &'a [u8] {
    /// Text format yields the bytes as sent (`\x` hex form for bytea).
    fn from_text(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        if oid != oid::BYTEA {
            return Err(Error::unsupported_oid(oid, "bytes"));
        }
        Ok(bytes)
    }

    fn from_binary(oid: Oid, bytes: &'a [u8]) -> Result<Self> {
        if oid != oid::BYTEA {
            return Err(Error::unsupported_oid(oid, "bytes"));
        }
        Ok(bytes)
    }
}

impl FromWireValue<'_> for Vec<u8> {
    fn from_text(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BYTEA {
            return Err(Error::unsupported_oid(oid, "Vec<u8>"));
        }
        // Text format for bytea is hex-encoded: \xDEADBEEF
        match bytes.strip_prefix(b"\\x") {
            Some(hex) => decode_hex(hex),
            None => Ok(bytes.to_vec()),
        }
    }

    fn from_binary(oid: Oid, bytes: &[u8]) -> Result<Self> {
        if oid != oid::BYTEA {
            return Err(Error::unsupported_oid(oid, "Vec<u8>"));
        }
        Ok(bytes.to_vec())
    }
}

fn decode_hex(hex: &[u8]) -> Result<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(Error::Decode("invalid hex length".into()));
    }
    hex.chunks_exact(2)
        .map(|pair| Ok((hex_digit(pair[0])? << 4) | hex_digit(pair[1])?))
        .collect()
}

fn hex_digit(b: u8) -> Result<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(Error::Decode(format!("invalid hex digit: {}", b as char))),
    }
}
