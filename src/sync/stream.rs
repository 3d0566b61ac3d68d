use std::io::{self, BufRead, BufReader, Read};

use crate::error::Result;
use crate::protocol::codec::payload_len;

/// Buffered inbound byte stream framed into backend messages.
pub struct Stream<S> {
    reader: BufReader<S>,
}

impl<S: Read> Stream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            reader: BufReader::new(inner),
        }
    }

    /// Read a message header: type byte and payload length.
    pub fn read_header(&mut self) -> Result<(u8, usize)> {
        let mut header = [0u8; 5];
        self.reader.read_exact(&mut header)?;
        let [type_byte, l0, l1, l2, l3] = header;
        let len = payload_len(type_byte, u32::from_be_bytes([l0, l1, l2, l3]))?;
        Ok((type_byte, len))
    }

    /// Read `len` payload bytes into `buf`, replacing its contents.
    pub fn read_payload(&mut self, buf: &mut Vec<u8>, len: usize) -> Result<()> {
        buf.clear();
        buf.resize(len, 0);
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Skip `len` payload bytes.
    pub fn discard(&mut self, len: usize) -> Result<()> {
        let mut left = len;
        while left > 0 {
            let available = self.reader.fill_buf()?.len();
            if available == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            let n = available.min(left);
            self.reader.consume(n);
            left -= n;
        }
        Ok(())
    }

    pub fn get_ref(&self) -> &S {
        self.reader.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}
