// wire.rs — big-endian primitives for the binary protocol

use thiserror::Error;

/// A read ran past the end of the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read past end of record")]
pub struct ShortRead;

// ============================================================
// Writers — append to a growable buffer
// ============================================================

pub fn put_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

pub fn put_i8(buf: &mut Vec<u8>, v: i8) {
    buf.push(v as u8);
}

pub fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

// ============================================================
// WireReader — cursor over a received record
// ============================================================

/// Bounds-checked read cursor over a received byte slice.
pub struct WireReader<'a> {
    data: &'a [u8],
    readcount: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, readcount: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.readcount
    }

    pub fn read_u8(&mut self) -> Result<u8, ShortRead> {
        let b = *self.data.get(self.readcount).ok_or(ShortRead)?;
        self.readcount += 1;
        Ok(b)
    }

    pub fn read_i8(&mut self) -> Result<i8, ShortRead> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u32(&mut self) -> Result<u32, ShortRead> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, ShortRead> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ShortRead> {
        if self.remaining() < n {
            return Err(ShortRead);
        }
        let s = &self.data[self.readcount..self.readcount + n];
        self.readcount += n;
        Ok(s)
    }

    /// Consume and return everything left in the record.
    pub fn rest(&mut self) -> &'a [u8] {
        let s = &self.data[self.readcount..];
        self.readcount = self.data.len();
        s
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_primitives_big_endian() {
        let mut buf = Vec::new();
        put_u8(&mut buf, 0xab);
        put_i8(&mut buf, -1);
        put_u32(&mut buf, 0x01020304);
        put_u64(&mut buf, 0x0102030405060708);
        assert_eq!(
            buf,
            [0xab, 0xff, 1, 2, 3, 4, 1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn read_back_what_was_written() {
        let mut buf = Vec::new();
        put_u64(&mut buf, u64::MAX - 5);
        put_i8(&mut buf, -1);
        put_u32(&mut buf, 42);
        let mut r = WireReader::new(&buf);
        assert_eq!(r.read_u64(), Ok(u64::MAX - 5));
        assert_eq!(r.read_i8(), Ok(-1));
        assert_eq!(r.read_u32(), Ok(42));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn read_past_end_fails() {
        let mut r = WireReader::new(&[1, 2, 3]);
        assert_eq!(r.read_u32(), Err(ShortRead));
        // a failed read consumes nothing
        assert_eq!(r.remaining(), 3);
        assert_eq!(r.read_u8(), Ok(1));
    }

    #[test]
    fn rest_consumes_remainder() {
        let mut r = WireReader::new(&[9, 8, 7, 6]);
        assert_eq!(r.read_u8(), Ok(9));
        assert_eq!(r.rest(), &[8, 7, 6]);
        assert_eq!(r.remaining(), 0);
        assert_eq!(r.rest(), &[] as &[u8]);
    }

    #[test]
    fn read_bytes_exact() {
        let mut r = WireReader::new(&[1, 2, 3]);
        assert_eq!(r.read_bytes(3), Ok(&[1u8, 2, 3][..]));
        assert_eq!(r.read_bytes(1), Err(ShortRead));
    }
}
