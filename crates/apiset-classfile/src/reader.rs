use crate::error::{Error, Result};

/// Big-endian cursor over classfile bytes.
pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    pub(crate) fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::UnexpectedEof);
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.bytes[start..start + len])
    }

    pub(crate) fn read_u1(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_u2(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn read_u4(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u64> {
        let b = self.read_bytes(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub(crate) fn ensure_empty(&self, what: &'static str) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::TrailingBytes(what));
        }
        Ok(())
    }
}

/// Growable big-endian output buffer, the write-side twin of [`Reader`].
#[derive(Default)]
pub(crate) struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn u1(&mut self, v: u8) {
        self.bytes.push(v);
    }

    pub(crate) fn u2(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn u4(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn u8(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub(crate) fn bytes(&mut self, v: &[u8]) {
        self.bytes.extend_from_slice(v);
    }

    /// Writes a `u2` element count, failing when it does not fit.
    pub(crate) fn len_u2(&mut self, len: usize, what: &'static str) -> Result<()> {
        let len = u16::try_from(len).map_err(|_| Error::TooLarge(what))?;
        self.u2(len);
        Ok(())
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_values() {
        let mut r = Reader::new(&[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0x07]);
        assert_eq!(r.read_u4().unwrap(), 0xCAFEBABE);
        assert_eq!(r.read_u2().unwrap(), 52);
        assert_eq!(r.read_u1().unwrap(), 7);
        assert_eq!(r.read_u1(), Err(Error::UnexpectedEof));
    }

    #[test]
    fn writer_round_trips_through_reader() {
        let mut w = Writer::new();
        w.u2(0x1234);
        w.u8(u64::MAX - 1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u2().unwrap(), 0x1234);
        assert_eq!(r.read_u8().unwrap(), u64::MAX - 1);
        r.ensure_empty("test").unwrap();
    }
}
