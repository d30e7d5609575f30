//! Big-endian cursor over an in-memory class file.

/// Reads fixed-width big-endian values and raw byte runs, advancing an
/// internal cursor by exactly the number of bytes consumed.
///
/// Every read panics when the buffer is exhausted; callers validate the
/// class-file magic before walking the structure.
#[derive(Debug, Clone)]
pub struct ClassReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn read_u32(&mut self) -> u32 {
        let raw = self.read_bytes(4);
        u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]])
    }

    pub fn read_u16(&mut self) -> u16 {
        let raw = self.read_bytes(2);
        u16::from_be_bytes([raw[0], raw[1]])
    }

    pub fn read_u8(&mut self) -> u8 {
        self.read_bytes(1)[0]
    }

    /// # Panics
    ///
    /// Panics if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> &'a [u8] {
        let remaining = self.remaining();
        assert!(
            len <= remaining,
            "class file truncated: need {len} bytes at offset {}, {remaining} left",
            self.pos
        );
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        slice
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_and_advances_cursor() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0x07, b'a', b'b', b'c'];
        let mut reader = ClassReader::new(&bytes);

        assert_eq!(reader.read_u32(), 0xCAFE_BABE);
        assert_eq!(reader.read_u16(), 0x0034);
        assert_eq!(reader.read_u8(), 0x07);
        assert_eq!(reader.position(), 7);
        assert_eq!(reader.read_bytes(2), b"ab");
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_bytes(0), b"");
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    #[should_panic(expected = "class file truncated")]
    fn underrun_panics() {
        let mut reader = ClassReader::new(&[0x01]);
        reader.read_u16();
    }
}
