//! Section lookup in ELF images, enough to find `.rodata`.
//!
//! Malformed or truncated headers yield `None`; callers then fall back to
//! scanning the whole file.

use std::ops::Range;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const CLASS_32: u8 = 1;
const CLASS_64: u8 = 2;
const DATA_LSB: u8 = 1;
const DATA_MSB: u8 = 2;
const SHT_NOBITS: u32 = 8;

#[derive(Debug, Clone, Copy)]
struct Layout {
    wide: bool,
    big_endian: bool,
}

impl Layout {
    fn u16_at(&self, bytes: &[u8], off: usize) -> Option<u16> {
        let raw: [u8; 2] = bytes.get(off..off.checked_add(2)?)?.try_into().ok()?;
        Some(if self.big_endian {
            u16::from_be_bytes(raw)
        } else {
            u16::from_le_bytes(raw)
        })
    }

    fn u32_at(&self, bytes: &[u8], off: usize) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(off..off.checked_add(4)?)?.try_into().ok()?;
        Some(if self.big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        })
    }

    fn u64_at(&self, bytes: &[u8], off: usize) -> Option<u64> {
        let raw: [u8; 8] = bytes.get(off..off.checked_add(8)?)?.try_into().ok()?;
        Some(if self.big_endian {
            u64::from_be_bytes(raw)
        } else {
            u64::from_le_bytes(raw)
        })
    }

    /// Address-sized field: 8 bytes in ELF64, 4 in ELF32.
    fn word_at(&self, bytes: &[u8], off: usize) -> Option<usize> {
        if self.wide {
            usize::try_from(self.u64_at(bytes, off)?).ok()
        } else {
            Some(self.u32_at(bytes, off)? as usize)
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SectionHeader {
    name: u32,
    kind: u32,
    offset: usize,
    size: usize,
}

pub fn is_elf(bytes: &[u8]) -> bool {
    bytes.starts_with(ELF_MAGIC)
}

/// File byte range of the named section, if `bytes` is an ELF image that
/// has it.
pub fn section_range(bytes: &[u8], wanted: &str) -> Option<Range<usize>> {
    if !is_elf(bytes) {
        return None;
    }
    let layout = Layout {
        wide: match *bytes.get(4)? {
            CLASS_32 => false,
            CLASS_64 => true,
            _ => return None,
        },
        big_endian: match *bytes.get(5)? {
            DATA_LSB => false,
            DATA_MSB => true,
            _ => return None,
        },
    };

    let (shoff, shentsize, shnum, shstrndx) = if layout.wide {
        (
            layout.word_at(bytes, 0x28)?,
            layout.u16_at(bytes, 0x3A)?,
            layout.u16_at(bytes, 0x3C)?,
            layout.u16_at(bytes, 0x3E)?,
        )
    } else {
        (
            layout.word_at(bytes, 0x20)?,
            layout.u16_at(bytes, 0x2E)?,
            layout.u16_at(bytes, 0x30)?,
            layout.u16_at(bytes, 0x32)?,
        )
    };
    if shoff == 0 || shnum == 0 {
        return None;
    }

    let header = |index: u16| -> Option<SectionHeader> {
        let base = shoff.checked_add(index as usize * shentsize as usize)?;
        let at = |delta: usize| base.checked_add(delta);
        let (offset, size) = if layout.wide {
            (layout.word_at(bytes, at(24)?)?, layout.word_at(bytes, at(32)?)?)
        } else {
            (layout.word_at(bytes, at(16)?)?, layout.word_at(bytes, at(20)?)?)
        };
        Some(SectionHeader {
            name: layout.u32_at(bytes, base)?,
            kind: layout.u32_at(bytes, at(4)?)?,
            offset,
            size,
        })
    };

    let names = header(shstrndx)?;
    let names = bytes.get(names.offset..names.offset.checked_add(names.size)?)?;

    (0..shnum).filter_map(header).find_map(|section| {
        let name = names.get(section.name as usize..)?;
        let name = &name[..name.iter().position(|&b| b == 0)?];
        if name != wanted.as_bytes() || section.kind == SHT_NOBITS {
            return None;
        }
        let end = section.offset.checked_add(section.size)?;
        (end <= bytes.len()).then_some(section.offset..end)
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_rodata_in_elf64() {
        let image = fixtures::elf64_with_rodata(b"hello rodata\0", b"\x90\x90\x90");
        let range = section_range(&image, ".rodata").unwrap();
        assert_eq!(&image[range], b"hello rodata\0");
        assert!(section_range(&image, ".data").is_none());
    }

    #[test]
    fn non_elf_and_truncated_inputs_yield_none() {
        assert!(section_range(b"not an elf file at all", ".rodata").is_none());
        assert!(section_range(b"\x7fELF\x02\x01", ".rodata").is_none());

        let image = fixtures::elf64_with_rodata(b"abc\0", b"");
        assert!(section_range(&image[..image.len() - 10], ".rodata").is_none());
    }

    #[test]
    fn section_table_offset_near_usize_max_yields_none() {
        let mut image = fixtures::elf64_with_rodata(b"abc\0", b"");
        image[0x28..0x30].copy_from_slice(&(u64::MAX - 20).to_le_bytes());
        image[0x3E..0x40].copy_from_slice(&0u16.to_le_bytes());
        assert!(section_range(&image, ".rodata").is_none());

        image[0x28..0x30].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(section_range(&image, ".rodata").is_none());
    }
}
