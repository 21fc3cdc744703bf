//! Code object sizing.
//!
//! `hipModuleLoadData` receives a bare pointer; the byte count to ship is
//! recovered from the image's own header.

use hipremote_client::{ClientError, Result, Status};
use hipremote_wire::DEFAULT_MAX_PAYLOAD;

const ELF_MAGIC: &[u8; 4] = b"\x7fELF";
const ELF_CLASS_64: u8 = 2;
const ELF64_HEADER_SIZE: usize = 64;

const BUNDLE_MAGIC: &[u8; 24] = b"__CLANG_OFFLOAD_BUNDLE__";
const BUNDLE_MAX_ENTRIES: u64 = 256;
const BUNDLE_MAX_TRIPLE: u64 = 4096;

/// Room for the load request body next to the image.
const MAX_IMAGE: u64 = (DEFAULT_MAX_PAYLOAD - 64) as u64;

/// Reads `buf.len()` bytes at an offset into the image.
pub(crate) trait ImageSource {
    fn read(&self, offset: usize, buf: &mut [u8]);
}

impl ImageSource for [u8] {
    fn read(&self, offset: usize, buf: &mut [u8]) {
        let end = (offset + buf.len()).min(self.len());
        let available = end.saturating_sub(offset);
        buf[..available].copy_from_slice(&self[offset.min(end)..end]);
        buf[available..].fill(0);
    }
}

/// Image starting at a raw pointer, read only where its header points.
pub(crate) struct RawImage(pub *const u8);

impl ImageSource for RawImage {
    fn read(&self, offset: usize, buf: &mut [u8]) {
        // SAFETY: `hipModuleLoadData` callers hand over a complete image;
        // offsets come from its header and are bounded by `MAX_IMAGE`.
        unsafe { std::ptr::copy_nonoverlapping(self.0.add(offset), buf.as_mut_ptr(), buf.len()) };
    }
}

fn read_u16(image: &(impl ImageSource + ?Sized), offset: usize) -> u64 {
    let mut buf = [0u8; 2];
    image.read(offset, &mut buf);
    u64::from(u16::from_le_bytes(buf))
}

fn read_u64(image: &(impl ImageSource + ?Sized), offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    image.read(offset, &mut buf);
    u64::from_le_bytes(buf)
}

fn invalid_image(reason: &str) -> ClientError {
    tracing::warn!(reason, "rejecting code object");
    ClientError::Api(Status::INVALID_IMAGE)
}

/// Total byte length of an ELF64 object or a clang offload bundle.
pub(crate) fn image_size(image: &(impl ImageSource + ?Sized)) -> Result<usize> {
    let mut magic = [0u8; 24];
    image.read(0, &mut magic);

    let size = if magic.starts_with(ELF_MAGIC) {
        if magic[4] != ELF_CLASS_64 {
            return Err(invalid_image("not a 64-bit ELF object"));
        }
        elf_size(image)?
    } else if &magic == BUNDLE_MAGIC {
        bundle_size(image)?
    } else {
        return Err(invalid_image("unrecognized code object format"));
    };

    if size < ELF64_HEADER_SIZE as u64 || size > MAX_IMAGE {
        return Err(invalid_image("implausible code object size"));
    }
    Ok(size as usize)
}

fn elf_size(image: &(impl ImageSource + ?Sized)) -> Result<u64> {
    let extent = |offset: u64, count: u64, entry: u64| {
        count
            .checked_mul(entry)
            .and_then(|len| offset.checked_add(len))
            .ok_or_else(|| invalid_image("ELF table extent overflows"))
    };
    let program = extent(read_u64(image, 32), read_u16(image, 56), read_u16(image, 54))?;
    let sections = extent(read_u64(image, 40), read_u16(image, 60), read_u16(image, 58))?;
    Ok(program.max(sections).max(ELF64_HEADER_SIZE as u64))
}

fn bundle_size(image: &(impl ImageSource + ?Sized)) -> Result<u64> {
    let entries = read_u64(image, 24);
    if entries == 0 || entries > BUNDLE_MAX_ENTRIES {
        return Err(invalid_image("bad offload bundle entry count"));
    }

    let mut cursor = 32u64;
    let mut end = cursor;
    for _ in 0..entries {
        if cursor > MAX_IMAGE {
            return Err(invalid_image("offload bundle header runs past limit"));
        }
        let at = cursor as usize;
        let offset = read_u64(image, at);
        let size = read_u64(image, at + 8);
        let triple = read_u64(image, at + 16);
        if triple > BUNDLE_MAX_TRIPLE {
            return Err(invalid_image("bad offload bundle triple length"));
        }
        let entry_end = offset
            .checked_add(size)
            .ok_or_else(|| invalid_image("offload bundle entry overflows"))?;
        cursor += 24 + triple;
        end = end.max(entry_end).max(cursor);
    }
    Ok(end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elf(shoff: u64, shnum: u16, shentsize: u16) -> Vec<u8> {
        let mut image = vec![0u8; 64];
        image[..4].copy_from_slice(ELF_MAGIC);
        image[4] = ELF_CLASS_64;
        image[40..48].copy_from_slice(&shoff.to_le_bytes());
        image[58..60].copy_from_slice(&shentsize.to_le_bytes());
        image[60..62].copy_from_slice(&shnum.to_le_bytes());
        image
    }

    #[test]
    fn elf_size_ends_at_section_table() {
        let image = elf(0x1000, 12, 64);
        assert_eq!(image_size(&image[..]).unwrap(), 0x1000 + 12 * 64);
    }

    #[test]
    fn elf32_is_rejected() {
        let mut image = elf(0x1000, 1, 64);
        image[4] = 1;
        assert_eq!(
            image_size(&image[..]).unwrap_err().status(),
            Status::INVALID_IMAGE
        );
    }

    #[test]
    fn bundle_size_covers_furthest_entry() {
        let mut image = BUNDLE_MAGIC.to_vec();
        image.extend_from_slice(&2u64.to_le_bytes());
        for (offset, size, triple) in [(0x200u64, 0x80u64, "host-x86_64"), (0x1000, 0x400, "hipv4-amdgcn")] {
            image.extend_from_slice(&offset.to_le_bytes());
            image.extend_from_slice(&size.to_le_bytes());
            image.extend_from_slice(&(triple.len() as u64).to_le_bytes());
            image.extend_from_slice(triple.as_bytes());
        }
        assert_eq!(image_size(&image[..]).unwrap(), 0x1400);
    }

    #[test]
    fn unknown_format_is_not_guessed() {
        let image = [0xAAu8; 128];
        assert_eq!(
            image_size(&image[..]).unwrap_err().status(),
            Status::INVALID_IMAGE
        );
    }

    #[test]
    fn oversized_claim_is_rejected() {
        let image = elf(u64::from(u32::MAX), 1, 64);
        assert!(image_size(&image[..]).is_err());
    }
}
