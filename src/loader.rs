//! Parses a K27 byte stream into header fields, a label table, and an
//! instruction body, and installs the latter two into an [`Mmu`].

use std::io::Read;

use crc32fast::Hasher;
use log::{debug, warn};

use crate::error::{KL27Error, Result};
use crate::memory::{Mmu, LABEL_TABLE_START, PROGRAM_START};

const MAGIC: &[u8; 4] = b"KL27";
const SUPPORTED_VERSION: u8 = 1;
const RAW_COMPRESSION: u8 = 0;
const LZMA_COMPRESSION: u8 = 1;
const MIN_STACK_SIZE: u8 = 4;
const RESERVED_PADDING_LEN: usize = 5;
const TABLE_TERMINATOR_LEN: usize = 5;
const LABEL_RECORD_ON_DISK_LEN: usize = 4;

/// The fixed-size portion of a K27 file, parsed verbatim from the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub compression: u8,
    pub body_offset: u32,
    pub stack_size: u8,
    pub checksum: [u8; 4],
    pub label_count: u16,
}

/// The loader's parse result, prior to installation into an [`Mmu`].
///
/// Kept as a named type (rather than installed immediately) so loader tests
/// can assert on header fields without constructing a full CPU.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub header: Header,
    pub label_table: Vec<u8>,
    pub instruction_body: Vec<u8>,
}

impl LoadedImage {
    /// The program-counter value a CPU should start at after installing
    /// this image: the entry point, offset into the program region.
    pub fn entry_pc(&self) -> u32 {
        PROGRAM_START + self.header.body_offset
    }

    /// Copies the label table and instruction body into `mmu` at their
    /// fixed offsets (`0x00100` and `0x01000` respectively).
    pub fn install(&self, mmu: &mut Mmu) -> Result<()> {
        mmu.write_bytes(LABEL_TABLE_START, &self.label_table)?;
        mmu.write_bytes(PROGRAM_START, &self.instruction_body)?;
        Ok(())
    }
}

fn read_exact_vec<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)
        .map_err(|_| KL27Error::BadFile("unexpected end of file"))?;
    Ok(buf)
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    Ok(read_exact_vec(r, 1)?[0])
}

fn read_u16_be<R: Read>(r: &mut R) -> Result<u16> {
    let b = read_exact_vec(r, 2)?;
    Ok(u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32_be<R: Read>(r: &mut R) -> Result<u32> {
    let b = read_exact_vec(r, 4)?;
    Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Parses a K27 byte stream into header fields, label table, and
/// instruction body. Does not touch any `Mmu`; call [`LoadedImage::install`]
/// to do that.
pub fn load<R: Read>(mut r: R) -> Result<LoadedImage> {
    match try_load(&mut r) {
        Ok(image) => {
            debug!(
                "loaded K27 image: version={} stack_size={} body_offset={:#06x} labels={} label_bytes={} body_bytes={}",
                image.header.version,
                image.header.stack_size,
                image.header.body_offset,
                image.header.label_count,
                image.label_table.len(),
                image.instruction_body.len(),
            );
            Ok(image)
        }
        Err(e) => {
            warn!("rejected K27 file: {e}");
            Err(e)
        }
    }
}

fn try_load<R: Read>(r: &mut R) -> Result<LoadedImage> {
    let magic = read_exact_vec(r, 4)?;
    if magic.as_slice() != MAGIC {
        return Err(KL27Error::BadMagic);
    }

    let version = read_u8(r)?;
    if version != SUPPORTED_VERSION {
        return Err(KL27Error::BadVersion(version));
    }

    let compression = read_u8(r)?;
    match compression {
        RAW_COMPRESSION => {}
        LZMA_COMPRESSION => return Err(KL27Error::Unsupported(compression)),
        _ => return Err(KL27Error::BadFile("unknown compression mode")),
    }

    let body_offset = read_u32_be(r)?;

    let stack_size = read_u8(r)?;
    if !(MIN_STACK_SIZE..=255).contains(&stack_size) {
        return Err(KL27Error::BadFile("stack_size out of range 4..=255"));
    }

    let checksum_vec = read_exact_vec(r, 4)?;
    let checksum = [checksum_vec[0], checksum_vec[1], checksum_vec[2], checksum_vec[3]];

    let _reserved = read_exact_vec(r, RESERVED_PADDING_LEN)?;

    let label_count = read_u16_be(r)?;

    let label_table = read_exact_vec(r, label_count as usize * LABEL_RECORD_ON_DISK_LEN)?;

    let _terminator = read_exact_vec(r, TABLE_TERMINATOR_LEN)?;

    let mut instruction_body = Vec::new();
    r.read_to_end(&mut instruction_body)
        .map_err(|_| KL27Error::BadFile("failed to read instruction body"))?;

    if checksum != [0, 0, 0, 0] {
        let expected = u32::from_be_bytes(checksum);
        let mut hasher = Hasher::new();
        hasher.update(&instruction_body);
        let computed = hasher.finalize();

        if computed != expected {
            return Err(KL27Error::Checksum { expected, computed });
        }
    }

    Ok(LoadedImage {
        header: Header {
            version,
            compression,
            body_offset,
            stack_size,
            checksum,
            label_count,
        },
        label_table,
        instruction_body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(
        version: u8,
        compression: u8,
        body_offset: u32,
        stack_size: u8,
        checksum: [u8; 4],
        label_count: u16,
        label_table: &[u8],
        body: &[u8],
    ) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(version);
        buf.push(compression);
        buf.extend_from_slice(&body_offset.to_be_bytes());
        buf.push(stack_size);
        buf.extend_from_slice(&checksum);
        buf.extend_from_slice(&[0u8; RESERVED_PADDING_LEN]);
        buf.extend_from_slice(&label_count.to_be_bytes());
        buf.extend_from_slice(label_table);
        buf.extend_from_slice(&[0u8; TABLE_TERMINATOR_LEN]);
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = b"XXXX\x01\x00\x00\x00\x00\x00\x04\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00";
        let err = load(&bytes[..]).unwrap_err();
        assert_eq!(err, KL27Error::BadMagic);
    }

    #[test]
    fn rejects_bad_version() {
        let bytes = header_bytes(2, 0, 0, 4, [0; 4], 0, &[], &[]);
        assert_eq!(load(&bytes[..]).unwrap_err(), KL27Error::BadVersion(2));
    }

    #[test]
    fn rejects_lzma_compression_as_unsupported() {
        let bytes = header_bytes(1, 1, 0, 4, [0; 4], 0, &[], &[]);
        assert_eq!(
            load(&bytes[..]).unwrap_err(),
            KL27Error::Unsupported(1)
        );
    }

    #[test]
    fn rejects_stack_size_out_of_range() {
        let bytes = header_bytes(1, 0, 0, 3, [0; 4], 0, &[], &[]);
        assert!(matches!(load(&bytes[..]), Err(KL27Error::BadFile(_))));
    }

    #[test]
    fn parses_a_minimal_well_formed_file() {
        let body = [0x00u8, 0x01, 0x00, 0x00]; // hlt
        let bytes = header_bytes(1, 0, 0, 4, [0; 4], 0, &[], &body);
        let image = load(&bytes[..]).unwrap();
        assert_eq!(image.header.version, 1);
        assert_eq!(image.header.stack_size, 4);
        assert_eq!(image.instruction_body, body);
        assert_eq!(image.entry_pc(), PROGRAM_START);
    }

    #[test]
    fn copies_label_table_payload_verbatim() {
        let label_table = vec![0xAA, 0xBB, 0xCC, 0xDD];
        let bytes = header_bytes(1, 0, 0, 4, [0; 4], 1, &label_table, &[]);
        let image = load(&bytes[..]).unwrap();
        assert_eq!(image.label_table, label_table);
    }

    #[test]
    fn zero_checksum_skips_verification() {
        let body = [0x00u8, 0x01, 0x00, 0x00];
        let bytes = header_bytes(1, 0, 0, 4, [0, 0, 0, 0], 0, &[], &body);
        assert!(load(&bytes[..]).is_ok());
    }

    #[test]
    fn nonzero_checksum_is_verified() {
        let body = [0x00u8, 0x01, 0x00, 0x00];
        let mut hasher = Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let bytes = header_bytes(1, 0, 0, 4, crc.to_be_bytes(), 0, &[], &body);
        assert!(load(&bytes[..]).is_ok());
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let body = [0x00u8, 0x01, 0x00, 0x00];
        let bytes = header_bytes(1, 0, 0, 4, [0xDE, 0xAD, 0xBE, 0xEF], 0, &[], &body);
        assert!(matches!(
            load(&bytes[..]),
            Err(KL27Error::Checksum { .. })
        ));
    }

    #[test]
    fn install_places_label_table_and_body_at_fixed_offsets() {
        let label_table = vec![0x00, 0x03, 0x00, 0x00];
        let body = [0x00u8, 0x01, 0x00, 0x00];
        let bytes = header_bytes(1, 0, 0, 4, [0; 4], 1, &label_table, &body);
        let image = load(&bytes[..]).unwrap();

        let mut mmu = Mmu::new();
        image.install(&mut mmu).unwrap();

        assert_eq!(mmu.read16(LABEL_TABLE_START).unwrap() as u16, 0x0003);
        assert_eq!(mmu.read16(PROGRAM_START).unwrap() as u16, 0x0001);
    }
}
