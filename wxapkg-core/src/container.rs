//! Container parser (C3): the `.wxapkg` file-index format.
//!
//! Layout (big-endian throughout, §3):
//! `u8 first_mark | u32 info1 | u32 index_len | u32 body_len | u8 last_mark
//!  | u32 entry_count | entry[entry_count]`
//! where each entry is `u32 name_len | bytes name | u32 offset | u32 size`.

use binrw::{binrw, BinRead};
use std::io::Cursor;

use crate::error::{Result, WxapkgError};
use crate::model::{ArchiveEntry, Container};

pub const FIRST_MARK: u8 = 0xBE;
pub const LAST_MARK: u8 = 0xED;
pub const MAX_NAME_LEN: u32 = 10 * 1024 * 1024;

#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy)]
struct Header {
    first_mark: u8,
    /// Observed but unused (§9 open question).
    #[allow(dead_code)]
    info1: u32,
    #[allow(dead_code)]
    index_len: u32,
    #[allow(dead_code)]
    body_len: u32,
    last_mark: u8,
    entry_count: u32,
}

/// C3: parse a decrypted plaintext buffer into its file index.
///
/// Entry offsets returned are absolute within `plaintext`. The plaintext
/// buffer is moved into the returned [`Container`] so callers (the
/// extractor) can take read-only slices without copying.
pub fn parse(plaintext: Vec<u8>) -> Result<Container> {
    let mut cursor = Cursor::new(plaintext.as_slice());
    let header = Header::read(&mut cursor).map_err(|_| WxapkgError::Truncated("container header"))?;

    if header.first_mark != FIRST_MARK || header.last_mark != LAST_MARK {
        return Err(WxapkgError::BadMarks {
            first_mark: header.first_mark,
            last_mark: header.last_mark,
        });
    }

    let mut entries = Vec::with_capacity(header.entry_count as usize);
    for _ in 0..header.entry_count {
        let name_len = read_u32(&mut cursor)?;
        if name_len > MAX_NAME_LEN {
            return Err(WxapkgError::NameTooLong(name_len));
        }

        let name_bytes = read_bytes(&mut cursor, name_len as usize)?;
        let name = String::from_utf8(name_bytes).map_err(|_| WxapkgError::InvalidEntryName)?;

        let offset = read_u32(&mut cursor)?;
        let size = read_u32(&mut cursor)?;

        let end = offset as u64 + size as u64;
        if end > plaintext.len() as u64 {
            return Err(WxapkgError::EntryOutOfBounds {
                name,
                end,
                len: plaintext.len(),
            });
        }

        entries.push(ArchiveEntry { name, offset, size });
    }

    Ok(Container { entries, plaintext })
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32> {
    <u32 as BinRead>::read_options(cursor, binrw::Endian::Big, ())
        .map_err(|_| WxapkgError::Truncated("entry field"))
}

fn read_bytes(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>> {
    use std::io::Read;
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| WxapkgError::Truncated("entry name"))?;
    Ok(buf)
}
