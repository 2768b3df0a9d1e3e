//! The `=VS=` archive container (component B).
//!
//! Grounded directly on `Archive::open`/`seekDir`/`readCompressedData` from
//! the reference implementation. An archive is a single file: a directory
//! table near the end indexes opaque per-id chunk streams; each stream is
//! read sequentially as a series of tagged chunks via [`Archive::read_chunk`].

use std::io::{Read, Seek, SeekFrom};

use crate::codec;
use crate::error::FormatError;

const MAGIC: u32 = 0x3d53563d; // "=VS=" little-endian

struct DirEntry {
    offset: u32,
    id: u8,
}

/// Metadata about the most recently read chunk, used by callers that want
/// to re-reference raw archive bytes (lazily-loaded sprite frames) instead
/// of copying them immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkInfo {
    pub src_offset: u64,
    pub src_size: u32,
    pub decompressed_size: u32,
}

/// A `=VS=` archive opened for reading.
pub struct Archive<R> {
    reader: R,
    data_offset: u32,
    directories: Vec<DirEntry>,
    pub last_chunk: ChunkInfo,
}

/// Number of extra bytes a packed int's first byte says are still coming,
/// mirroring [`codec::decode_packed_int`]'s own sizing rules exactly so
/// [`Archive::read_packed_int`] can read precisely that many bytes instead
/// of speculatively over-reading.
fn packed_int_extra_bytes(first: u8) -> usize {
    let num = if first & 0x20 == 0 {
        (first & 0x1f) as usize
    } else {
        1 + ((first >> 2) & 3) as usize
    };
    let skipsz = num.saturating_sub(4);
    num.min(4) + skipsz
}

impl<R: Read + Seek> Archive<R> {
    /// Opens an archive, reading its trailer and directory table.
    ///
    /// Layout from the end of the file: `{u32 dirOffsetDelta; u32 reserved;
    /// u32 magic}` at `size-12`, then the table of contents at
    /// `size-(12+dirOffsetDelta)`: `{u32 dirCount; u32 dataOffset}` followed
    /// by `dirCount` entries of `{u32 offset; u8 id}`.
    pub fn open(mut reader: R) -> Result<Self, FormatError> {
        reader.seek(SeekFrom::End(-12))?;
        let dir_offset_delta = read_u32le(&mut reader)?;
        let _reserved = read_u32le(&mut reader)?;
        let magic = read_u32le(&mut reader)?;

        if magic != MAGIC {
            return Err(FormatError::BadMagic { found: magic });
        }

        // `size-(12+dirOffsetDelta)` is the start of the whole
        // `{dirCount, dataOffset, entries...}` block; reading the two
        // leading u32s sequentially already leaves the reader positioned at
        // the first entry, so no further seek is needed here.
        let dir_offset = 12u64 + dir_offset_delta as u64;
        reader.seek(SeekFrom::End(-(dir_offset as i64)))?;

        let dir_count = read_u32le(&mut reader)? as usize;
        let data_offset = read_u32le(&mut reader)?;

        let mut directories = Vec::with_capacity(dir_count);
        for _ in 0..dir_count {
            let offset = read_u32le(&mut reader)?;
            let id = read_u8(&mut reader)?;
            directories.push(DirEntry { offset, id });
        }

        Ok(Self {
            reader,
            data_offset,
            directories,
            last_chunk: ChunkInfo::default(),
        })
    }

    pub fn dir_count(&self) -> usize {
        self.directories.len()
    }

    fn find_dir(&self, id: u8) -> Option<usize> {
        self.directories.iter().position(|d| d.id == id)
    }

    /// Seeks the underlying reader to the start of directory `id`'s chunk stream.
    pub fn seek_dir(&mut self, id: u8) -> Result<(), FormatError> {
        let idx = self
            .find_dir(id)
            .ok_or(FormatError::DirectoryNotFound { id })?;
        let offset = self.data_offset as u64 + self.directories[idx].offset as u64;
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Reads one packed int from the current stream position.
    pub fn read_packed_int(&mut self) -> Result<i32, FormatError> {
        // Reads exactly as many bytes as the first byte says the encoding
        // needs, so a packed int sitting within 8 bytes of the true stream
        // end never spuriously triggers an EOF error.
        let first = read_u8(&mut self.reader)?;
        let mut buf = [0u8; 9];
        buf[0] = first;
        let mut len = 1usize;
        if first & 0x80 != 0 {
            let extra = packed_int_extra_bytes(first);
            self.reader.read_exact(&mut buf[1..1 + extra])?;
            len += extra;
        }
        let mut pos = 0;
        codec::decode_packed_int(&buf[..len], &mut pos)
    }

    /// Reads a single raw byte from the current stream position. Used by
    /// callers driving their own command dialect over a directory's chunk
    /// stream (the module loader's command bytes are not packed ints or
    /// chunk tags, just plain bytes).
    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        read_u8(&mut self.reader)
    }

    /// Reads `n` raw bytes from the current stream position, advancing past
    /// them without any chunk or packed-int framing.
    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, FormatError> {
        let mut buf = vec![0u8; n];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Seeks to an absolute archive byte offset, e.g. one recorded from a
    /// prior [`ChunkInfo::src_offset`] for a lazily-loaded sprite frame.
    pub fn seek_to(&mut self, offset: u64) -> Result<(), FormatError> {
        self.reader.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Reads one tagged chunk and returns its (possibly decompressed) bytes.
    ///
    /// Tag byte: `bit7==0` is a protocol error (not a chunk); `bit6==1` is a
    /// small literal of `tag & 0x1F` bytes; otherwise `szsize = (tag&3)+1`
    /// bytes hold the source size, and if `tag`'s bits 2..3 are non-zero
    /// another `szsize` bytes hold the decompressed size, triggering LZSS
    /// decompression on read.
    pub fn read_chunk(&mut self) -> Result<Vec<u8>, FormatError> {
        let tag = read_u8(&mut self.reader)?;
        if tag & 0x80 == 0 {
            return Err(FormatError::NotAChunk { tag });
        }

        let mut src_size: u32 = 0;
        let mut decompressed_size: u32 = 0;

        if tag & 0x40 != 0 {
            src_size = (tag & 0x1F) as u32;
        } else {
            let szsize = (tag & 3) + 1;
            for i in 0..szsize {
                src_size |= (read_u8(&mut self.reader)? as u32) << (i << 3);
            }
            if tag & 0xC != 0 {
                for i in 0..szsize {
                    decompressed_size |= (read_u8(&mut self.reader)? as u32) << (i << 3);
                }
            }
        }

        if src_size == 0 {
            self.last_chunk = ChunkInfo::default();
            return Ok(Vec::new());
        }

        let src_offset = seek_pos(&mut self.reader)?;
        let mut raw = vec![0u8; src_size as usize];
        self.reader.read_exact(&mut raw).map_err(|_| FormatError::TruncatedChunk {
            wanted: src_size as usize,
            available: 0,
        })?;

        self.last_chunk = ChunkInfo {
            src_offset,
            src_size,
            decompressed_size,
        };

        if decompressed_size == 0 {
            return Ok(raw);
        }

        let mut out = vec![0u8; decompressed_size as usize];
        codec::decompress(&raw, &mut out)?;
        Ok(out)
    }
}

fn seek_pos<R: Seek>(r: &mut R) -> Result<u64, FormatError> {
    Ok(r.stream_position()?)
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, FormatError> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

fn read_u32le<R: Read>(r: &mut R) -> Result<u32, FormatError> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn empty_archive_bytes() -> Vec<u8> {
        // dirCount=0, dataOffset=0, table is empty (0 entries), trailer
        // dirOffsetDelta=4 (covers just the 8-byte {dirCount,dataOffset}).
        let mut v = vec![0u8; 20];
        v.extend_from_slice(&0u32.to_le_bytes()); // dirCount
        v.extend_from_slice(&0u32.to_le_bytes()); // dataOffset
        v.extend_from_slice(&4u32.to_le_bytes()); // dirOffsetDelta
        v.extend_from_slice(&0u32.to_le_bytes()); // reserved
        v.extend_from_slice(&MAGIC.to_le_bytes());
        v
    }

    #[test]
    fn archive_smoke() {
        let bytes = empty_archive_bytes();
        let mut arc = Archive::open(Cursor::new(bytes)).unwrap();
        assert_eq!(arc.dir_count(), 0);
        assert!(arc.seek_dir(0).is_err());
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = empty_archive_bytes();
        let len = bytes.len();
        bytes[len - 1] = 0; // corrupt the magic
        assert!(Archive::open(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn single_directory_round_trip() {
        let mut v = Vec::new();
        // data region: one literal chunk "hi" (tag 0x40 | 2).
        v.push(0x40 | 2);
        v.extend_from_slice(b"hi");
        let data_offset = 0u32;

        v.extend_from_slice(&1u32.to_le_bytes()); // dirCount
        v.extend_from_slice(&data_offset.to_le_bytes()); // dataOffset
        v.extend_from_slice(&0u32.to_le_bytes()); // entry 0 offset
        v.push(7); // entry 0 id

        let table_and_header_len = 4 + 4 + 5; // dirCount+dataOffset+one entry
        v.extend_from_slice(&(table_and_header_len as u32).to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(&MAGIC.to_le_bytes());

        let mut arc = Archive::open(Cursor::new(v)).unwrap();
        assert_eq!(arc.dir_count(), 1);
        arc.seek_dir(7).unwrap();
        let chunk = arc.read_chunk().unwrap();
        assert_eq!(chunk, b"hi");
    }
}
