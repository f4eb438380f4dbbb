//! Yaz0 codec.
//!
//! A Yaz0 stream is a 16 byte header (`"Yaz0"`, big-endian decompressed
//! size, 8 reserved bytes) followed by groups of up to eight chunks. Each
//! group starts with a flag byte read MSB first: a set bit copies one literal
//! byte, a clear bit is a back-reference into the data decoded so far.

use crate::core::detect::read_magic;
use crate::domain::model::{Format, YAZ0_MAGIC};
use crate::utils::error::{Result, SzsError};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

pub const HEADER_LEN: usize = 16;
pub const MAX_DISTANCE: usize = 0x1000;
pub const MIN_MATCH: usize = 3;
pub const MAX_MATCH: usize = 0xFF + 0x12;

const HASH_BITS: u32 = 15;
const MAX_CHAIN: usize = 256;
const NO_POSITION: usize = usize::MAX;

enum Chunk {
    Literal,
    BackReference,
    End,
}

/// Streaming Yaz0 decoder.
///
/// The inner reader is read one byte at a time, so wrap unbuffered sources
/// in a [`BufReader`].
pub struct Yaz0Reader<R> {
    inner: R,
    size: usize,
    output: Vec<u8>,
    copy_from: usize,
    copy_len: usize,
    group: u8,
    group_len: u8,
}

impl<R: Read> Yaz0Reader<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let mut header = [0u8; HEADER_LEN];
        inner.read_exact(&mut header)?;
        if read_magic(&header)? != YAZ0_MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid Yaz0 magic"));
        }
        let size = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
        tracing::debug!("Yaz0 stream with {} decompressed bytes", size);

        Ok(Self {
            inner,
            size,
            // The header size is untrusted, grow towards it instead of reserving it up front
            output: Vec::with_capacity(size.min(1 << 20)),
            copy_from: 0,
            copy_len: 0,
            group: 0,
            group_len: 0,
        })
    }

    pub fn uncompressed_size(&self) -> usize {
        self.size
    }

    /// Bytes still to be produced.
    pub fn remaining(&self) -> usize {
        self.size - self.output.len()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn expect_byte(&mut self, what: &str) -> io::Result<u8> {
        self.read_byte()?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, format!("expected {}", what)))
    }

    fn next_chunk(&mut self) -> io::Result<Chunk> {
        if self.group_len == 0 {
            match self.read_byte()? {
                Some(group) => {
                    self.group = group;
                    self.group_len = 8;
                }
                None => return Ok(Chunk::End),
            }
        }
        self.group_len -= 1;
        let literal = self.group & 0x80 != 0;
        self.group <<= 1;
        if literal {
            return Ok(Chunk::Literal);
        }

        let byte1 = self.expect_byte("byte 1 of back-reference")?;
        let byte2 = self.expect_byte("byte 2 of back-reference")?;
        let distance = ((((byte1 & 0x0F) as usize) << 8) | byte2 as usize) + 1;
        let position = self.output.len();
        if distance > position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("back-reference distance {} exceeds {} decoded bytes", distance, position),
            ));
        }
        let length = match byte1 >> 4 {
            0 => self.expect_byte("byte 3 of back-reference")? as usize + 0x12,
            nibble => nibble as usize + 2,
        };
        if position + length > self.size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("copy of {} bytes at {} overruns {}", length, position, self.size),
            ));
        }
        self.copy_from = position - distance;
        self.copy_len = length;
        Ok(Chunk::BackReference)
    }
}

impl<R: Read> Read for Yaz0Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.output.len();
        let end = start + buf.len().min(self.remaining());
        while self.output.len() < end {
            if self.copy_len > 0 {
                let count = self.copy_len.min(end - self.output.len());
                // Byte by byte: source and destination may overlap
                for _ in 0..count {
                    let byte = self.output[self.copy_from];
                    self.output.push(byte);
                    self.copy_from += 1;
                }
                self.copy_len -= count;
                continue;
            }
            match self.next_chunk()? {
                Chunk::Literal => {
                    let byte = self.expect_byte("literal byte")?;
                    self.output.push(byte);
                }
                Chunk::BackReference => {}
                Chunk::End => break,
            }
        }
        let produced = &self.output[start..];
        buf[..produced.len()].copy_from_slice(produced);
        Ok(produced.len())
    }
}

impl Yaz0Reader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

fn map_decode_error(error: io::Error) -> SzsError {
    match error.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => {
            SzsError::corrupt(Format::Yaz0, error.to_string())
        }
        _ => SzsError::IoError(error),
    }
}

/// Decodes a Yaz0 stream, requiring the full declared size.
pub fn decompress_reader<R: Read>(reader: R) -> Result<Vec<u8>> {
    let mut decoder = Yaz0Reader::new(reader).map_err(map_decode_error)?;
    let mut output = Vec::with_capacity(decoder.uncompressed_size().min(1 << 24));
    decoder.read_to_end(&mut output).map_err(map_decode_error)?;
    if output.len() < decoder.uncompressed_size() {
        return Err(SzsError::Truncated {
            format: Format::Yaz0,
            expected: decoder.uncompressed_size() as u64,
            actual: output.len() as u64,
        });
    }
    Ok(output)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let magic = read_magic(data)?;
    if magic != YAZ0_MAGIC {
        return Err(SzsError::InvalidMagic {
            format: Format::Yaz0,
            found: magic,
        });
    }
    decompress_reader(data)
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with(data, MAX_DISTANCE)
}

/// Encodes `data`, searching back-references at most `window` bytes back
/// (clamped to 1..=4096).
pub fn compress_with(data: &[u8], window: usize) -> Result<Vec<u8>> {
    let size = u32::try_from(data.len()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "Yaz0 input must be smaller than 4 GiB")
    })?;
    let window = window.clamp(1, MAX_DISTANCE);

    let mut out = Vec::with_capacity(HEADER_LEN + data.len() + data.len() / 8 + 1);
    out.extend_from_slice(&YAZ0_MAGIC.to_be_bytes());
    out.extend_from_slice(&size.to_be_bytes());
    out.extend_from_slice(&[0u8; 8]);

    let mut matcher = MatchFinder::new(data, window);
    let mut pos = 0;
    while pos < data.len() {
        let flags_at = out.len();
        out.push(0);
        let mut flags = 0u8;
        for bit in 0..8 {
            if pos >= data.len() {
                break;
            }
            let (distance, length) = matcher.longest_match(pos);
            if length >= MIN_MATCH {
                let d = distance - 1;
                if length >= 0x12 {
                    out.push((d >> 8) as u8);
                    out.push(d as u8);
                    out.push((length - 0x12) as u8);
                } else {
                    out.push((((length - 2) << 4) | (d >> 8)) as u8);
                    out.push(d as u8);
                }
                for p in pos..pos + length {
                    matcher.insert(p);
                }
                pos += length;
            } else {
                flags |= 0x80 >> bit;
                out.push(data[pos]);
                matcher.insert(pos);
                pos += 1;
            }
        }
        out[flags_at] = flags;
    }
    tracing::debug!("Yaz0 compressed {} bytes into {}", data.len(), out.len());
    Ok(out)
}

/// Hash chains over 3-byte prefixes.
struct MatchFinder<'a> {
    data: &'a [u8],
    window: usize,
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl<'a> MatchFinder<'a> {
    fn new(data: &'a [u8], window: usize) -> Self {
        Self {
            data,
            window,
            head: vec![NO_POSITION; 1 << HASH_BITS],
            prev: vec![NO_POSITION; data.len()],
        }
    }

    fn hash(&self, pos: usize) -> Option<usize> {
        let bytes = self.data.get(pos..pos + MIN_MATCH)?;
        let value = (bytes[0] as u32) << 16 | (bytes[1] as u32) << 8 | bytes[2] as u32;
        Some((value.wrapping_mul(0x9E37_79B1) >> (32 - HASH_BITS)) as usize)
    }

    fn insert(&mut self, pos: usize) {
        if let Some(hash) = self.hash(pos) {
            self.prev[pos] = self.head[hash];
            self.head[hash] = pos;
        }
    }

    fn longest_match(&self, pos: usize) -> (usize, usize) {
        let max_len = MAX_MATCH.min(self.data.len() - pos);
        let Some(hash) = self.hash(pos) else {
            return (0, 0);
        };

        let mut best = (0, 0);
        let mut candidate = self.head[hash];
        let mut probes = 0;
        while candidate != NO_POSITION && pos - candidate <= self.window && probes < MAX_CHAIN {
            let mut len = 0;
            while len < max_len && self.data[candidate + len] == self.data[pos + len] {
                len += 1;
            }
            if len > best.1 {
                best = (pos - candidate, len);
                if len == max_len {
                    break;
                }
            }
            candidate = self.prev[candidate];
            probes += 1;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header(size: u32) -> Vec<u8> {
        let mut data = b"Yaz0".to_vec();
        data.extend_from_slice(&size.to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        data
    }

    #[test]
    fn test_literals_only() {
        let mut data = header(3);
        data.extend_from_slice(&[0xE0, b'a', b'b', b'c']);
        assert_eq!(decompress(&data).unwrap(), b"abc");
    }

    #[test]
    fn test_short_back_reference_overlaps() {
        // "ab" then copy 6 bytes from distance 2
        let mut data = header(8);
        data.extend_from_slice(&[0xC0, b'a', b'b', 0x40, 0x01]);
        assert_eq!(decompress(&data).unwrap(), b"abababab");
    }

    #[test]
    fn test_long_back_reference() {
        // one literal then a three-byte chunk copying 0x12 + 2 bytes at distance 1
        let mut data = header(21);
        data.extend_from_slice(&[0x80, b'z', 0x00, 0x00, 0x02]);
        assert_eq!(decompress(&data).unwrap(), vec![b'z'; 21]);
    }

    #[test]
    fn test_small_reads_match_bulk_decode() {
        let mut data = header(8);
        data.extend_from_slice(&[0xC0, b'a', b'b', 0x40, 0x01]);
        let mut reader = Yaz0Reader::new(data.as_slice()).unwrap();
        assert_eq!(reader.uncompressed_size(), 8);
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = reader.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"abababab");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_invalid_magic() {
        let err = decompress(b"Yaz1\0\0\0\0\0\0\0\0\0\0\0\0").unwrap_err();
        assert!(matches!(err, SzsError::InvalidMagic { format: Format::Yaz0, .. }));
        assert!(Yaz0Reader::new(&b"Nope\0\0\0\0\0\0\0\0\0\0\0\0"[..]).is_err());
    }

    #[test]
    fn test_distance_before_start_is_rejected() {
        let mut data = header(4);
        data.extend_from_slice(&[0x00, 0x10, 0x00]);
        assert!(matches!(decompress(&data), Err(SzsError::CorruptData { .. })));
    }

    #[test]
    fn test_copy_past_declared_size_is_rejected() {
        let mut data = header(4);
        data.extend_from_slice(&[0x80, b'a', 0xF0, 0x00]);
        assert!(matches!(decompress(&data), Err(SzsError::CorruptData { .. })));
    }

    #[test]
    fn test_missing_literal_is_rejected() {
        let mut data = header(2);
        data.extend_from_slice(&[0xC0, b'a']);
        assert!(matches!(decompress(&data), Err(SzsError::CorruptData { .. })));
    }

    #[test]
    fn test_end_at_group_boundary_is_truncation() {
        let mut data = header(10);
        data.push(0xFF);
        data.extend_from_slice(b"abcdefgh");
        let mut reader = Yaz0Reader::new(data.as_slice()).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdefgh");
        assert!(matches!(
            decompress(&data),
            Err(SzsError::Truncated { expected: 10, actual: 8, .. })
        ));
    }

    #[test]
    fn test_compress_uses_back_references() {
        let input = b"the quick brown fox, the quick brown fox, the quick brown fox".repeat(4);
        let packed = compress(&input).unwrap();
        assert!(packed.len() < input.len());
        assert_eq!(&packed[..4], b"Yaz0");
        assert_eq!(decompress(&packed).unwrap(), input);
    }

    #[test]
    fn test_compress_empty() {
        let packed = compress(&[]).unwrap();
        assert_eq!(packed.len(), HEADER_LEN);
        assert!(decompress(&packed).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_compress_then_decompress_restores_input(
            input in proptest::collection::vec(prop_oneof![Just(0u8), Just(1u8), any::<u8>()], 0..2048),
            window in 1usize..=MAX_DISTANCE,
        ) {
            let packed = compress_with(&input, window).unwrap();
            prop_assert_eq!(decompress(&packed).unwrap(), input);
        }
    }
}
