use crate::domain::model::Format;
use crate::utils::error::Result;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

/// Reads the big-endian magic from the first four bytes of `bytes`.
pub fn read_magic(bytes: &[u8]) -> io::Result<u32> {
    match bytes.get(..4) {
        Some(head) => Ok(u32::from_be_bytes([head[0], head[1], head[2], head[3]])),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "need 4 bytes to detect the format",
        )),
    }
}

pub fn detect_bytes(bytes: &[u8]) -> Result<Option<Format>> {
    Ok(Format::from_magic(read_magic(bytes)?))
}

/// Consumes four bytes from `reader`.
pub fn detect_reader<R: Read>(mut reader: R) -> Result<Option<Format>> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    Ok(Format::from_magic(u32::from_be_bytes(magic)))
}

/// Detects the format of a stream without losing its head: the returned
/// reader yields the magic again followed by the rest of `reader`. Short
/// reads are retried until four bytes arrive.
pub fn detect_stream<R: Read>(mut reader: R) -> Result<(Option<Format>, io::Chain<Cursor<[u8; 4]>, R>)> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    let format = Format::from_magic(u32::from_be_bytes(magic));
    Ok((format, Cursor::new(magic).chain(reader)))
}

pub fn detect_path<P: AsRef<Path>>(path: P) -> Result<Option<Format>> {
    let file = File::open(path)?;
    detect_reader(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_detect_bytes() {
        assert_eq!(detect_bytes(b"Yaz0\0\0\0\x10").unwrap(), Some(Format::Yaz0));
        assert_eq!(detect_bytes(&[0x55, 0xAA, 0x38, 0x2D]).unwrap(), Some(Format::U8));
        assert_eq!(detect_bytes(b"SARC").unwrap(), Some(Format::Sarc));
        assert_eq!(detect_bytes(b"PK\x03\x04").unwrap(), None);
    }

    #[test]
    fn test_detect_short_input() {
        assert!(detect_bytes(b"Ya").is_err());
        assert!(detect_reader(Cursor::new(b"Ya".to_vec())).is_err());
    }

    /// Hands out at most one byte per read call.
    struct Trickle<R>(R);

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_detect_stream_keeps_the_head() {
        let (format, mut rest) = detect_stream(Cursor::new(b"SARC rest".to_vec())).unwrap();
        assert_eq!(format, Some(Format::Sarc));
        let mut all = Vec::new();
        rest.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"SARC rest");
    }

    #[test]
    fn test_detect_stream_with_short_reads() {
        let (format, mut rest) = detect_stream(Trickle(Cursor::new(b"Yaz0\0\0\0\x10".to_vec()))).unwrap();
        assert_eq!(format, Some(Format::Yaz0));
        let mut all = Vec::new();
        rest.read_to_end(&mut all).unwrap();
        assert_eq!(all, b"Yaz0\0\0\0\x10");

        assert!(detect_stream(Trickle(Cursor::new(b"Ya".to_vec()))).is_err());
    }

    #[test]
    fn test_detect_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Yaz0\0\0\0\0").unwrap();
        assert_eq!(detect_path(file.path()).unwrap(), Some(Format::Yaz0));
    }
}
