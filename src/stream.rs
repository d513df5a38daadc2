// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Sources of random data for the battery.
//!
//! A stream is opened before reading and closed afterwards. Reads return
//! `None` once the source cannot deliver any more data, and from then on
//! [`RandomStream::is_open`] reports false. Opening a stream again starts it
//! over from the beginning, which several tests rely on when they make one
//! pass per bit offset.

use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, warn};

use crate::rngs::RNG;

/// A source of bytes, 32 bit and 64 bit words.
/// Words are assembled from bytes in big endian order.
pub trait RandomStream: Send {
    /// Open (or reopen) the stream at its start.
    fn open(&mut self) -> bool;
    /// Close the stream. Returns false if it was not open.
    fn close(&mut self) -> bool;
    fn is_open(&self) -> bool;
    /// Read one byte, `None` once the stream is exhausted or failed.
    fn read_byte(&mut self) -> Option<u8>;

    fn read_u32(&mut self) -> Option<u32> {
        let mut word: u32 = 0;
        for _ in 0..4 {
            word = (word << 8) | self.read_byte()? as u32;
        }
        Some(word)
    }

    fn read_u64(&mut self) -> Option<u64> {
        let high = self.read_u32()? as u64;
        let low = self.read_u32()? as u64;
        Some((high << 32) | low)
    }
}

/// Replays a fixed buffer of bytes.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    data: Arc<[u8]>,
    position: usize,
    open: bool,
}

impl MemoryStream {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        MemoryStream {
            data: data.into(),
            position: 0,
            open: false,
        }
    }
}

impl RandomStream for MemoryStream {
    fn open(&mut self) -> bool {
        self.position = 0;
        self.open = true;
        true
    }

    fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.open {
            return None;
        }
        match self.data.get(self.position) {
            Some(&byte) => {
                self.position += 1;
                Some(byte)
            }
            None => {
                self.open = false;
                None
            }
        }
    }
}

/// Reads random data from a file.
#[derive(Debug)]
pub struct FileStream {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl FileStream {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileStream {
            path: path.as_ref().to_path_buf(),
            reader: None,
        }
    }
}

impl RandomStream for FileStream {
    fn open(&mut self) -> bool {
        match File::open(&self.path) {
            Ok(file) => {
                debug!("opened {}", self.path.display());
                self.reader = Some(BufReader::new(file));
                true
            }
            Err(err) => {
                warn!("cannot open {}: {err}", self.path.display());
                self.reader = None;
                false
            }
        }
    }

    fn close(&mut self) -> bool {
        self.reader.take().is_some()
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn read_byte(&mut self) -> Option<u8> {
        let reader = self.reader.as_mut()?;
        let mut buf = [0u8; 1];
        match reader.read_exact(&mut buf) {
            Ok(()) => Some(buf[0]),
            Err(err) => {
                if err.kind() != ErrorKind::UnexpectedEof {
                    warn!("read from {} failed: {err}", self.path.display());
                }
                self.reader = None;
                None
            }
        }
    }
}

/// Draws bytes from a seeded generator, optionally bounded in length.
/// Reopening reseeds the generator so every pass sees the same data.
pub struct RngStream<R: RNG> {
    rng: R,
    seed: u64,
    limit: Option<usize>,
    produced: usize,
    buffer: [u8; 8],
    buffered: usize,
    open: bool,
}

impl<R: RNG> RngStream<R> {
    pub fn new(seed: u64, limit: Option<usize>) -> Self {
        RngStream {
            rng: R::new(seed),
            seed,
            limit,
            produced: 0,
            buffer: [0; 8],
            buffered: 0,
            open: false,
        }
    }
}

impl<R: RNG + Send> RandomStream for RngStream<R> {
    fn open(&mut self) -> bool {
        self.rng.reseed(self.seed);
        self.produced = 0;
        self.buffered = 0;
        self.open = true;
        true
    }

    fn close(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_byte(&mut self) -> Option<u8> {
        if !self.open {
            return None;
        }
        if self.limit.is_some_and(|limit| self.produced >= limit) {
            self.open = false;
            return None;
        }
        if self.buffered == 0 {
            self.buffer = self.rng.next().to_be_bytes();
            self.buffered = self.buffer.len();
        }
        let byte = self.buffer[self.buffer.len() - self.buffered];
        self.buffered -= 1;
        self.produced += 1;
        Some(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rngs::ReferenceRand;
    use std::io::Write;

    #[test]
    fn memory_stream_words_are_big_endian() {
        let mut s = MemoryStream::new(vec![0x01, 0x02, 0x03, 0x04, 0xff, 0xff, 0xff, 0xff]);
        assert!(s.open());
        assert_eq!(s.read_u32(), Some(0x0102_0304));
        // All ones is data, not an end marker.
        assert_eq!(s.read_u32(), Some(u32::MAX));
        assert!(s.is_open());
        assert_eq!(s.read_byte(), None);
        assert!(!s.is_open());
    }

    #[test]
    fn memory_stream_reopen_replays() {
        let mut s = MemoryStream::new(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        s.open();
        assert_eq!(s.read_u64(), Some(0x0102_0304_0506_0708));
        assert_eq!(s.read_u32(), None);
        assert!(!s.is_open());
        s.open();
        assert_eq!(s.read_byte(), Some(1));
    }

    #[test]
    fn closed_stream_yields_nothing() {
        let mut s = MemoryStream::new(vec![7u8; 4]);
        assert_eq!(s.read_byte(), None);
        s.open();
        assert!(s.close());
        assert!(!s.close());
        assert_eq!(s.read_byte(), None);
    }

    #[test]
    fn rng_stream_respects_limit_and_replays() {
        let mut s: RngStream<ReferenceRand> = RngStream::new(3, Some(10));
        s.open();
        let first: Vec<u8> = std::iter::from_fn(|| s.read_byte()).collect();
        assert_eq!(first.len(), 10);
        assert!(!s.is_open());
        s.open();
        let second: Vec<u8> = std::iter::from_fn(|| s.read_byte()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn file_stream_reads_until_eof() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0xde, 0xad, 0xbe, 0xef, 0x42]).unwrap();
        file.flush().unwrap();

        let mut s = FileStream::new(file.path());
        assert!(s.open());
        assert_eq!(s.read_u32(), Some(0xdead_beef));
        assert_eq!(s.read_byte(), Some(0x42));
        assert_eq!(s.read_byte(), None);
        assert!(!s.is_open());
        assert!(s.open());
        assert_eq!(s.read_byte(), Some(0xde));
    }

    #[test]
    fn missing_file_does_not_open() {
        let mut s = FileStream::new("/nonexistent/randbattery/input.bin");
        assert!(!s.open());
        assert!(!s.is_open());
        assert_eq!(s.read_byte(), None);
    }
}
