//! Pluggable byte-stream compression for encoded scenes.

use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// A byte-stream encoder/decoder pair.
///
/// Both directions append to `dst`.
pub trait Codec: Send + Sync {
    fn encode(&self, dst: &mut Vec<u8>, src: &[u8]) -> io::Result<()>;
    fn decode(&self, dst: &mut Vec<u8>, src: &[u8]) -> io::Result<()>;
}

/// Pass-through codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Codec for Identity {
    fn encode(&self, dst: &mut Vec<u8>, src: &[u8]) -> io::Result<()> {
        dst.extend_from_slice(src);
        Ok(())
    }

    fn decode(&self, dst: &mut Vec<u8>, src: &[u8]) -> io::Result<()> {
        dst.extend_from_slice(src);
        Ok(())
    }
}

/// Raw deflate stream.
#[derive(Debug, Clone, Copy)]
pub struct Deflate {
    level: u32,
}

impl Deflate {
    /// `level` ranges from 0 (store) to 9 (best).
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for Deflate {
    fn default() -> Self {
        Self::new(Compression::fast().level())
    }
}

impl Codec for Deflate {
    fn encode(&self, dst: &mut Vec<u8>, src: &[u8]) -> io::Result<()> {
        let mut encoder = DeflateEncoder::new(dst, Compression::new(self.level));
        encoder.write_all(src)?;
        encoder.finish()?;
        Ok(())
    }

    fn decode(&self, dst: &mut Vec<u8>, src: &[u8]) -> io::Result<()> {
        DeflateDecoder::new(src).read_to_end(dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> Vec<u8> {
        (0..4096u32).flat_map(|i| (i % 17).to_le_bytes()).collect()
    }

    #[rstest]
    #[case::identity(Box::new(Identity) as Box<dyn Codec>)]
    #[case::deflate_fast(Box::new(Deflate::default()) as Box<dyn Codec>)]
    #[case::deflate_best(Box::new(Deflate::new(9)) as Box<dyn Codec>)]
    fn decode_restores_input(#[case] codec: Box<dyn Codec>) {
        let src = sample();
        let mut packed = Vec::new();
        codec.encode(&mut packed, &src).unwrap();
        let mut unpacked = Vec::new();
        codec.decode(&mut unpacked, &packed).unwrap();
        assert_eq!(unpacked, src);
    }

    #[test]
    fn deflate_shrinks_repetitive_data() {
        let src = sample();
        let mut packed = Vec::new();
        Deflate::default().encode(&mut packed, &src).unwrap();
        assert!(packed.len() < src.len() / 4);
    }

    #[test]
    fn encode_appends() {
        let mut dst = vec![1, 2];
        Identity.encode(&mut dst, &[3]).unwrap();
        assert_eq!(dst, vec![1, 2, 3]);
    }

    #[test]
    fn corrupt_deflate_stream_fails() {
        let mut out = Vec::new();
        assert!(Deflate::default().decode(&mut out, &[0xff; 16]).is_err());
    }
}
