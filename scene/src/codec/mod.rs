//! Binary wire format.
//!
//! Every value starts on a 4-byte boundary. Fixed-size values are written as
//! their raw bytes, counts as little-endian `u32`, and variable-length
//! containers as a count followed by their elements. Booleans, byte strings
//! and arrays are zero-padded to the next boundary.
//!
//! [`Reader`] keeps the whole payload in one `Arc<[u8]>` so that decoded
//! arrays become [`SharedVec`] views of it instead of copies.

mod compression;

pub use compression::{Codec, Deflate, Identity};

use std::hash::Hasher;
use std::ops::Range;
use std::sync::Arc;

use bytemuck::Pod;
use meshlink_core::SharedVec;
use rustc_hash::FxHasher;

use crate::error::DecodeError;

const ALIGN: usize = 4;

/// Types with a wire representation.
pub trait Encode {
    fn encode(&self, w: &mut Writer);
}

/// Types that can be read back from the wire.
pub trait Decode: Sized {
    fn decode(r: &mut Reader) -> Result<Self, DecodeError>;
}

/// 64-bit content hash used to validate scene payloads.
pub fn content_hash(bytes: &[u8]) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(bytes);
    hasher.finish()
}

/// Append-only encoder.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn pad(&mut self) {
        let rem = self.buf.len() % ALIGN;
        if rem != 0 {
            self.buf.resize(self.buf.len() + ALIGN - rem, 0);
        }
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.buf.push(v as u8);
        self.pad();
    }

    /// Raw bytes of a fixed-size value.
    pub fn write_pod<T: Pod>(&mut self, v: &T) {
        self.buf.extend_from_slice(bytemuck::bytes_of(v));
        self.pad();
    }

    /// Element count followed by the raw element bytes.
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) {
        self.write_u32(values.len() as u32);
        self.buf.extend_from_slice(bytemuck::cast_slice(values));
        self.pad();
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_slice(s.as_bytes());
    }

    /// Element count followed by each element's own encoding.
    pub fn write_seq<T: Encode>(&mut self, items: &[T]) {
        self.write_u32(items.len() as u32);
        for item in items {
            item.encode(self);
        }
    }

    pub fn write_strings(&mut self, items: &[String]) {
        self.write_u32(items.len() as u32);
        for item in items {
            self.write_str(item);
        }
    }
}

/// Cursor over a shared payload.
#[derive(Debug, Clone)]
pub struct Reader {
    buf: Arc<[u8]>,
    pos: usize,
}

impl Reader {
    pub fn new(buf: Arc<[u8]>) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes from the cursor to the end of the payload.
    pub fn rest(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn take(&mut self, len: usize) -> Result<Range<usize>, DecodeError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DecodeError::UnexpectedEof)?;
        let range = self.pos..end;
        self.pos = end;
        Ok(range)
    }

    fn skip_pad(&mut self) -> Result<(), DecodeError> {
        let rem = self.pos % ALIGN;
        if rem != 0 {
            self.take(ALIGN - rem)?;
        }
        Ok(())
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let range = self.take(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[range]);
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        let [b] = self.read_array::<1>()?;
        self.skip_pad()?;
        Ok(b != 0)
    }

    pub fn read_pod<T: Pod>(&mut self) -> Result<T, DecodeError> {
        let range = self.take(std::mem::size_of::<T>())?;
        let value = bytemuck::pod_read_unaligned(&self.buf[range]);
        self.skip_pad()?;
        Ok(value)
    }

    fn slice_range<T: Pod>(&mut self) -> Result<Range<usize>, DecodeError> {
        let count = self.read_u32()? as usize;
        let len = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(DecodeError::UnexpectedEof)?;
        let range = self.take(len)?;
        self.skip_pad()?;
        Ok(range)
    }

    /// Reads an array without copying it out of the payload.
    pub fn read_shared<T: Pod>(&mut self) -> Result<SharedVec<T>, DecodeError> {
        let range = self.slice_range::<T>()?;
        Ok(SharedVec::from_bytes(self.buf.clone(), range))
    }

    pub fn read_vec<T: Pod>(&mut self) -> Result<Vec<T>, DecodeError> {
        Ok(self.read_shared::<T>()?.into_vec())
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let range = self.slice_range::<u8>()?;
        std::str::from_utf8(&self.buf[range])
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    pub fn read_seq<T: Decode>(&mut self) -> Result<Vec<T>, DecodeError> {
        let count = self.read_u32()? as usize;
        // Every element takes at least one aligned word.
        if count > self.remaining() / ALIGN + 1 {
            return Err(DecodeError::UnexpectedEof);
        }
        (0..count).map(|_| T::decode(self)).collect()
    }

    pub fn read_strings(&mut self) -> Result<Vec<String>, DecodeError> {
        let count = self.read_u32()? as usize;
        if count > self.remaining() / ALIGN + 1 {
            return Err(DecodeError::UnexpectedEof);
        }
        (0..count).map(|_| self.read_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshlink_core::math::Vec3;

    fn reader(w: Writer) -> Reader {
        Reader::new(Arc::from(w.into_bytes()))
    }

    #[test]
    fn values_stay_aligned() {
        let mut w = Writer::new();
        w.write_bool(true);
        assert_eq!(w.len(), 4);
        w.write_str("abcde");
        assert_eq!(w.len(), 4 + 4 + 8);
        w.write_slice(&[1u8, 2, 3]);
        assert_eq!(w.len() % 4, 0);
        w.write_f32(2.5);

        let mut r = reader(w);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_string().unwrap(), "abcde");
        assert_eq!(r.read_vec::<u8>().unwrap(), vec![1, 2, 3]);
        assert_eq!(r.read_f32().unwrap(), 2.5);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn counts_are_little_endian() {
        let mut w = Writer::new();
        w.write_slice(&[7u32, 8]);
        assert_eq!(&w.as_bytes()[..4], &[2, 0, 0, 0]);
    }

    #[test]
    fn arrays_decode_without_copy() {
        let points = vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)];
        let mut w = Writer::new();
        w.write_u32(9);
        w.write_slice(&points);
        let mut r = reader(w);
        assert_eq!(r.read_u32().unwrap(), 9);
        let shared = r.read_shared::<Vec3>().unwrap();
        assert!(shared.is_borrowed());
        assert_eq!(shared.as_slice(), points.as_slice());
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut w = Writer::new();
        w.write_slice(&[1u32, 2, 3]);
        let mut bytes = w.into_bytes();
        bytes.truncate(8);
        let mut r = Reader::new(Arc::from(bytes));
        assert!(matches!(r.read_vec::<u32>(), Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn huge_count_is_rejected() {
        let mut w = Writer::new();
        w.write_u32(u32::MAX);
        let mut r = reader(w);
        assert!(matches!(r.read_string(), Err(DecodeError::UnexpectedEof)));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut w = Writer::new();
        w.write_slice(&[0xffu8, 0xfe]);
        let mut r = reader(w);
        assert!(matches!(r.read_string(), Err(DecodeError::InvalidUtf8)));
    }

    #[test]
    fn hash_depends_on_contents() {
        assert_eq!(content_hash(b"abc"), content_hash(b"abc"));
        assert_ne!(content_hash(b"abc"), content_hash(b"abd"));
    }
}
