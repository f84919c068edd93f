//! Copy-on-write attribute buffer.
//!
//! A [`SharedVec`] either views a range of a shared byte buffer (as produced
//! by zero-copy decoding) or holds a reference-counted `Vec`. Reads never
//! copy. The first mutation materializes a private `Vec`, copying only if
//! the data is still shared.

use std::fmt;
use std::ops::{Deref, Range};
use std::sync::Arc;

use bytemuck::Pod;

/// Copy-on-write vector of plain-old-data values.
#[derive(Clone)]
pub struct SharedVec<T> {
    /// When set, the contents are this byte range and `owned` is unused.
    bytes: Option<(Arc<[u8]>, Range<usize>)>,
    owned: Arc<Vec<T>>,
}

fn copy_from_bytes<T: Pod>(bytes: &[u8]) -> Vec<T> {
    let mut values = vec![T::zeroed(); bytes.len() / std::mem::size_of::<T>().max(1)];
    bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(bytes);
    values
}

impl<T: Pod> SharedVec<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            bytes: None,
            owned: Arc::new(values),
        }
    }

    /// Views `buffer[range]` without copying.
    ///
    /// Falls back to an owned copy when the range is not aligned for `T`.
    /// Any trailing bytes that do not form a whole element are ignored.
    pub fn from_bytes(buffer: Arc<[u8]>, range: Range<usize>) -> Self {
        let size = std::mem::size_of::<T>().max(1);
        let len = (range.end - range.start) / size * size;
        let range = range.start..range.start + len;
        if bytemuck::try_cast_slice::<u8, T>(&buffer[range.clone()]).is_ok() {
            Self {
                bytes: Some((buffer, range)),
                owned: Arc::default(),
            }
        } else {
            Self::from_vec(copy_from_bytes(&buffer[range]))
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.bytes {
            // Alignment and length were validated in `from_bytes`.
            Some((buffer, range)) => {
                bytemuck::try_cast_slice(&buffer[range.clone()]).unwrap_or_default()
            }
            None => self.owned.as_slice(),
        }
    }

    /// `true` while the data still aliases a decoded byte buffer.
    pub fn is_borrowed(&self) -> bool {
        self.bytes.is_some()
    }

    /// `true` if another `SharedVec` or buffer holds the same data.
    pub fn is_shared(&self) -> bool {
        self.bytes.is_some() || Arc::strong_count(&self.owned) > 1
    }

    /// Mutable access, copying first if the data is shared.
    pub fn make_mut(&mut self) -> &mut Vec<T> {
        if let Some((buffer, range)) = self.bytes.take() {
            self.owned = Arc::new(copy_from_bytes(&buffer[range]));
        }
        Arc::make_mut(&mut self.owned)
    }

    /// Empties the buffer without copying shared data.
    pub fn clear(&mut self) {
        if self.is_shared() {
            *self = Self::new();
        } else {
            self.make_mut().clear();
        }
    }

    pub fn push(&mut self, value: T) {
        self.make_mut().push(value);
    }

    pub fn extend_from_slice(&mut self, values: &[T]) {
        self.make_mut().extend_from_slice(values);
    }

    pub fn resize(&mut self, len: usize, value: T) {
        self.make_mut().resize(len, value);
    }

    /// Replaces the contents.
    pub fn assign(&mut self, values: &[T]) {
        if self.is_shared() {
            *self = Self::from_vec(values.to_vec());
        } else {
            let v = self.make_mut();
            v.clear();
            v.extend_from_slice(values);
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self.bytes {
            Some((buffer, range)) => copy_from_bytes(&buffer[range]),
            None => Arc::try_unwrap(self.owned).unwrap_or_else(|v| (*v).clone()),
        }
    }
}

impl<T: Pod> Default for SharedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Pod> Deref for SharedVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> From<Vec<T>> for SharedVec<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

impl<T: Pod> FromIterator<T> for SharedVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: Pod + PartialEq> PartialEq for SharedVec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for SharedVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(values: &[u32]) -> Arc<[u8]> {
        Arc::from(bytemuck::cast_slice::<u32, u8>(values))
    }

    #[test]
    fn borrowed_until_mutated() {
        let buffer = bytes_of(&[1, 2, 3, 4]);
        let mut v: SharedVec<u32> = SharedVec::from_bytes(buffer.clone(), 4..12);
        assert!(v.is_borrowed());
        assert_eq!(&*v, &[2, 3]);

        v.push(9);
        assert!(!v.is_borrowed());
        assert_eq!(&*v, &[2, 3, 9]);
        // The source buffer is untouched.
        assert_eq!(bytemuck::cast_slice::<u8, u32>(&buffer[..]), &[1, 2, 3, 4]);
    }

    #[test]
    fn misaligned_bytes_are_copied() {
        let mut raw = vec![0u8; 9];
        raw[1..5].copy_from_slice(&7u32.to_ne_bytes());
        raw[5..9].copy_from_slice(&8u32.to_ne_bytes());
        let buffer: Arc<[u8]> = Arc::from(raw);
        let v: SharedVec<u32> = SharedVec::from_bytes(buffer, 1..9);
        assert_eq!(v.as_slice(), &[7, 8]);
    }

    #[test]
    fn clones_share_until_write() {
        let a = SharedVec::from_vec(vec![1.0f32, 2.0]);
        let mut b = a.clone();
        assert!(a.is_shared());
        b.make_mut()[0] = 5.0;
        assert_eq!(a.as_slice(), &[1.0, 2.0]);
        assert_eq!(b.as_slice(), &[5.0, 2.0]);
        assert!(!b.is_shared());
    }

    #[test]
    fn clear_drops_shared_reference() {
        let a = SharedVec::from_vec(vec![1u32, 2, 3]);
        let mut b = a.clone();
        b.clear();
        assert!(b.is_empty());
        assert_eq!(a.len(), 3);
    }
}
