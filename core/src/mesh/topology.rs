//! Polygon topology helpers shared by the connectivity builder, the refiner
//! and normal generation.

use super::RefineError;

/// How polygon sizes are described.
#[derive(Debug, Clone, Copy)]
pub enum Faces<'a> {
    /// Explicit per-face corner counts.
    Counts(&'a [u32]),
    /// Every face has the same number of corners.
    Ngon(u32),
}

impl<'a> Faces<'a> {
    /// Number of faces for an index buffer of `num_indices` corners.
    pub fn len(&self, num_indices: usize) -> usize {
        match *self {
            Faces::Counts(counts) => counts.len(),
            Faces::Ngon(0) => 0,
            Faces::Ngon(n) => num_indices / n as usize,
        }
    }

    /// Corner count of face `fi`.
    pub fn count(&self, fi: usize) -> u32 {
        match *self {
            Faces::Counts(counts) => counts[fi],
            Faces::Ngon(n) => n,
        }
    }

    /// Checks that the faces exactly cover `num_indices` corners.
    pub fn validate(&self, num_indices: usize) -> Result<(), RefineError> {
        let expected = match *self {
            Faces::Counts(counts) => counts.iter().map(|&c| c as usize).sum(),
            Faces::Ngon(n) => self.len(num_indices) * n as usize,
        };
        if expected != num_indices {
            return Err(RefineError::TopologyMismatch {
                expected,
                actual: num_indices,
            });
        }
        Ok(())
    }

    /// Iterates `(face, first_corner, count)` triples.
    pub fn iter(&self, num_indices: usize) -> impl Iterator<Item = (usize, usize, u32)> + 'a {
        let faces = *self;
        let mut offset = 0usize;
        (0..faces.len(num_indices)).map(move |fi| {
            let count = faces.count(fi);
            let first = offset;
            offset += count as usize;
            (fi, first, count)
        })
    }
}

/// Validates counts against the index buffer and every index against the
/// point count.
pub fn validate_topology(
    faces: Faces<'_>,
    indices: &[u32],
    num_points: usize,
) -> Result<(), RefineError> {
    faces.validate(indices.len())?;
    if let Some((corner, &index)) = indices
        .iter()
        .enumerate()
        .find(|&(_, &i)| i as usize >= num_points)
    {
        return Err(RefineError::IndexOutOfRange {
            corner,
            index,
            vertices: num_points,
        });
    }
    Ok(())
}

/// Exclusive prefix sum of `counts` with a trailing total.
pub fn face_offsets(faces: Faces<'_>, num_indices: usize) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(faces.len(num_indices) + 1);
    let mut total = 0u32;
    offsets.push(0);
    for (_, _, count) in faces.iter(num_indices) {
        total += count;
        offsets.push(total);
    }
    offsets
}

/// Index count after fan triangulation of one polygon.
pub fn triangulated_index_count(count: u32) -> u32 {
    if count >= 3 {
        (count - 2) * 3
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_must_cover_indices() {
        let err = Faces::Counts(&[3, 3]).validate(5).unwrap_err();
        assert_eq!(
            err,
            RefineError::TopologyMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn ngon_must_divide_indices() {
        assert!(Faces::Ngon(3).validate(9).is_ok());
        assert!(Faces::Ngon(3).validate(10).is_err());
    }

    #[test]
    fn out_of_range_index_is_reported() {
        let err = validate_topology(Faces::Counts(&[3]), &[0, 1, 7], 3).unwrap_err();
        assert!(matches!(err, RefineError::IndexOutOfRange { corner: 2, index: 7, .. }));
    }

    #[test]
    fn offsets_prefix_sum() {
        assert_eq!(face_offsets(Faces::Counts(&[4, 2, 1]), 7), vec![0, 4, 6, 7]);
        assert_eq!(face_offsets(Faces::Ngon(3), 6), vec![0, 3, 6]);
    }

    #[test]
    fn triangulated_counts() {
        assert_eq!(triangulated_index_count(1), 0);
        assert_eq!(triangulated_index_count(3), 3);
        assert_eq!(triangulated_index_count(5), 9);
    }
}
