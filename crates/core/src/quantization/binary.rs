//! Sign-bit quantization: f32 embedding → 1 bit per dimension.
//!
//! An embedding is L2-normalized, each component is mapped to `1` when strictly
//! positive and `0` otherwise, and the bits are packed most-significant-bit-first
//! into `ceil(D / 8)` bytes. Unused low bits of the final byte are zero.
//!
//! The same [`pack`] is used for indexed rows and for queries, so Hamming
//! distance between two packed vectors counts the dimensions whose signs differ.

use crate::config::NORM_EPSILON;
use crate::error::{EngineError, Result};

/// Number of bytes needed to hold `dimension` sign bits.
#[inline]
pub fn packed_width(dimension: usize) -> usize {
    dimension.div_ceil(8)
}

/// Packs one embedding into a freshly allocated byte vector.
pub fn pack(embedding: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; packed_width(embedding.len())];
    pack_into(embedding, &mut out);
    out
}

/// Packs `embedding` into `out`, which must be exactly `packed_width(embedding.len())` bytes.
pub(crate) fn pack_into(embedding: &[f32], out: &mut [u8]) {
    debug_assert_eq!(out.len(), packed_width(embedding.len()));
    let norm = embedding.iter().map(|&x| x * x).sum::<f32>().sqrt();
    let divisor = norm + NORM_EPSILON;

    out.fill(0);
    for (i, &x) in embedding.iter().enumerate() {
        if x / divisor > 0.0 {
            out[i / 8] |= 0x80 >> (i % 8);
        }
    }
}

/// Reference Hamming distance: popcount of the byte-wise XOR.
///
/// Both slices must have the same length. The native kernels in
/// [`super::simd`] must agree with this function on every input.
#[inline]
pub fn hamming(a: &[u8], b: &[u8]) -> u32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Similarity in `[0, 1]` derived from a Hamming distance over `dimension` bits.
#[inline]
pub fn score(distance: u32, dimension: usize) -> f32 {
    if dimension == 0 {
        return 0.0;
    }
    1.0 - distance as f32 / dimension as f32
}

/// Row-major matrix of packed vectors with a fixed row width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedMatrix {
    data: Vec<u8>,
    rows: usize,
    row_width: usize,
}

impl PackedMatrix {
    /// Empty matrix whose rows will be `row_width` bytes.
    pub fn new(row_width: usize) -> Self {
        Self {
            data: Vec::new(),
            rows: 0,
            row_width,
        }
    }

    /// Wraps an existing row-major buffer. Fails when `data` is not exactly
    /// `rows * row_width` bytes.
    pub fn from_raw(data: Vec<u8>, rows: usize, row_width: usize) -> Result<Self> {
        let expected = rows.checked_mul(row_width).ok_or_else(|| {
            EngineError::InvalidArgument(format!("{rows} rows of {row_width} bytes overflows"))
        })?;
        if data.len() != expected {
            return Err(EngineError::InvalidArgument(format!(
                "buffer holds {} bytes, {rows} rows of {row_width} bytes need {expected}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            rows,
            row_width,
        })
    }

    /// Packs every embedding in `embeddings`. All rows must have `dimension` components.
    pub fn pack_rows<E: AsRef<[f32]>>(embeddings: &[E], dimension: usize) -> Result<Self> {
        let row_width = packed_width(dimension);
        let mut data = vec![0u8; embeddings.len() * row_width];
        for (i, embedding) in embeddings.iter().enumerate() {
            let embedding = embedding.as_ref();
            if embedding.len() != dimension {
                return Err(EngineError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            pack_into(embedding, &mut data[i * row_width..(i + 1) * row_width]);
        }
        Ok(Self {
            data,
            rows: embeddings.len(),
            row_width,
        })
    }

    /// Appends one packed row.
    pub fn push(&mut self, row: &[u8]) -> Result<()> {
        if row.len() != self.row_width {
            return Err(EngineError::DimensionMismatch {
                expected: self.row_width,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        self.rows += 1;
        Ok(())
    }

    #[inline]
    pub fn row(&self, index: usize) -> &[u8] {
        let start = index * self.row_width;
        &self.data[start..start + self.row_width]
    }

    /// Iterates rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.rows).map(move |i| self.row(i))
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[inline]
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    /// Bits per row (`row_width * 8`), the `D` used for scoring.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.row_width * 8
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Copies rows `start..end` into a new matrix.
    pub fn slice_rows(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.rows);
        let start = start.min(end);
        Self {
            data: self.data[start * self.row_width..end * self.row_width].to_vec(),
            rows: end - start,
            row_width: self.row_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_msb_first() {
        let e = [1.0, 1.0, 1.0, 1.0, -1.0, -1.0, -1.0, -1.0];
        assert_eq!(pack(&e), vec![0b1111_0000]);
    }

    #[test]
    fn test_pack_pads_final_byte_with_zeros() {
        let e = [1.0f32; 10];
        assert_eq!(pack(&e), vec![0xFF, 0b1100_0000]);
    }

    #[test]
    fn test_pack_zero_counts_as_non_positive() {
        let e = [0.0, 0.5, -0.0, 0.5, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(pack(&e), vec![0b0101_0000]);
    }

    #[test]
    fn test_pack_zero_vector_is_all_zero_bits() {
        assert_eq!(pack(&[0.0f32; 16]), vec![0, 0]);
    }

    #[test]
    fn test_pack_ignores_magnitude() {
        let a = [3.0, -2.0, 0.1, -7.5, 9.0, 0.2, -0.3, 4.0];
        let b: Vec<f32> = a.iter().map(|x| x * 1000.0).collect();
        assert_eq!(pack(&a), pack(&b));
    }

    #[test]
    fn test_hamming_known_values() {
        assert_eq!(hamming(&[0b1111_0000], &[0b0000_1111]), 8);
        assert_eq!(hamming(&[0xAA, 0x00], &[0xAA, 0x01]), 1);
        assert_eq!(hamming(&[], &[]), 0);
    }

    #[test]
    fn test_score() {
        assert_eq!(score(0, 8), 1.0);
        assert_eq!(score(8, 8), 0.0);
        assert_eq!(score(96, 384), 0.75);
    }

    // ── PackedMatrix ────────────────────────────────────────────────────

    #[test]
    fn test_pack_rows_dimension_mismatch() {
        let rows = vec![vec![1.0f32; 8], vec![1.0f32; 7]];
        let err = PackedMatrix::pack_rows(&rows, 8).unwrap_err();
        assert!(matches!(
            err,
            EngineError::DimensionMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn test_pack_rows_matches_pack() {
        let rows = vec![
            vec![0.3f32, -0.1, 0.0, 2.0, -5.0, 1.0, 1.0, -1.0, 0.5, 0.5],
            vec![-1.0f32; 10],
            vec![1.0f32; 10],
        ];
        let matrix = PackedMatrix::pack_rows(&rows, 10).unwrap();
        assert_eq!(matrix.row_width(), 2);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(matrix.row(i), pack(row).as_slice());
        }
    }

    #[test]
    fn test_matrix_rows_and_slice() {
        let rows: Vec<Vec<f32>> = (0..5)
            .map(|i| (0..16).map(|j| if (i + j) % 2 == 0 { 1.0 } else { -1.0 }).collect())
            .collect();
        let m = PackedMatrix::pack_rows(&rows, 16).unwrap();
        assert_eq!(m.rows(), 5);
        assert_eq!(m.row_width(), 2);
        assert_eq!(m.dimension(), 16);
        assert_eq!(m.row(2), pack(&rows[2]).as_slice());

        let s = m.slice_rows(1, 3);
        assert_eq!(s.rows(), 2);
        assert_eq!(s.row(0), m.row(1));
        assert_eq!(s.row(1), m.row(2));
        assert!(m.slice_rows(4, 99).rows() == 1);
    }

    #[test]
    fn test_from_raw_rejects_bad_length() {
        assert!(PackedMatrix::from_raw(vec![0; 7], 2, 4).is_err());
        assert!(PackedMatrix::from_raw(vec![0; 8], 2, 4).is_ok());
    }

    #[test]
    fn test_push_checks_width() {
        let mut m = PackedMatrix::new(2);
        m.push(&[1, 2]).unwrap();
        assert!(m.push(&[1]).is_err());
        assert_eq!(m.rows(), 1);
    }

    // ── Properties ──────────────────────────────────────────────────────

    fn nonzero_embedding() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(
            prop_oneof![-100.0f32..-1e-3, 1e-3f32..100.0],
            1..300,
        )
    }

    proptest! {
        #[test]
        fn prop_negation_is_complement(e in nonzero_embedding()) {
            let neg: Vec<f32> = e.iter().map(|x| -x).collect();
            let a = pack(&e);
            let b = pack(&neg);
            prop_assert_eq!(hamming(&a, &b) as usize, e.len());
        }

        #[test]
        fn prop_self_distance_is_zero(e in nonzero_embedding()) {
            let a = pack(&e);
            prop_assert_eq!(hamming(&a, &a), 0);
        }

        #[test]
        fn prop_distance_bounds(
            a in prop::collection::vec(any::<u8>(), 0..96),
            seed in any::<u8>(),
        ) {
            let b: Vec<u8> = a.iter().map(|x| x.wrapping_mul(31).wrapping_add(seed)).collect();
            let d = hamming(&a, &b) as usize;
            prop_assert!(d <= a.len() * 8);
        }

        #[test]
        fn prop_width_is_ceil_div_eight(len in 0usize..1000) {
            let e = vec![1.0f32; len];
            prop_assert_eq!(pack(&e).len(), len.div_ceil(8));
        }
    }
}
