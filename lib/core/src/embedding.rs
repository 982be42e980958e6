use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A unit-length image embedding.
///
/// Construction always L2-normalizes, so similarity between two embeddings
/// reduces to a dot product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    data: Vec<f32>,
}

impl Embedding {
    /// Normalize `data` to unit length.
    ///
    /// Fails on an empty vector, a non-finite component, or a zero vector,
    /// none of which has a direction.
    pub fn new(data: Vec<f32>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::Decode("embedding has no components".to_string()));
        }
        if data.iter().any(|x| !x.is_finite()) {
            return Err(Error::Decode("embedding has non-finite components".to_string()));
        }

        let norm = norm(&data);
        if norm <= f32::EPSILON {
            return Err(Error::Decode("embedding has zero magnitude".to_string()));
        }

        let inv_norm = 1.0 / norm;
        let data = data.into_iter().map(|x| x * inv_norm).collect();
        Ok(Self { data })
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Cosine similarity of two unit vectors (their dot product).
    ///
    /// Mismatched dimensions compare as 0.0.
    #[inline]
    pub fn cosine(&self, other: &Embedding) -> f32 {
        if self.dim() != other.dim() {
            return 0.0;
        }
        dot_product(&self.data, &other.data)
    }

    /// Visual similarity in [0, 1].
    ///
    /// Anti-correlated embeddings carry no evidence of being the same object,
    /// so negative cosines floor at zero.
    #[inline]
    pub fn similarity(&self, other: &Embedding) -> f32 {
        self.cosine(other).clamp(0.0, 1.0)
    }
}

/// Dot product with two accumulators.
///
/// Scalar only: persisted scores must be bit-identical across hosts, which
/// rules out picking a kernel by CPU feature detection.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot0 = 0.0f32;
    let mut dot1 = 0.0f32;

    let chunks = a.chunks_exact(8);
    let remainder = chunks.remainder();
    let b_chunks = b.chunks_exact(8);

    for (a_chunk, b_chunk) in chunks.zip(b_chunks) {
        dot0 += a_chunk[0] * b_chunk[0]
            + a_chunk[1] * b_chunk[1]
            + a_chunk[2] * b_chunk[2]
            + a_chunk[3] * b_chunk[3];

        dot1 += a_chunk[4] * b_chunk[4]
            + a_chunk[5] * b_chunk[5]
            + a_chunk[6] * b_chunk[6]
            + a_chunk[7] * b_chunk[7];
    }

    for i in (a.len() - remainder.len())..a.len() {
        dot0 += a[i] * b[i];
    }

    dot0 + dot1
}

#[inline]
pub fn norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes() {
        let e = Embedding::new(vec![3.0, 4.0]).unwrap();
        assert!((e.as_slice()[0] - 0.6).abs() < 1e-6);
        assert!((e.as_slice()[1] - 0.8).abs() < 1e-6);
        assert!((norm(e.as_slice()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_degenerate_vectors() {
        assert!(Embedding::new(vec![]).is_err());
        assert!(Embedding::new(vec![0.0, 0.0, 0.0]).is_err());
        assert!(Embedding::new(vec![1.0, f32::NAN]).is_err());
    }

    #[test]
    fn test_similarity_bounds() {
        let a = Embedding::new(vec![1.0, 0.0]).unwrap();
        let b = Embedding::new(vec![-1.0, 0.0]).unwrap();
        let c = Embedding::new(vec![0.0, 1.0]).unwrap();

        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.similarity(&b), 0.0);
        assert!(a.similarity(&c).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_mismatch_is_zero() {
        let a = Embedding::new(vec![1.0, 0.0]).unwrap();
        let b = Embedding::new(vec![1.0, 0.0, 0.0]).unwrap();
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_dot_product_is_symmetric() {
        let a: Vec<f32> = (0..19).map(|i| (i as f32 * 0.37).sin()).collect();
        let b: Vec<f32> = (0..19).map(|i| (i as f32 * 0.11).cos()).collect();
        assert_eq!(dot_product(&a, &b), dot_product(&b, &a));
    }
}
