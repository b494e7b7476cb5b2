//! Vector normalization with parallel processing.

use rayon::prelude::*;

/// Utility struct for vector operations.
pub struct VectorOps;

impl VectorOps {
    /// Euclidean length of a vector.
    pub fn l2_norm(vector: &[f32]) -> f32 {
        vector.par_iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Normalize a vector in-place to unit length. Zero vectors are left as-is.
    pub fn normalize_inplace(vector: &mut [f32]) {
        let norm = Self::l2_norm(vector);
        if norm > 0.0 {
            vector.par_iter_mut().for_each(|x| *x /= norm);
        }
    }

    /// Batch normalize vectors in-place.
    pub fn batch_normalize(vectors: &mut [Vec<f32>]) {
        vectors.par_iter_mut().for_each(|vector| {
            Self::normalize_inplace(vector);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_inplace() {
        let mut v = vec![3.0f32, 4.0];
        VectorOps::normalize_inplace(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_unchanged() {
        let mut vectors = vec![vec![0.0; 4]];
        VectorOps::batch_normalize(&mut vectors);
        assert_eq!(vectors[0], vec![0.0; 4]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut once = vec![1.0f32, -2.0, 0.5, 7.0];
        VectorOps::normalize_inplace(&mut once);
        let mut twice = once.clone();
        VectorOps::normalize_inplace(&mut twice);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        assert!((VectorOps::l2_norm(&twice) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_batch_normalize() {
        let mut vectors = vec![vec![3.0, 4.0], vec![0.0, 5.0]];
        VectorOps::batch_normalize(&mut vectors);
        assert!((vectors[0][0] - 0.6).abs() < 1e-6);
        assert!((vectors[1][1] - 1.0).abs() < 1e-6);
    }
}
