//! Fixed-shape numeric vectors used for genome parameters.
//!
//! The engine only needs four operations on these: random initialization,
//! elementwise addition, scaling and cloning. Everything else about the
//! numeric representation is opaque to the evolutionary operators.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Tensor shape errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorError {
    #[error("Shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
}

/// A dense row-major tensor of `f32` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl ParamTensor {
    /// Create a tensor filled with zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// Create a tensor from raw data. Returns `None` if the data length does
    /// not match the shape.
    pub fn from_vec(shape: &[usize], data: Vec<f32>) -> Option<Self> {
        (shape.iter().product::<usize>() == data.len()).then(|| Self {
            shape: shape.to_vec(),
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Euclidean norm.
    pub fn norm(&self) -> f32 {
        self.data.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    pub fn dot(&self, other: &ParamTensor) -> f32 {
        self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum()
    }
}

/// Sample a tensor with standard normal entries scaled by `scale`.
pub fn random_tensor<R: Rng + ?Sized>(shape: &[usize], scale: f32, rng: &mut R) -> ParamTensor {
    let len = shape.iter().product();
    let data = (0..len)
        .map(|_| rng.sample::<f32, _>(StandardNormal) * scale)
        .collect();
    ParamTensor {
        shape: shape.to_vec(),
        data,
    }
}

/// Elementwise sum of two tensors of the same shape.
pub fn add_tensors(a: &ParamTensor, b: &ParamTensor) -> Result<ParamTensor, TensorError> {
    check_shapes(a, b)?;
    Ok(ParamTensor {
        shape: a.shape.clone(),
        data: a.data.iter().zip(&b.data).map(|(x, y)| x + y).collect(),
    })
}

/// Multiply every element by `k`.
pub fn scale_tensor(t: &ParamTensor, k: f32) -> ParamTensor {
    ParamTensor {
        shape: t.shape.clone(),
        data: t.data.iter().map(|v| v * k).collect(),
    }
}

/// `alpha * a + (1 - alpha) * b`.
pub fn blend_tensors(
    a: &ParamTensor,
    b: &ParamTensor,
    alpha: f32,
) -> Result<ParamTensor, TensorError> {
    add_tensors(&scale_tensor(a, alpha), &scale_tensor(b, 1.0 - alpha))
}

/// Cosine similarity in [-1, 1]; zero when either tensor has zero norm.
pub fn cosine_similarity(a: &ParamTensor, b: &ParamTensor) -> f32 {
    let denom = a.norm() * b.norm();
    if denom <= f32::EPSILON || a.shape != b.shape {
        return 0.0;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0)
}

fn check_shapes(a: &ParamTensor, b: &ParamTensor) -> Result<(), TensorError> {
    if a.shape == b.shape {
        Ok(())
    } else {
        Err(TensorError::ShapeMismatch {
            left: a.shape.clone(),
            right: b.shape.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_random_tensor_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let t = random_tensor(&[2, 3], 0.5, &mut rng);
        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.len(), 6);
    }

    #[test]
    fn test_add_and_scale() {
        let a = ParamTensor::from_vec(&[3], vec![1.0, 2.0, 3.0]).unwrap();
        let b = ParamTensor::from_vec(&[3], vec![0.5, 0.5, 0.5]).unwrap();

        let sum = add_tensors(&a, &b).unwrap();
        assert_eq!(sum.as_slice(), &[1.5, 2.5, 3.5]);

        let scaled = scale_tensor(&a, 2.0);
        assert_eq!(scaled.as_slice(), &[2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = ParamTensor::zeros(&[3]);
        let b = ParamTensor::zeros(&[4]);
        assert!(matches!(
            add_tensors(&a, &b),
            Err(TensorError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_blend_midpoint() {
        let a = ParamTensor::from_vec(&[2], vec![2.0, 0.0]).unwrap();
        let b = ParamTensor::from_vec(&[2], vec![0.0, 4.0]).unwrap();
        let mid = blend_tensors(&a, &b, 0.5).unwrap();
        assert_eq!(mid.as_slice(), &[1.0, 2.0]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = ParamTensor::from_vec(&[2], vec![1.0, 0.0]).unwrap();
        let b = ParamTensor::from_vec(&[2], vec![0.0, 3.0]).unwrap();
        let zero = ParamTensor::zeros(&[2]);

        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
        assert_eq!(cosine_similarity(&a, &zero), 0.0);
    }
}
