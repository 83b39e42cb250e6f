use ndarray::{Array1, Array2, ArrayView2, linalg};

use crate::{MlErr, Result};

/// A fully connected layer, used as the classification head.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    // (in_features, out_features)
    w: Array2<f32>,
    b: Array1<f32>,
}

impl Dense {
    /// Creates a new `Dense`.
    ///
    /// # Arguments
    /// * `weight` - The weights as stored by PyTorch, shaped `(out_features, in_features)`.
    /// * `bias` - One bias per output feature.
    ///
    /// # Returns
    /// A new `Dense` or an error if the bias length doesn't match the output features.
    pub fn new(weight: Array2<f32>, bias: Array1<f32>) -> Result<Self> {
        let (out_features, in_features) = weight.dim();
        if bias.len() != out_features {
            return Err(MlErr::SizeMismatch {
                what: "dense bias",
                got: bias.len(),
                expected: out_features,
            });
        }

        Ok(Self {
            dim: (in_features, out_features),
            w: weight.reversed_axes(),
            b: bias,
        })
    }

    /// Returns the amount of input and output features.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Computes `x · Wᵀ + b` for every row of `x`.
    ///
    /// # Arguments
    /// * `x` - The input, shaped `(batch, in_features)`.
    ///
    /// # Returns
    /// The output, shaped `(batch, out_features)`.
    pub fn forward(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &self.w, 0.0, &mut z);
        z += &self.b;

        Ok(z)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn applies_pytorch_layout_weights() {
        // Two outputs: x0 + 2 * x1 and -x1.
        let dense = Dense::new(array![[1.0, 2.0], [0.0, -1.0]], array![0.5, 1.0]).unwrap();
        let y = dense.forward(array![[1.0, 1.0], [2.0, 0.0]].view()).unwrap();
        assert_eq!(y, array![[3.5, 0.0], [2.5, 1.0]]);
    }

    #[test]
    fn rejects_wrong_input_width() {
        let dense = Dense::new(Array2::zeros((3, 4)), Array1::zeros(3)).unwrap();
        let err = dense.forward(Array2::<f32>::zeros((1, 5)).view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 5, expected: 4, .. }));
    }
}
