use ndarray::{Array1, Array4};

use crate::{MlErr, Result};

/// Batch normalization in evaluation mode.
///
/// The running statistics are folded into a per-channel scale and shift when the layer
/// is created, so a forward pass is a single multiply-add.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    scale: Array1<f32>,
    shift: Array1<f32>,
}

impl BatchNorm2d {
    /// Creates a new `BatchNorm2d`.
    ///
    /// # Arguments
    /// * `weight` - The learned per-channel scale (gamma).
    /// * `bias` - The learned per-channel shift (beta).
    /// * `running_mean` - The mean tracked during training.
    /// * `running_var` - The variance tracked during training.
    /// * `eps` - Added to the variance to avoid dividing by zero.
    ///
    /// # Returns
    /// A new `BatchNorm2d` or an error if the four vectors have different lengths.
    pub fn new(
        weight: Array1<f32>,
        bias: Array1<f32>,
        running_mean: Array1<f32>,
        running_var: Array1<f32>,
        eps: f32,
    ) -> Result<Self> {
        let features = weight.len();
        for (what, v) in [
            ("batch_norm2d bias", &bias),
            ("batch_norm2d running_mean", &running_mean),
            ("batch_norm2d running_var", &running_var),
        ] {
            if v.len() != features {
                return Err(MlErr::SizeMismatch {
                    what,
                    got: v.len(),
                    expected: features,
                });
            }
        }

        let scale = weight / running_var.mapv(|v| (v + eps).sqrt());
        let shift = bias - running_mean * &scale;

        Ok(Self { scale, shift })
    }

    pub fn features(&self) -> usize {
        self.scale.len()
    }

    /// Normalizes `x` in place.
    ///
    /// # Arguments
    /// * `x` - The input, shaped `(batch, features, height, width)`.
    pub fn forward(&self, x: &mut Array4<f32>) -> Result<()> {
        let c = x.dim().1;
        if c != self.features() {
            return Err(MlErr::SizeMismatch {
                what: "batch_norm2d input channels",
                got: c,
                expected: self.features(),
            });
        }

        *x *= &self.scale.view().into_shape_with_order((1, c, 1, 1))?;
        *x += &self.shift.view().into_shape_with_order((1, c, 1, 1))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uses_running_statistics() {
        let bn = BatchNorm2d::new(
            array![2.0, 1.0],
            array![1.0, 0.0],
            array![1.0, -1.0],
            array![4.0, 1.0],
            0.0,
        )
        .unwrap();

        let mut x = array![[[[3.0]], [[1.0]]]];
        bn.forward(&mut x).unwrap();

        // (3 - 1) / 2 * 2 + 1 = 3, (1 + 1) / 1 * 1 + 0 = 2
        assert_eq!(x, array![[[[3.0]], [[2.0]]]]);
    }

    #[test]
    fn mismatched_statistics_are_rejected() {
        let err = BatchNorm2d::new(
            array![1.0, 1.0],
            array![0.0],
            array![0.0, 0.0],
            array![1.0, 1.0],
            1e-5,
        )
        .unwrap_err();

        assert!(matches!(err, MlErr::SizeMismatch { got: 1, expected: 2, .. }));
    }
}
