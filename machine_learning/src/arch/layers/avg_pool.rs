use ndarray::{Array4, Axis};

use crate::{MlErr, Result};

/// Averages every channel's map down to a single value, keeping NCHW with `h = w = 1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdaptiveAvgPool2d;

impl AdaptiveAvgPool2d {
    pub fn forward(&self, x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let shape = x.shape().to_vec();

        let mean = x
            .into_shape_with_order((n, c, h * w))?
            .mean_axis(Axis(2))
            .ok_or(MlErr::InvalidShape {
                layer: "adaptive_avg_pool2d",
                got: shape,
            })?;

        Ok(mean.into_shape_with_order((n, c, 1, 1))?)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn averages_each_channel() {
        let x = array![[[[1.0, 3.0], [5.0, 7.0]], [[0.0, 0.0], [0.0, 2.0]]]];
        let y = AdaptiveAvgPool2d.forward(x).unwrap();
        assert_eq!(y, array![[[[4.0]], [[0.5]]]]);
    }

    #[test]
    fn one_by_one_maps_pass_through() {
        let x = Array4::from_elem((1, 512, 1, 1), 0.25);
        let y = AdaptiveAvgPool2d.forward(x.clone()).unwrap();
        assert_eq!(y, x);
    }
}
