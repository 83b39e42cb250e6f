use ndarray::{Array4, ArrayView4};

use crate::{MlErr, Result};

/// Max pooling with a square window. Padded positions never win.
#[derive(Debug, Clone, Copy)]
pub struct MaxPool2d {
    kernel: usize,
    stride: usize,
    padding: usize,
}

impl MaxPool2d {
    pub fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        Self {
            kernel: kernel.max(1),
            stride: stride.max(1),
            padding,
        }
    }

    pub fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (oh, ow) = (self.output_len(h), self.output_len(w));
        if oh == 0 || ow == 0 || self.padding * 2 > self.kernel {
            return Err(MlErr::InvalidShape {
                layer: "max_pool2d",
                got: x.shape().to_vec(),
            });
        }

        Ok(Array4::from_shape_fn((n, c, oh, ow), |(b, ch, oy, ox)| {
            let mut max = f32::NEG_INFINITY;

            for ki in 0..self.kernel {
                let Some(iy) = (oy * self.stride + ki).checked_sub(self.padding) else {
                    continue;
                };

                for kj in 0..self.kernel {
                    let Some(ix) = (ox * self.stride + kj).checked_sub(self.padding) else {
                        continue;
                    };

                    if iy < h && ix < w {
                        max = max.max(x[[b, ch, iy, ix]]);
                    }
                }
            }

            max
        }))
    }

    fn output_len(&self, len: usize) -> usize {
        let padded = len + 2 * self.padding;
        if padded < self.kernel {
            return 0;
        }

        (padded - self.kernel) / self.stride + 1
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, array};

    use super::*;

    #[test]
    fn picks_window_maximum() {
        let x = Array::from_shape_vec((1, 1, 4, 4), (0..16).map(|v| v as f32).collect()).unwrap();
        let y = MaxPool2d::new(2, 2, 0).forward(x.view()).unwrap();
        assert_eq!(y, array![[[[5.0, 7.0], [13.0, 15.0]]]]);
    }

    #[test]
    fn padding_is_ignored_for_negative_maps() {
        let x = Array4::from_elem((1, 1, 2, 2), -3.0);
        let y = MaxPool2d::new(3, 2, 1).forward(x.view()).unwrap();
        assert_eq!(y, array![[[[-3.0]]]]);
    }
}
