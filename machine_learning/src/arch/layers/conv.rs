use ndarray::{Array1, Array2, Array4, ArrayView2, ArrayView3, ArrayView4, Axis, concatenate};
use rayon::prelude::*;

use crate::{Device, MlErr, Result};

/// A 2D convolution over NCHW inputs with square kernels.
///
/// Evaluated as an im2col followed by a single matrix product per sample.
#[derive(Debug, Clone)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    // (out_channels, in_channels * kernel * kernel)
    weight: Array2<f32>,
    bias: Option<Array1<f32>>,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `weight` - The kernels, shaped `(out_channels, in_channels, kernel, kernel)`.
    /// * `bias` - An optional bias per output channel.
    /// * `stride` - The step between two kernel applications.
    /// * `padding` - The zero padding added on every border.
    ///
    /// # Returns
    /// A new `Conv2d` or an error if the kernels aren't square or the bias length is off.
    pub fn new(
        weight: Array4<f32>,
        bias: Option<Array1<f32>>,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let (out_channels, in_channels, kh, kw) = weight.dim();
        if kh != kw {
            return Err(MlErr::SizeMismatch {
                what: "conv2d kernel width",
                got: kw,
                expected: kh,
            });
        }

        if let Some(b) = &bias
            && b.len() != out_channels
        {
            return Err(MlErr::SizeMismatch {
                what: "conv2d bias",
                got: b.len(),
                expected: out_channels,
            });
        }

        let weight = weight.into_shape_with_order((out_channels, in_channels * kh * kw))?;

        Ok(Self {
            in_channels,
            out_channels,
            kernel: kh,
            stride: stride.max(1),
            padding,
            weight,
            bias,
        })
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Convolves every sample of the batch.
    ///
    /// # Arguments
    /// * `x` - The input, shaped `(batch, in_channels, height, width)`.
    /// * `device` - The device the forward pass runs on.
    ///
    /// # Returns
    /// The output map, shaped `(batch, out_channels, out_height, out_width)`.
    pub fn forward(&self, x: ArrayView4<f32>, device: Device) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv2d input channels",
                got: c,
                expected: self.in_channels,
            });
        }

        let oh = self.output_len(h, x.shape())?;
        let ow = self.output_len(w, x.shape())?;
        let mut out = Array4::zeros((n, self.out_channels, oh, ow));

        for (sample, mut dst) in x.outer_iter().zip(out.outer_iter_mut()) {
            let cols = self.im2col(sample, oh, ow);
            let y = self.matmul(&cols, device)?;
            dst.assign(&y.into_shape_with_order((self.out_channels, oh, ow))?);
        }

        if let Some(b) = &self.bias {
            out += &b.view().into_shape_with_order((1, self.out_channels, 1, 1))?;
        }

        Ok(out)
    }

    fn output_len(&self, len: usize, shape: &[usize]) -> Result<usize> {
        let padded = len + 2 * self.padding;
        if padded < self.kernel {
            return Err(MlErr::InvalidShape {
                layer: "conv2d",
                got: shape.to_vec(),
            });
        }

        Ok((padded - self.kernel) / self.stride + 1)
    }

    /// Unfolds every receptive field of `x` into a column.
    ///
    /// Row `(ci * k + ki) * k + kj` holds input channel `ci` at kernel offset `(ki, kj)`,
    /// which matches the row-major flattening of the kernels in `self.weight`.
    fn im2col(&self, x: ArrayView3<f32>, oh: usize, ow: usize) -> Array2<f32> {
        let (c, h, w) = x.dim();
        let k = self.kernel;
        let mut cols = Array2::zeros((c * k * k, oh * ow));

        for ci in 0..c {
            for ki in 0..k {
                for kj in 0..k {
                    let mut row = cols.row_mut((ci * k + ki) * k + kj);

                    for oy in 0..oh {
                        let Some(iy) = (oy * self.stride + ki).checked_sub(self.padding) else {
                            continue;
                        };
                        if iy >= h {
                            continue;
                        }

                        for ox in 0..ow {
                            let Some(ix) = (ox * self.stride + kj).checked_sub(self.padding)
                            else {
                                continue;
                            };
                            if ix < w {
                                row[oy * ow + ox] = x[[ci, iy, ix]];
                            }
                        }
                    }
                }
            }
        }

        cols
    }

    fn matmul(&self, cols: &Array2<f32>, device: Device) -> Result<Array2<f32>> {
        let Device::Parallel { threads } = device else {
            return Ok(self.weight.dot(cols));
        };

        let rows = self.out_channels.div_ceil(threads.get()).max(1);
        let chunks: Vec<ArrayView2<f32>> = self.weight.axis_chunks_iter(Axis(0), rows).collect();
        let parts: Vec<Array2<f32>> = chunks.into_par_iter().map(|w| w.dot(cols)).collect();
        let views: Vec<ArrayView2<f32>> = parts.iter().map(|p| p.view()).collect();

        Ok(concatenate(Axis(0), &views)?)
    }
}
