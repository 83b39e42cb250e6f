use ndarray::{Array2, Array4, ArrayD, Ix2, Ix4};

use super::{AdaptiveAvgPool2d, BasicBlock, BatchNorm2d, Conv2d, Dense, MaxPool2d, Relu};
use crate::{Device, MlErr, Result};

/// One top-level step of a segment.
#[derive(Debug, Clone)]
pub enum Layer {
    Conv2d(Conv2d),
    BatchNorm2d(BatchNorm2d),
    Relu,
    MaxPool2d(MaxPool2d),
    /// A run of residual blocks, what torchvision calls `layer1`..`layer4`.
    Stage(Vec<BasicBlock>),
    AdaptiveAvgPool2d,
    /// Collapses everything but the batch dimension; inserted right before the head.
    Flatten,
    Dense(Dense),
}

impl Layer {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conv2d(_) => "conv2d",
            Self::BatchNorm2d(_) => "batch_norm2d",
            Self::Relu => "relu",
            Self::MaxPool2d(_) => "max_pool2d",
            Self::Stage(_) => "stage",
            Self::AdaptiveAvgPool2d => "adaptive_avg_pool2d",
            Self::Flatten => "flatten",
            Self::Dense(_) => "dense",
        }
    }

    /// Runs the layer on `x`.
    ///
    /// # Arguments
    /// * `x` - The output of the previous layer.
    /// * `device` - The device the forward pass runs on.
    ///
    /// # Returns
    /// The output of this layer or an error if `x` doesn't have the shape it expects.
    pub fn forward(&self, x: ArrayD<f32>, device: Device) -> Result<ArrayD<f32>> {
        let y = match self {
            Self::Conv2d(l) => l.forward(self.nchw(x)?.view(), device)?.into_dyn(),
            Self::BatchNorm2d(l) => {
                let mut x = self.nchw(x)?;
                l.forward(&mut x)?;
                x.into_dyn()
            }
            Self::Relu => {
                let mut x = x;
                Relu.forward(&mut x);
                x
            }
            Self::MaxPool2d(l) => l.forward(self.nchw(x)?.view())?.into_dyn(),
            Self::Stage(blocks) => {
                let mut x = self.nchw(x)?;
                for block in blocks {
                    x = block.forward(x, device)?;
                }
                x.into_dyn()
            }
            Self::AdaptiveAvgPool2d => AdaptiveAvgPool2d.forward(self.nchw(x)?)?.into_dyn(),
            Self::Flatten => flatten(x)?.into_dyn(),
            Self::Dense(l) => l.forward(self.matrix(x)?.view())?.into_dyn(),
        };

        Ok(y)
    }

    fn nchw(&self, x: ArrayD<f32>) -> Result<Array4<f32>> {
        if x.ndim() != 4 {
            return Err(self.invalid(&x));
        }

        Ok(x.into_dimensionality::<Ix4>()?)
    }

    fn matrix(&self, x: ArrayD<f32>) -> Result<Array2<f32>> {
        if x.ndim() != 2 {
            return Err(self.invalid(&x));
        }

        Ok(x.into_dimensionality::<Ix2>()?)
    }

    fn invalid(&self, x: &ArrayD<f32>) -> MlErr {
        MlErr::InvalidShape {
            layer: self.kind(),
            got: x.shape().to_vec(),
        }
    }
}

/// Reshapes `(batch, ...)` into `(batch, product(...))`.
fn flatten(x: ArrayD<f32>) -> Result<Array2<f32>> {
    let Some((&n, rest)) = x.shape().split_first() else {
        return Err(MlErr::InvalidShape {
            layer: "flatten",
            got: vec![],
        });
    };

    let features: usize = rest.iter().product();
    let x = x.as_standard_layout().into_owned();
    Ok(x.into_shape_with_order((n, features))?)
}

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;

    use super::*;

    #[test]
    fn flatten_keeps_batch_dimension() {
        let x = ArrayD::from_shape_vec(IxDyn(&[2, 3, 1, 1]), (0..6).map(|v| v as f32).collect())
            .unwrap();
        let y = Layer::Flatten.forward(x, Device::Cpu).unwrap();

        assert_eq!(y.shape(), &[2, 3]);
        assert_eq!(y[[1, 0]], 3.0);
    }

    #[test]
    fn spatial_layers_reject_flat_inputs() {
        let x = ArrayD::zeros(IxDyn(&[1, 512]));
        let err = Layer::AdaptiveAvgPool2d.forward(x, Device::Cpu).unwrap_err();

        assert!(matches!(
            err,
            MlErr::InvalidShape {
                layer: "adaptive_avg_pool2d",
                ..
            }
        ));
    }
}
