use ndarray::Array4;

use super::{BatchNorm2d, Conv2d, Relu};
use crate::{Device, MlErr, Result};

/// The 1x1 convolution and normalization applied to the shortcut when a block changes
/// the resolution or the channel count.
#[derive(Debug, Clone)]
pub struct Downsample {
    pub conv: Conv2d,
    pub bn: BatchNorm2d,
}

/// The two-convolution residual block of ResNet-18/34.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    conv1: Conv2d,
    bn1: BatchNorm2d,
    conv2: Conv2d,
    bn2: BatchNorm2d,
    downsample: Option<Downsample>,
}

impl BasicBlock {
    pub fn new(
        conv1: Conv2d,
        bn1: BatchNorm2d,
        conv2: Conv2d,
        bn2: BatchNorm2d,
        downsample: Option<Downsample>,
    ) -> Self {
        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            downsample,
        }
    }

    pub fn in_channels(&self) -> usize {
        self.conv1.in_channels()
    }

    pub fn out_channels(&self) -> usize {
        self.conv2.out_channels()
    }

    /// Computes `relu(bn2(conv2(relu(bn1(conv1(x))))) + shortcut(x))`.
    pub fn forward(&self, x: Array4<f32>, device: Device) -> Result<Array4<f32>> {
        let mut out = self.conv1.forward(x.view(), device)?;
        self.bn1.forward(&mut out)?;
        Relu.forward(&mut out);

        let mut out = self.conv2.forward(out.view(), device)?;
        self.bn2.forward(&mut out)?;

        let identity = match &self.downsample {
            Some(Downsample { conv, bn }) => {
                let mut shortcut = conv.forward(x.view(), device)?;
                bn.forward(&mut shortcut)?;
                shortcut
            }
            None => x,
        };

        if identity.dim() != out.dim() {
            return Err(MlErr::InvalidShape {
                layer: "basic_block shortcut",
                got: identity.shape().to_vec(),
            });
        }

        out += &identity;
        Relu.forward(&mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, array};

    use super::*;

    fn identity_bn(features: usize) -> BatchNorm2d {
        BatchNorm2d::new(
            Array1::ones(features),
            Array1::zeros(features),
            Array1::zeros(features),
            Array1::ones(features),
            0.0,
        )
        .unwrap()
    }

    fn scale_conv(channels: usize, value: f32) -> Conv2d {
        let mut w = Array4::zeros((channels, channels, 1, 1));
        for c in 0..channels {
            w[[c, c, 0, 0]] = value;
        }
        Conv2d::new(w, None, 1, 0).unwrap()
    }

    #[test]
    fn adds_the_identity_shortcut() {
        let block = BasicBlock::new(
            scale_conv(1, 2.0),
            identity_bn(1),
            scale_conv(1, 3.0),
            identity_bn(1),
            None,
        );

        let x = array![[[[1.0, -1.0]]]];
        let y = block.forward(x, Device::Cpu).unwrap();

        // relu(3 * relu(2 * x) + x)
        assert_eq!(y, array![[[[7.0, 0.0]]]]);
    }

    #[test]
    fn downsample_projects_the_shortcut() {
        let conv1 = Conv2d::new(Array4::ones((2, 1, 1, 1)), None, 2, 0).unwrap();
        let conv2 = scale_conv(2, 1.0);
        let shortcut = Conv2d::new(Array4::ones((2, 1, 1, 1)), None, 2, 0).unwrap();

        let block = BasicBlock::new(
            conv1,
            identity_bn(2),
            conv2,
            identity_bn(2),
            Some(Downsample {
                conv: shortcut,
                bn: identity_bn(2),
            }),
        );

        let x = Array4::from_elem((1, 1, 4, 4), 1.0);
        let y = block.forward(x, Device::Cpu).unwrap();

        assert_eq!(y.shape(), &[1, 2, 2, 2]);
        assert!(y.iter().all(|&v| v == 2.0));
    }
}
