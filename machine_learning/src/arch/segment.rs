use ndarray::{Array2, Ix2};

use super::{Sequential, Side};
use crate::{
    Device, MlErr, Result,
    device::{Executor, Tensor},
};

/// The immutable, evaluation-only layers one side of a split runs.
pub struct Segment {
    side: Side,
    input_channels: usize,
    output_channels: usize,
    sequential: Sequential,
    executor: Executor,
}

impl Segment {
    /// Creates a new `Segment`.
    ///
    /// # Arguments
    /// * `side` - The side of the split this segment runs.
    /// * `input_channels` - The channels of the tensors it takes.
    /// * `output_channels` - The channels it emits, the class count for the server side.
    /// * `sequential` - Its layers.
    /// * `device` - The device every forward pass runs on.
    ///
    /// # Returns
    /// A new `Segment` or an error if the device couldn't be started.
    pub fn new(
        side: Side,
        input_channels: usize,
        output_channels: usize,
        sequential: Sequential,
        device: Device,
    ) -> Result<Self> {
        Ok(Self {
            side,
            input_channels,
            output_channels,
            sequential,
            executor: Executor::new(device)?,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn device(&self) -> Device {
        self.executor.device()
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn layer_names(&self) -> impl Iterator<Item = &str> {
        self.sequential.names()
    }

    /// Checks that an activation of shape `dims` can go through this segment.
    ///
    /// # Arguments
    /// * `dims` - The shape of the incoming activation.
    ///
    /// # Returns
    /// An error if `dims` isn't `N×C×H×W` with the channel count this segment expects.
    pub fn check_input(&self, dims: &[usize]) -> Result<()> {
        let &[_, channels, _, _] = dims else {
            return Err(MlErr::InvalidShape {
                layer: "segment input",
                got: dims.to_vec(),
            });
        };

        if channels != self.input_channels {
            return Err(MlErr::SizeMismatch {
                what: "activation channels",
                got: channels,
                expected: self.input_channels,
            });
        }

        Ok(())
    }

    /// Makes a forward pass through the whole segment.
    ///
    /// # Arguments
    /// * `x` - The input, which must already live on this segment's device.
    ///
    /// # Returns
    /// The output, on the same device, or an error if the input lives elsewhere or has the
    /// wrong shape.
    pub fn forward(&self, x: Tensor) -> Result<Tensor> {
        let device = self.device();
        if x.device() != device {
            return Err(MlErr::DeviceMismatch {
                expected: device,
                got: x.device(),
            });
        }

        let x = x.into_array();
        let y = self
            .executor
            .run(|| self.sequential.forward(x, device))?;

        Ok(Tensor::new(y).to(device))
    }

    /// Runs the segment and returns its output as a `batch × classes` score matrix.
    ///
    /// # Arguments
    /// * `x` - The input, which must already live on this segment's device.
    ///
    /// # Returns
    /// The scores or an error if the segment doesn't end in a classification head.
    pub fn scores(&self, x: Tensor) -> Result<Array2<f32>> {
        let y = self.forward(x)?.into_array();
        if y.ndim() != 2 || y.shape()[1] != self.output_channels {
            return Err(MlErr::InvalidShape {
                layer: "segment output",
                got: y.shape().to_vec(),
            });
        }

        Ok(y.into_dimensionality::<Ix2>()?)
    }
}
