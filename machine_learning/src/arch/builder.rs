use super::{
    Segment, Sequential, Side, SplitPlan,
    layers::{BasicBlock, BatchNorm2d, Conv2d, Dense, Downsample, Layer, MaxPool2d},
    specs::{BlockSpec, ChildSpec, LayerSpec},
};
use crate::{Device, Result, weights::WeightStore};

const BASIC_BLOCK_EPS: f32 = 1e-5;

/// Builds `Segment`s for one side of a split plan, reading the tensors by their PyTorch
/// `state_dict` names.
pub struct SegmentBuilder<'a, 'data> {
    plan: &'a SplitPlan,
    weights: &'a WeightStore<'data>,
}

impl<'a, 'data> SegmentBuilder<'a, 'data> {
    /// Creates a new `SegmentBuilder`.
    ///
    /// # Arguments
    /// * `plan` - The validated split.
    /// * `weights` - Where the tensors are read from.
    pub fn new(plan: &'a SplitPlan, weights: &'a WeightStore<'data>) -> Self {
        Self { plan, weights }
    }

    /// Builds the segment `side` runs.
    ///
    /// # Arguments
    /// * `side` - The side of the split.
    /// * `device` - The device the segment runs on.
    ///
    /// # Returns
    /// The segment or an error if a tensor is missing, has the wrong shape or dtype.
    pub fn build(&self, side: Side, device: Device) -> Result<Segment> {
        let children = self.plan.children(side);
        let mut layers = Vec::with_capacity(children.len() + 1);

        for child in children {
            if child.layer.is_linear() && self.plan.flatten_head() {
                layers.push(("flatten".to_string(), Layer::Flatten));
            }

            layers.push((child.name.clone(), self.resolve_layer(child)?));
        }

        let sequential = Sequential::new(layers);
        log::info!(
            "built the {side} segment of {}: {}",
            self.plan.arch().name,
            sequential.names().collect::<Vec<_>>().join(" -> ")
        );

        Segment::new(
            side,
            self.plan.input_channels(side),
            self.plan.output_channels(side),
            sequential,
            device,
        )
    }

    fn resolve_layer(&self, child: &ChildSpec) -> Result<Layer> {
        let prefix = child.name.as_str();

        let layer = match child.layer {
            LayerSpec::Conv2d {
                in_channels,
                out_channels,
                kernel_size,
                stride,
                padding,
                bias,
            } => Layer::Conv2d(self.resolve_conv(
                prefix,
                [out_channels, in_channels, kernel_size, kernel_size],
                stride,
                padding,
                bias,
            )?),
            LayerSpec::BatchNorm2d { features, eps } => {
                Layer::BatchNorm2d(self.resolve_batch_norm(prefix, features, eps)?)
            }
            LayerSpec::Relu => Layer::Relu,
            LayerSpec::MaxPool2d {
                kernel_size,
                stride,
                padding,
            } => Layer::MaxPool2d(MaxPool2d::new(kernel_size, stride, padding)),
            LayerSpec::Stage { ref blocks } => {
                let blocks = blocks
                    .iter()
                    .enumerate()
                    .map(|(i, spec)| self.resolve_block(&format!("{prefix}.{i}"), spec))
                    .collect::<Result<_>>()?;

                Layer::Stage(blocks)
            }
            LayerSpec::AdaptiveAvgPool2d => Layer::AdaptiveAvgPool2d,
            LayerSpec::Linear {
                in_features,
                out_features,
            } => {
                let weight = self
                    .weights
                    .tensor2(&format!("{prefix}.weight"), [out_features, in_features])?;
                let bias = self
                    .weights
                    .tensor1(&format!("{prefix}.bias"), out_features)?;

                Layer::Dense(Dense::new(weight, bias)?)
            }
        };

        Ok(layer)
    }

    fn resolve_conv(
        &self,
        prefix: &str,
        shape: [usize; 4],
        stride: usize,
        padding: usize,
        bias: bool,
    ) -> Result<Conv2d> {
        let weight = self.weights.tensor4(&format!("{prefix}.weight"), shape)?;
        let bias = match bias {
            true => Some(self.weights.tensor1(&format!("{prefix}.bias"), shape[0])?),
            false => None,
        };

        Conv2d::new(weight, bias, stride, padding)
    }

    fn resolve_batch_norm(&self, prefix: &str, features: usize, eps: f32) -> Result<BatchNorm2d> {
        let [weight, bias, running_mean, running_var] =
            ["weight", "bias", "running_mean", "running_var"]
                .map(|name| self.weights.tensor1(&format!("{prefix}.{name}"), features));

        BatchNorm2d::new(weight?, bias?, running_mean?, running_var?, eps)
    }

    fn resolve_block(&self, prefix: &str, spec: &BlockSpec) -> Result<BasicBlock> {
        let BlockSpec {
            in_channels: cin,
            out_channels: cout,
            stride,
        } = *spec;

        let conv1 = self.resolve_conv(
            &format!("{prefix}.conv1"),
            [cout, cin, 3, 3],
            stride,
            1,
            false,
        )?;
        let bn1 = self.resolve_batch_norm(&format!("{prefix}.bn1"), cout, BASIC_BLOCK_EPS)?;
        let conv2 = self.resolve_conv(
            &format!("{prefix}.conv2"),
            [cout, cout, 3, 3],
            1,
            1,
            false,
        )?;
        let bn2 = self.resolve_batch_norm(&format!("{prefix}.bn2"), cout, BASIC_BLOCK_EPS)?;

        let downsample = if spec.has_downsample() {
            Some(Downsample {
                conv: self.resolve_conv(
                    &format!("{prefix}.downsample.0"),
                    [cout, cin, 1, 1],
                    stride,
                    0,
                    false,
                )?,
                bn: self.resolve_batch_norm(
                    &format!("{prefix}.downsample.1"),
                    cout,
                    BASIC_BLOCK_EPS,
                )?,
            })
        } else {
            None
        };

        Ok(BasicBlock::new(conv1, bn1, conv2, bn2, downsample))
    }
}
