use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The specification of one residual basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub stride: usize,
}

impl BlockSpec {
    /// Whether the shortcut needs a projection to match the block's output.
    pub fn has_downsample(&self) -> bool {
        self.stride != 1 || self.in_channels != self.out_channels
    }
}

/// The specification for the `Layer` enum, as it appears among an architecture's children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d {
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        bias: bool,
    },
    BatchNorm2d {
        features: usize,
        eps: f32,
    },
    Relu,
    MaxPool2d {
        kernel_size: usize,
        stride: usize,
        padding: usize,
    },
    Stage {
        blocks: Vec<BlockSpec>,
    },
    AdaptiveAvgPool2d,
    Linear {
        in_features: usize,
        out_features: usize,
    },
}

impl LayerSpec {
    /// Computes the channel count this layer emits when fed `channels` channels.
    ///
    /// # Arguments
    /// * `channels` - The channels coming out of the previous child.
    ///
    /// # Returns
    /// The output channels (output features for a linear layer), or `None` if the layer
    /// can't take that many channels.
    pub fn out_channels(&self, channels: usize) -> Option<usize> {
        match *self {
            LayerSpec::Conv2d {
                in_channels,
                out_channels,
                ..
            } => (in_channels == channels).then_some(out_channels),
            LayerSpec::BatchNorm2d { features, .. } => (features == channels).then_some(channels),
            LayerSpec::Relu | LayerSpec::MaxPool2d { .. } | LayerSpec::AdaptiveAvgPool2d => {
                Some(channels)
            }
            LayerSpec::Stage { ref blocks } => {
                if blocks.is_empty() {
                    return None;
                }

                blocks.iter().try_fold(channels, |c, block| {
                    (block.in_channels == c).then_some(block.out_channels)
                })
            }
            LayerSpec::Linear {
                in_features,
                out_features,
            } => (in_features == channels).then_some(out_features),
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, LayerSpec::Linear { .. })
    }
}

/// A named top-level child of an architecture, like torchvision's `model.named_children()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildSpec {
    pub name: String,
    pub layer: LayerSpec,
}

impl ChildSpec {
    fn new(name: &str, layer: LayerSpec) -> Self {
        Self {
            name: name.to_string(),
            layer,
        }
    }
}

/// The specification of a whole network as an ordered list of named children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchSpec {
    pub name: String,
    pub input_channels: usize,
    pub children: Vec<ChildSpec>,
}

const BATCH_NORM_EPS: f32 = 1e-5;
const RESNET_WIDTHS: [usize; 4] = [64, 128, 256, 512];

impl ArchSpec {
    /// The torchvision ResNet-18 layout for 1000 ImageNet classes.
    pub fn resnet18() -> Self {
        Self::resnet("resnet18", [2, 2, 2, 2])
    }

    /// The torchvision ResNet-34 layout for 1000 ImageNet classes.
    pub fn resnet34() -> Self {
        Self::resnet("resnet34", [3, 4, 6, 3])
    }

    fn resnet(name: &str, depths: [usize; 4]) -> Self {
        let mut children = vec![
            ChildSpec::new(
                "conv1",
                LayerSpec::Conv2d {
                    in_channels: 3,
                    out_channels: 64,
                    kernel_size: 7,
                    stride: 2,
                    padding: 3,
                    bias: false,
                },
            ),
            ChildSpec::new(
                "bn1",
                LayerSpec::BatchNorm2d {
                    features: 64,
                    eps: BATCH_NORM_EPS,
                },
            ),
            ChildSpec::new("relu", LayerSpec::Relu),
            ChildSpec::new(
                "maxpool",
                LayerSpec::MaxPool2d {
                    kernel_size: 3,
                    stride: 2,
                    padding: 1,
                },
            ),
        ];

        let mut channels = 64;
        for (i, (depth, width)) in depths.into_iter().zip(RESNET_WIDTHS).enumerate() {
            let stride = if i == 0 { 1 } else { 2 };
            let blocks = (0..depth)
                .map(|b| {
                    let block = BlockSpec {
                        in_channels: channels,
                        out_channels: width,
                        stride: if b == 0 { stride } else { 1 },
                    };
                    channels = width;
                    block
                })
                .collect();

            children.push(ChildSpec::new(
                &format!("layer{}", i + 1),
                LayerSpec::Stage { blocks },
            ));
        }

        children.push(ChildSpec::new("avgpool", LayerSpec::AdaptiveAvgPool2d));
        children.push(ChildSpec::new(
            "fc",
            LayerSpec::Linear {
                in_features: channels,
                out_features: 1000,
            },
        ));

        Self {
            name: name.to_string(),
            input_channels: 3,
            children,
        }
    }

    /// Looks up one of the built-in architectures.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "resnet18" => Some(Self::resnet18()),
            "resnet34" => Some(Self::resnet34()),
            _ => None,
        }
    }

    /// Reads an architecture from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The path of the file.
    ///
    /// # Returns
    /// The architecture or an io or parsing error.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|child| child.name.as_str())
    }

    /// Walks the children checking that every one accepts what the previous one emits.
    ///
    /// # Returns
    /// The channels entering each child followed by the channels leaving the last one,
    /// or an `ArchMismatch` naming the first child that breaks the chain.
    pub fn channel_chain(&self) -> Result<Vec<usize>> {
        let mut chain = Vec::with_capacity(self.children.len() + 1);
        let mut channels = self.input_channels;
        chain.push(channels);

        for child in &self.children {
            channels = child.layer.out_channels(channels).ok_or_else(|| {
                MlErr::ArchMismatch(format!(
                    "child {} of {} can't take {channels} input channels",
                    child.name, self.name
                ))
            })?;
            chain.push(channels);
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resnet18_has_torchvision_children() {
        let arch = ArchSpec::resnet18();
        let names: Vec<_> = arch.child_names().collect();

        assert_eq!(
            names,
            [
                "conv1", "bn1", "relu", "maxpool", "layer1", "layer2", "layer3", "layer4",
                "avgpool", "fc"
            ]
        );
        assert_eq!(arch.channel_chain().unwrap(), [3, 64, 64, 64, 64, 64, 128, 256, 512, 512, 1000]);
    }

    #[test]
    fn only_the_first_block_of_a_later_stage_downsamples() {
        let arch = ArchSpec::resnet34();
        let LayerSpec::Stage { blocks } = &arch.children[5].layer else {
            panic!("layer2 should be a stage");
        };

        assert_eq!(blocks.len(), 4);
        assert!(blocks[0].has_downsample());
        assert_eq!(blocks[0].stride, 2);
        assert!(blocks[1..].iter().all(|b| !b.has_downsample()));

        let LayerSpec::Stage { blocks } = &arch.children[4].layer else {
            panic!("layer1 should be a stage");
        };
        assert!(!blocks[0].has_downsample());
    }

    #[test]
    fn broken_channel_chain_is_reported() {
        let mut arch = ArchSpec::resnet18();
        arch.children[9].layer = LayerSpec::Linear {
            in_features: 256,
            out_features: 10,
        };

        let err = arch.channel_chain().unwrap_err();
        assert!(matches!(err, MlErr::ArchMismatch(msg) if msg.contains("fc")));
    }

    #[test]
    fn parses_json_architectures() {
        let json = r#"{
            "name": "tiny",
            "input_channels": 2,
            "children": [
                { "name": "relu", "layer": "relu" },
                { "name": "avgpool", "layer": "adaptive_avg_pool2d" },
                { "name": "fc", "layer": { "linear": { "in_features": 2, "out_features": 3 } } }
            ]
        }"#;

        let arch: ArchSpec = serde_json::from_str(json).unwrap();
        assert_eq!(arch.channel_chain().unwrap(), [2, 2, 2, 3]);
    }
}
