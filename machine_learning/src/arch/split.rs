use std::{fmt, fs, path::Path};

use serde::{Deserialize, Serialize};

use super::specs::{ArchSpec, ChildSpec};
use crate::{MlErr, Result};

/// One of the two execution sites of a split network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Runs `children[..split_index]` on the raw image.
    Client,
    /// Runs `children[split_index..]` on the activation and produces the scores.
    Server,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Client => write!(f, "client"),
            Side::Server => write!(f, "server"),
        }
    }
}

/// The classification head closing the server segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadConfig {
    pub child: String,
    /// Inserts a flatten step right before the head, since pooling emits `N×C×1×1`.
    #[serde(default = "flatten_by_default")]
    pub flatten: bool,
}

fn flatten_by_default() -> bool {
    true
}

/// Where a network is split and what the server side is expected to contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub architecture: String,
    pub split_index: usize,
    #[serde(default)]
    pub server_children: Option<Vec<String>>,
    pub head: HeadConfig,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            architecture: "resnet18".to_string(),
            split_index: 5,
            server_children: Some(
                ["layer2", "layer3", "layer4", "avgpool", "fc"]
                    .map(String::from)
                    .to_vec(),
            ),
            head: HeadConfig {
                child: "fc".to_string(),
                flatten: true,
            },
        }
    }
}

impl SplitConfig {
    /// Reads a split configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The path of the file.
    ///
    /// # Returns
    /// The configuration or an io or parsing error.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// A split configuration checked against the architecture it splits.
#[derive(Debug, Clone)]
pub struct SplitPlan {
    arch: ArchSpec,
    split_index: usize,
    flatten_head: bool,
    boundary_channels: usize,
    num_classes: usize,
}

impl SplitPlan {
    /// Validates `config` against `arch`.
    ///
    /// # Arguments
    /// * `arch` - The architecture to split.
    /// * `config` - Where to split it.
    ///
    /// # Returns
    /// The plan, or an `ArchMismatch` if the names, split index, server children, head or
    /// channel counts don't line up.
    pub fn new(arch: ArchSpec, config: &SplitConfig) -> Result<Self> {
        let mismatch = |msg: String| Err(MlErr::ArchMismatch(msg));

        if arch.name != config.architecture {
            return mismatch(format!(
                "the split targets {} but the architecture is {}",
                config.architecture, arch.name
            ));
        }

        let split = config.split_index;
        let total = arch.children.len();
        if split == 0 || split >= total {
            return mismatch(format!(
                "split index {split} leaves one side of {} empty ({total} children)",
                arch.name
            ));
        }

        let server: Vec<&str> = arch.children[split..]
            .iter()
            .map(|child| child.name.as_str())
            .collect();

        if let Some(expected) = &config.server_children
            && server != *expected
        {
            return mismatch(format!(
                "expected server children {expected:?} but splitting at {split} gives {server:?}"
            ));
        }

        let Some(last) = arch.children.last() else {
            return mismatch(format!("{} has no children", arch.name));
        };

        if last.name != config.head.child {
            return mismatch(format!(
                "the head {} is not the last child, {} is",
                config.head.child, last.name
            ));
        }

        if !last.layer.is_linear() {
            return mismatch(format!("the head {} is not a linear layer", last.name));
        }

        let chain = arch.channel_chain()?;

        Ok(Self {
            boundary_channels: chain[split],
            num_classes: chain[total],
            split_index: split,
            flatten_head: config.head.flatten,
            arch,
        })
    }

    pub fn arch(&self) -> &ArchSpec {
        &self.arch
    }

    pub fn split_index(&self) -> usize {
        self.split_index
    }

    pub fn flatten_head(&self) -> bool {
        self.flatten_head
    }

    /// The channel count of the activation sent from the client to the server.
    pub fn boundary_channels(&self) -> usize {
        self.boundary_channels
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Returns the children evaluated on `side`.
    pub fn children(&self, side: Side) -> &[ChildSpec] {
        match side {
            Side::Client => &self.arch.children[..self.split_index],
            Side::Server => &self.arch.children[self.split_index..],
        }
    }

    /// The channel count `side` takes as input.
    pub fn input_channels(&self, side: Side) -> usize {
        match side {
            Side::Client => self.arch.input_channels,
            Side::Server => self.boundary_channels,
        }
    }

    /// The channel count (or class count) `side` emits.
    pub fn output_channels(&self, side: Side) -> usize {
        match side {
            Side::Client => self.boundary_channels,
            Side::Server => self.num_classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_split_is_valid_for_resnet18() {
        let plan = SplitPlan::new(ArchSpec::resnet18(), &SplitConfig::default()).unwrap();

        assert_eq!(plan.boundary_channels(), 64);
        assert_eq!(plan.num_classes(), 1000);
        assert_eq!(plan.children(Side::Client).len(), 5);
        assert_eq!(plan.children(Side::Server)[0].name, "layer2");
        assert_eq!(plan.input_channels(Side::Server), 64);
        assert_eq!(plan.output_channels(Side::Client), 64);
    }

    #[test]
    fn wrong_server_children_fail_fast() {
        let config = SplitConfig {
            split_index: 6,
            ..SplitConfig::default()
        };

        let err = SplitPlan::new(ArchSpec::resnet18(), &config).unwrap_err();
        assert!(matches!(err, MlErr::ArchMismatch(_)));
    }

    #[test]
    fn other_architecture_is_rejected() {
        let err = SplitPlan::new(ArchSpec::resnet34(), &SplitConfig::default()).unwrap_err();
        assert!(matches!(err, MlErr::ArchMismatch(msg) if msg.contains("resnet34")));
    }

    #[test]
    fn split_index_must_leave_both_sides_non_empty() {
        for split_index in [0, 10] {
            let config = SplitConfig {
                split_index,
                server_children: None,
                ..SplitConfig::default()
            };

            assert!(SplitPlan::new(ArchSpec::resnet18(), &config).is_err());
        }
    }

    #[test]
    fn head_must_be_the_last_linear_child() {
        let config = SplitConfig {
            head: HeadConfig {
                child: "avgpool".to_string(),
                flatten: true,
            },
            ..SplitConfig::default()
        };

        assert!(SplitPlan::new(ArchSpec::resnet18(), &config).is_err());
    }

    #[test]
    fn parses_config_with_defaults() {
        let json = r#"{ "architecture": "resnet18", "split_index": 7, "head": { "child": "fc" } }"#;
        let config: SplitConfig = serde_json::from_str(json).unwrap();

        assert!(config.head.flatten);
        assert_eq!(config.server_children, None);

        let plan = SplitPlan::new(ArchSpec::resnet18(), &config).unwrap();
        assert_eq!(plan.boundary_channels(), 256);
    }
}
