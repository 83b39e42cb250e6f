use std::{fs, path::PathBuf};

use crate::{
    Device, MlErr, Result,
    arch::{ArchSpec, Segment, SegmentBuilder, Side, SplitConfig, SplitPlan},
    weights::WeightStore,
};

/// Where a segment's weights and layout come from.
#[derive(Debug, Clone, Default)]
pub struct ModelSource {
    /// The safetensors file with the network's `state_dict`.
    pub weights: PathBuf,
    /// A JSON `SplitConfig`, the ResNet-18 split at 5 if absent.
    pub split: Option<PathBuf>,
    /// A JSON `ArchSpec` replacing the built-in architecture named by the split.
    pub arch: Option<PathBuf>,
}

impl ModelSource {
    /// Reads and validates the split plan this source describes.
    pub fn plan(&self) -> Result<SplitPlan> {
        let config = match &self.split {
            Some(path) => SplitConfig::from_json_file(path)?,
            None => SplitConfig::default(),
        };

        let arch = match &self.arch {
            Some(path) => ArchSpec::from_json_file(path)?,
            None => ArchSpec::by_name(&config.architecture).ok_or_else(|| {
                MlErr::ArchMismatch(format!("unknown architecture {}", config.architecture))
            })?,
        };

        SplitPlan::new(arch, &config)
    }
}

/// Loads the segment one side of the split runs.
///
/// # Arguments
/// * `source` - Where the weights and the split come from.
/// * `side` - The side to load.
/// * `device` - The device the segment runs on.
///
/// # Returns
/// The segment or the first error found validating the split or reading the weights.
pub fn load(source: &ModelSource, side: Side, device: Device) -> Result<Segment> {
    let plan = source.plan()?;
    log::info!(
        "splitting {} at child {} ({} boundary channels, {} classes)",
        plan.arch().name,
        plan.split_index(),
        plan.boundary_channels(),
        plan.num_classes()
    );

    let buffer = fs::read(&source.weights)?;
    let weights = WeightStore::new(&buffer)?;
    log::debug!(
        "read {} tensors from {}",
        weights.len(),
        source.weights.display()
    );

    SegmentBuilder::new(&plan, &weights).build(side, device)
}
