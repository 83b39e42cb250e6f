use std::sync::Arc;

use anyhow::Context;
use machine_learning::{
    Device,
    arch::{Segment, Side},
};

use crate::{classes::ClassTable, config::Config};

/// The read-only state every request handler shares.
#[derive(Clone)]
pub struct AppContext {
    segment: Arc<Segment>,
    classes: Arc<ClassTable>,
}

impl AppContext {
    /// Creates a new `AppContext`.
    ///
    /// Classes the segment can predict but the table doesn't label are logged once here
    /// and reported as lookup errors if they're ever predicted.
    ///
    /// # Arguments
    /// * `segment` - The server side of the split.
    /// * `classes` - The labels of the head's outputs.
    pub fn new(segment: Segment, classes: ClassTable) -> Self {
        let missing = classes.missing(segment.output_channels());
        if !missing.is_empty() {
            log::warn!(
                "{} of {} classes have no label, first is {}",
                missing.len(),
                segment.output_channels(),
                missing[0]
            );
        }

        Self {
            segment: Arc::new(segment),
            classes: Arc::new(classes),
        }
    }

    /// Selects the device and loads the server segment and the class table.
    ///
    /// # Arguments
    /// * `config` - The server configuration.
    ///
    /// # Returns
    /// The context or the first error loading the model or the classes.
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let device = Device::select(config.device);
        log::info!("using the {device} device");

        let segment = machine_learning::load(&config.model, Side::Server, device)
            .with_context(|| format!("failed to load {}", config.model.weights.display()))?;

        let classes = ClassTable::from_json_file(&config.class_index)
            .with_context(|| format!("failed to load {}", config.class_index.display()))?;

        log::info!(
            "serving {} classes on {} input channels",
            segment.output_channels(),
            segment.input_channels()
        );

        Ok(Self::new(segment, classes))
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }
}
