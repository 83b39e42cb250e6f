mod builder;
pub mod layers;
mod segment;
mod sequential;
pub mod specs;
mod split;

pub use builder::SegmentBuilder;
pub use segment::Segment;
pub use sequential::Sequential;
pub use specs::{ArchSpec, BlockSpec, ChildSpec, LayerSpec};
pub use split::{HeadConfig, Side, SplitConfig, SplitPlan};
