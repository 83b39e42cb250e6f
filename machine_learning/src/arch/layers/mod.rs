mod avg_pool;
mod basic_block;
mod batch_norm;
mod conv;
mod dense;
mod layer;
mod max_pool;
mod relu;

pub use avg_pool::AdaptiveAvgPool2d;
pub use basic_block::{BasicBlock, Downsample};
pub use batch_norm::BatchNorm2d;
pub use conv::Conv2d;
pub use dense::Dense;
pub use layer::Layer;
pub use max_pool::MaxPool2d;
pub use relu::Relu;
