pub mod arch;
mod device;
pub mod error;
mod loader;
mod prediction;
mod weights;

pub use device::{Device, DevicePreference, Tensor};
pub use error::{MlErr, Result};
pub use loader::{ModelSource, load};
pub use prediction::{Prediction, argmax, predict};
pub use weights::WeightStore;
