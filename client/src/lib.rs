pub mod error;
pub mod preprocess;
mod split_client;

pub use error::{ClientErr, Result};
pub use preprocess::normalize_rgb;
pub use split_client::SplitClient;
