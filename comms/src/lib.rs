pub mod activation;
mod error;
pub mod msg;

pub use activation::{flatten, reconstruct};
pub use error::WireErr;
pub use msg::{ErrorKind, ErrorResponse, InferenceRequest, InferenceResponse, Order};

/// The route the server exposes for split inference requests.
pub const INFERENCE_ROUTE: &str = "/inference";
