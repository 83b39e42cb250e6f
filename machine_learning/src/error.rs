use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use safetensors::SafeTensorError;

use crate::Device;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidShape {
        layer: &'static str,
        got: Vec<usize>,
    },
    DeviceMismatch {
        expected: Device,
        got: Device,
    },
    ArchMismatch(String),
    MissingTensor {
        name: String,
    },
    TensorShape {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    UnsupportedDtype {
        name: String,
        dtype: String,
    },
    EmptyScores {
        sample: usize,
    },
    Shape(ShapeError),
    Weights(SafeTensorError),
    Config(serde_json::Error),
    ThreadPool(rayon::ThreadPoolBuildError),
    Io(io::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::InvalidShape { layer, got } => {
                write!(f, "The {layer} layer can't take an input of shape {got:?}")
            }
            MlErr::DeviceMismatch { expected, got } => write!(
                f,
                "The input tensor lives on the {got} device but the segment runs on {expected}"
            ),
            MlErr::ArchMismatch(msg) => write!(f, "The split doesn't match the architecture: {msg}"),
            MlErr::MissingTensor { name } => {
                write!(f, "The weights file has no tensor named {name}")
            }
            MlErr::TensorShape {
                name,
                got,
                expected,
            } => write!(
                f,
                "The tensor {name} has shape {got:?} but the architecture expects {expected:?}"
            ),
            MlErr::UnsupportedDtype { name, dtype } => {
                write!(f, "The tensor {name} has the unsupported dtype {dtype}")
            }
            MlErr::EmptyScores { sample } => {
                write!(f, "The scores of sample {sample} hold no comparable value")
            }
            MlErr::Shape(e) => write!(f, "Failed to reshape a tensor: {e}"),
            MlErr::Weights(e) => write!(f, "Failed to read the weights: {e}"),
            MlErr::Config(e) => write!(f, "Failed to parse the model config: {e}"),
            MlErr::ThreadPool(e) => write!(f, "Failed to start the thread pool: {e}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Weights(e) => Some(e),
            MlErr::Config(e) => Some(e),
            MlErr::ThreadPool(e) => Some(e),
            MlErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<SafeTensorError> for MlErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Weights(value)
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value)
    }
}

impl From<rayon::ThreadPoolBuildError> for MlErr {
    fn from(value: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(value)
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
