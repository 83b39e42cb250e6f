use std::{error::Error, fmt};

/// The result type used across the wire contract.
pub type Result<T> = std::result::Result<T, WireErr>;

/// Failures found while decoding a request or rebuilding its activation.
#[derive(Debug)]
pub enum WireErr {
    /// The body is not valid JSON or a required field is missing.
    Malformed(serde_json::Error),
    /// The shape descriptor is empty, holds a zero or overflows when multiplied.
    InvalidDims { dims: Vec<usize> },
    /// The payload does not hold exactly `product(dims)` elements.
    ShapeMismatch { got: usize, expected: usize },
    /// The payload holds a NaN or an infinity, e.g. a number too large for an `f32`.
    NonFinite { index: usize },
}

impl fmt::Display for WireErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireErr::Malformed(e) => write!(f, "malformed request body: {e}"),
            WireErr::InvalidDims { dims } => write!(
                f,
                "invalid dims {dims:?}, expected a non-empty list of positive integers"
            ),
            WireErr::ShapeMismatch { got, expected } => write!(
                f,
                "data holds {got} elements but dims describe {expected}"
            ),
            WireErr::NonFinite { index } => {
                write!(f, "data[{index}] is not a finite 32-bit float")
            }
        }
    }
}

impl Error for WireErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WireErr::Malformed(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for WireErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Malformed(value)
    }
}
