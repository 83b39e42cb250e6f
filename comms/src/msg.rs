//! The JSON bodies exchanged between the client runner and the inference server.

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::{WireErr, activation, error::Result};

/// The order in which a tensor's elements were laid out in the flat payload.
///
/// Both ends must agree on it, otherwise the server silently classifies a scrambled
/// activation. It travels with every request and defaults to row-major when omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    /// The last dimension varies fastest (C order).
    #[default]
    RowMajor,
    /// The first dimension varies fastest (Fortran order).
    ColumnMajor,
}

/// A split activation sent by the client for the server to finish the forward pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub data: Vec<f32>,
    pub dims: Vec<usize>,
    #[serde(default)]
    pub order: Order,
}

impl InferenceRequest {
    /// Decodes a request from a raw JSON body.
    ///
    /// # Arguments
    /// * `body` - The raw request body.
    ///
    /// # Returns
    /// The decoded request or `WireErr::Malformed` if the body is not valid JSON or
    /// `data`/`dims` are missing.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Builds a request out of an activation tensor.
    ///
    /// # Arguments
    /// * `activation` - The output of the client segment.
    /// * `order` - The order to flatten the activation in.
    ///
    /// # Returns
    /// A new `InferenceRequest` instance.
    pub fn from_activation(activation: &ArrayD<f32>, order: Order) -> Self {
        let (data, dims) = activation::flatten(activation, order);
        Self { data, dims, order }
    }

    /// Rebuilds the activation tensor this request carries.
    ///
    /// # Returns
    /// A standard layout array with shape `dims` or a `WireErr` if the shape is invalid
    /// or doesn't match the payload length.
    pub fn into_activation(self) -> Result<ArrayD<f32>> {
        activation::reconstruct(self.data, &self.dims, self.order)
    }
}

/// The successful answer to an `InferenceRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResponse {
    /// The label of the first sample in the batch.
    pub class: String,
    /// One label per sample, only present for batches of more than one sample.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,
}

impl InferenceResponse {
    /// Creates a new `InferenceResponse` out of the labels of every sample in a batch.
    ///
    /// # Returns
    /// `None` if `labels` is empty.
    pub fn from_labels(mut labels: Vec<String>) -> Option<Self> {
        let class = labels.first()?.clone();
        if labels.len() == 1 {
            labels.clear();
        }

        Some(Self {
            class,
            classes: labels,
        })
    }
}

/// Every failure category the server reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedRequest,
    ShapeMismatch,
    DeviceError,
    LookupError,
    ModelError,
}

/// The body of every non-success response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorKind,
    pub message: String,
}

impl WireErr {
    /// The category this error is reported as.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WireErr::Malformed(_) | WireErr::InvalidDims { .. } | WireErr::NonFinite { .. } => {
                ErrorKind::MalformedRequest
            }
            WireErr::ShapeMismatch { .. } => ErrorKind::ShapeMismatch,
        }
    }
}
