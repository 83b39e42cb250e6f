use std::sync::Arc;

use comms::{ErrorResponse, INFERENCE_ROUTE, InferenceRequest, InferenceResponse, Order};
use machine_learning::{Tensor, arch::Segment};
use ndarray::ArrayD;
use tokio::task;

use crate::error::{ClientErr, Result};

/// Runs the client side of the split and asks the server to finish it.
pub struct SplitClient {
    http: reqwest::Client,
    url: String,
    segment: Arc<Segment>,
    order: Order,
}

impl SplitClient {
    /// Creates a new `SplitClient`.
    ///
    /// # Arguments
    /// * `server_url` - The base url of the inference server, like `http://localhost:5000`.
    /// * `segment` - The client side of the split.
    pub fn new(server_url: &str, segment: Segment) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: format!("{}{INFERENCE_ROUTE}", server_url.trim_end_matches('/')),
            segment: Arc::new(segment),
            order: Order::default(),
        }
    }

    /// Sets the order the activation is flattened in.
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Classifies a preprocessed image.
    ///
    /// # Arguments
    /// * `image` - The network input, shaped `N×3×H×W`.
    ///
    /// # Returns
    /// The server's answer, or the error raised locally or reported by the server.
    pub async fn infer(&self, image: ArrayD<f32>) -> Result<InferenceResponse> {
        let segment = Arc::clone(&self.segment);
        let input = Tensor::new(image).to(segment.device());
        let activation = task::spawn_blocking(move || segment.forward(input)).await??;
        log::debug!("split activation of shape {:?}", activation.shape());

        let request = InferenceRequest::from_activation(activation.array(), self.order);
        let response = self.http.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let bytes = response.bytes().await?;
        let status = status.as_u16();
        match serde_json::from_slice::<ErrorResponse>(&bytes) {
            Ok(body) => Err(ClientErr::Server { status, body }),
            Err(_) => Err(ClientErr::Status {
                status,
                text: String::from_utf8_lossy(&bytes).into_owned(),
            }),
        }
    }
}
