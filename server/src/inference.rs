use std::time::Instant;

use comms::{InferenceRequest, InferenceResponse};
use machine_learning::{MlErr, Tensor, predict};

use crate::{context::AppContext, error::ServiceErr};

/// Finishes the forward pass of a split activation and labels every sample.
///
/// # Arguments
/// * `ctx` - The loaded model and classes.
/// * `body` - The raw JSON body of the request.
///
/// # Returns
/// The predicted labels or the error to report back to the client.
pub fn infer(ctx: &AppContext, body: &[u8]) -> Result<InferenceResponse, ServiceErr> {
    let start = Instant::now();
    let request = InferenceRequest::from_slice(body)?;
    let activation = request.into_activation()?;
    ctx.segment()
        .check_input(activation.shape())
        .map_err(ServiceErr::Shape)?;
    log::debug!(
        "parsed a {:?} activation in {:?}",
        activation.shape(),
        start.elapsed()
    );

    let start = Instant::now();
    let segment = ctx.segment();
    let scores = segment.scores(Tensor::new(activation).to(segment.device()))?;
    let predictions = predict(scores.view())?;

    let labels = predictions
        .iter()
        .map(|p| ctx.classes().lookup(p.index).map(|l| l.name().to_string()))
        .collect::<Result<Vec<_>, _>>()?;

    let elapsed = start.elapsed();
    log::info!(
        batch = labels.len(), elapsed:? = elapsed;
        "output class: {}, inference time: {elapsed:?}",
        labels.join(", ")
    );

    InferenceResponse::from_labels(labels).ok_or(ServiceErr::Model(MlErr::EmptyScores {
        sample: 0,
    }))
}
