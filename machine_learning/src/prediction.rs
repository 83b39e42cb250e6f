use ndarray::{ArrayView1, ArrayView2};

use crate::{MlErr, Result};

/// The winning class of one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub score: f32,
}

/// Finds the index of the highest score.
///
/// Ties go to the lowest index and NaN scores are skipped.
///
/// # Arguments
/// * `scores` - One sample's class scores.
///
/// # Returns
/// The prediction, or `None` if there's no comparable score.
pub fn argmax(scores: ArrayView1<f32>) -> Option<Prediction> {
    let mut best: Option<Prediction> = None;

    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }

        match best {
            Some(b) if score <= b.score => {}
            _ => best = Some(Prediction { index, score }),
        }
    }

    best
}

/// Takes the argmax of every row of a `batch × classes` score matrix.
///
/// # Arguments
/// * `scores` - The output of a classification head.
///
/// # Returns
/// One prediction per sample, or an error naming the first sample with no comparable score.
pub fn predict(scores: ArrayView2<f32>) -> Result<Vec<Prediction>> {
    scores
        .outer_iter()
        .enumerate()
        .map(|(sample, row)| argmax(row).ok_or(MlErr::EmptyScores { sample }))
        .collect()
}
