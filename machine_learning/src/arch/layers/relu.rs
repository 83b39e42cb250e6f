use ndarray::{ArrayBase, DataMut, Dimension};

/// The rectified linear unit, applied in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct Relu;

impl Relu {
    pub fn forward<S, D>(&self, x: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = f32>,
        D: Dimension,
    {
        x.mapv_inplace(|v| v.max(0.0));
    }
}
