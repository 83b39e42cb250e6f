use ndarray::ArrayD;

use super::layers::Layer;
use crate::{Device, Result};

/// An ordered run of named layers: information flows from the first to the last.
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    layers: Vec<(String, Layer)>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of, each with the name of the
    ///   architecture child it comes from.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = (String, Layer)>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the names of the layers, in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|(name, _)| name.as_str())
    }

    /// Makes a forward pass through every layer.
    ///
    /// # Arguments
    /// * `x` - The input data.
    /// * `device` - The device the layers run on.
    ///
    /// # Returns
    /// The output of the last layer or the first error a layer raised.
    pub fn forward(&self, mut x: ArrayD<f32>, device: Device) -> Result<ArrayD<f32>> {
        for (name, layer) in &self.layers {
            log::trace!("{name}: {:?} -> {}", x.shape(), layer.kind());
            x = layer.forward(x, device)?;
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{IxDyn, array};

    use super::*;
    use crate::arch::layers::Dense;

    #[test]
    fn runs_layers_in_order() {
        let dense = Dense::new(array![[1.0, -1.0]], array![0.0]).unwrap();
        let seq = Sequential::new([
            ("relu".to_string(), Layer::Relu),
            ("flatten".to_string(), Layer::Flatten),
            ("fc".to_string(), Layer::Dense(dense)),
        ]);

        let x = ArrayD::from_shape_vec(IxDyn(&[1, 2, 1, 1]), vec![3.0, -5.0]).unwrap();
        let y = seq.forward(x, Device::Cpu).unwrap();

        // relu drops the -5 before the head subtracts it
        assert_eq!(y.shape(), &[1, 1]);
        assert_eq!(y[[0, 0]], 3.0);
        assert_eq!(seq.names().collect::<Vec<_>>(), ["relu", "flatten", "fc"]);
    }
}
