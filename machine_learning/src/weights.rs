use bytemuck::allocation::pod_collect_to_vec;
use half::{bf16, f16};
use ndarray::{Array1, Array2, Array4, ArrayD, Ix1, Ix2, Ix4, IxDyn};
use safetensors::{Dtype, SafeTensorError, SafeTensors};

use crate::{MlErr, Result};

/// Read-only access to the tensors of a safetensors buffer, converted to `f32`.
///
/// Data is assumed little-endian, which is what PyTorch writes.
pub struct WeightStore<'data> {
    tensors: SafeTensors<'data>,
}

impl<'data> WeightStore<'data> {
    /// Parses the header of a safetensors buffer.
    ///
    /// # Arguments
    /// * `buffer` - The whole contents of a `.safetensors` file.
    ///
    /// # Returns
    /// A new `WeightStore` or an error if the header is invalid.
    pub fn new(buffer: &'data [u8]) -> Result<Self> {
        Ok(Self {
            tensors: SafeTensors::deserialize(buffer)?,
        })
    }

    /// Returns the amount of tensors in the buffer.
    pub fn len(&self) -> usize {
        self.tensors.names().len()
    }

    /// Reads the tensor `name`, checking it has the `expected` shape.
    ///
    /// # Arguments
    /// * `name` - The `state_dict` name of the tensor.
    /// * `expected` - The shape the architecture needs.
    ///
    /// # Returns
    /// The tensor's values, or an error if it's missing, has another shape or an
    /// unsupported dtype.
    pub fn tensor(&self, name: &str, expected: &[usize]) -> Result<ArrayD<f32>> {
        let view = self.tensors.tensor(name).map_err(|e| match e {
            SafeTensorError::TensorNotFound(_) => MlErr::MissingTensor {
                name: name.to_string(),
            },
            e => e.into(),
        })?;

        if view.shape() != expected {
            return Err(MlErr::TensorShape {
                name: name.to_string(),
                got: view.shape().to_vec(),
                expected: expected.to_vec(),
            });
        }

        let bytes = view.data();
        let values: Vec<f32> = match view.dtype() {
            Dtype::F32 => pod_collect_to_vec(bytes),
            Dtype::F64 => pod_collect_to_vec::<u8, f64>(bytes)
                .into_iter()
                .map(|v| v as f32)
                .collect(),
            Dtype::F16 => pod_collect_to_vec::<u8, f16>(bytes)
                .into_iter()
                .map(f16::to_f32)
                .collect(),
            Dtype::BF16 => pod_collect_to_vec::<u8, bf16>(bytes)
                .into_iter()
                .map(bf16::to_f32)
                .collect(),
            other => {
                return Err(MlErr::UnsupportedDtype {
                    name: name.to_string(),
                    dtype: format!("{other:?}"),
                });
            }
        };

        Ok(ArrayD::from_shape_vec(IxDyn(expected), values)?)
    }

    pub fn tensor1(&self, name: &str, len: usize) -> Result<Array1<f32>> {
        Ok(self.tensor(name, &[len])?.into_dimensionality::<Ix1>()?)
    }

    pub fn tensor2(&self, name: &str, shape: [usize; 2]) -> Result<Array2<f32>> {
        Ok(self.tensor(name, &shape)?.into_dimensionality::<Ix2>()?)
    }

    pub fn tensor4(&self, name: &str, shape: [usize; 4]) -> Result<Array4<f32>> {
        Ok(self.tensor(name, &shape)?.into_dimensionality::<Ix4>()?)
    }
}
