//! Conversions between a split activation and its flat wire representation.

use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::{Order, WireErr, error::Result};

/// Computes how many elements a tensor of shape `dims` holds.
///
/// # Returns
/// The product of `dims` or `WireErr::InvalidDims` if `dims` is empty, holds a zero or
/// the product overflows.
pub fn element_count(dims: &[usize]) -> Result<usize> {
    let invalid = || WireErr::InvalidDims {
        dims: dims.to_vec(),
    };

    if dims.is_empty() || dims.contains(&0) {
        return Err(invalid());
    }

    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(invalid)
}

/// Rebuilds a tensor out of a flat payload.
///
/// # Arguments
/// * `data` - The flat payload.
/// * `dims` - The shape of the tensor.
/// * `order` - The order the payload was flattened in.
///
/// # Returns
/// A standard (row-major) layout array of shape `dims`, or an error if the shape is
/// invalid, `data` doesn't hold exactly `product(dims)` elements or one of them isn't
/// finite.
pub fn reconstruct(data: Vec<f32>, dims: &[usize], order: Order) -> Result<ArrayD<f32>> {
    let expected = element_count(dims)?;
    let got = data.len();
    if got != expected {
        return Err(WireErr::ShapeMismatch { got, expected });
    }

    if let Some(index) = data.iter().position(|v| !v.is_finite()) {
        return Err(WireErr::NonFinite { index });
    }

    let mismatch = |_| WireErr::ShapeMismatch { got, expected };
    let shape = IxDyn(dims);

    match order {
        Order::RowMajor => ArrayD::from_shape_vec(shape, data).map_err(mismatch),
        Order::ColumnMajor => {
            let array = ArrayD::from_shape_vec(shape.f(), data).map_err(mismatch)?;
            Ok(array.as_standard_layout().into_owned())
        }
    }
}

/// Flattens a tensor into its wire representation.
///
/// # Arguments
/// * `array` - The tensor to flatten.
/// * `order` - The order to lay the elements out in.
///
/// # Returns
/// The flat payload and the shape descriptor.
pub fn flatten(array: &ArrayD<f32>, order: Order) -> (Vec<f32>, Vec<usize>) {
    let dims = array.shape().to_vec();
    let data = match order {
        Order::RowMajor => array.iter().copied().collect(),
        // Reversing the axes makes a logical row-major walk visit the first axis fastest.
        Order::ColumnMajor => array.t().iter().copied().collect(),
    };

    (data, dims)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn iota(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32).collect()
    }

    #[test]
    fn row_major_reconstruction_puts_last_dim_fastest() {
        let a = reconstruct(iota(6), &[2, 3], Order::RowMajor).unwrap();
        assert_eq!(a, array![[0., 1., 2.], [3., 4., 5.]].into_dyn());
    }

    #[test]
    fn column_major_reconstruction_puts_first_dim_fastest() {
        let a = reconstruct(iota(6), &[2, 3], Order::ColumnMajor).unwrap();
        assert_eq!(a, array![[0., 2., 4.], [1., 3., 5.]].into_dyn());
        assert!(a.is_standard_layout());
    }

    #[test]
    fn reconstruct_then_flatten_reproduces_payload() {
        let shapes: [&[usize]; 4] = [&[7], &[1, 512, 1, 1], &[2, 3, 4], &[1, 4, 3, 5]];

        for dims in shapes {
            for order in [Order::RowMajor, Order::ColumnMajor] {
                let n = element_count(dims).unwrap();
                let data = iota(n);
                let a = reconstruct(data.clone(), dims, order).unwrap();
                let (flat, back_dims) = flatten(&a, order);
                assert_eq!(flat, data, "dims {dims:?} order {order:?}");
                assert_eq!(back_dims, dims);
            }
        }
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let err = reconstruct(iota(511), &[1, 512, 1, 1], Order::RowMajor).unwrap_err();
        assert!(matches!(
            err,
            WireErr::ShapeMismatch {
                got: 511,
                expected: 512
            }
        ));
    }

    #[test]
    fn zero_and_empty_dims_are_invalid() {
        assert!(matches!(
            reconstruct(vec![], &[], Order::RowMajor),
            Err(WireErr::InvalidDims { .. })
        ));
        assert!(matches!(
            reconstruct(vec![], &[1, 0, 3], Order::RowMajor),
            Err(WireErr::InvalidDims { .. })
        ));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut data = iota(4);
        data[2] = f32::INFINITY;
        let err = reconstruct(data, &[1, 4], Order::RowMajor).unwrap_err();
        assert!(matches!(err, WireErr::NonFinite { index: 2 }));

        let err = reconstruct(vec![f32::NAN], &[1], Order::ColumnMajor).unwrap_err();
        assert!(matches!(err, WireErr::NonFinite { index: 0 }));
    }

    #[test]
    fn overflowing_dims_are_invalid() {
        let err = element_count(&[usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, WireErr::InvalidDims { .. }));
    }
}
