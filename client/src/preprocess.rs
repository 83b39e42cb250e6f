use ndarray::{Array4, ArrayD};

use crate::error::{ClientErr, Result};

/// The side of the square images the pretrained network was trained on.
pub const IMAGE_SIZE: usize = 224;

/// The per-channel ImageNet mean, in RGB order.
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// The per-channel ImageNet standard deviation, in RGB order.
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turns interleaved RGB bytes into a normalized `1×3×H×W` tensor.
///
/// # Arguments
/// * `pixels` - The image, row by row, three bytes per pixel.
/// * `height` - The image height.
/// * `width` - The image width.
///
/// # Returns
/// The network input or an error if `pixels` doesn't hold `height * width` pixels.
pub fn normalize_rgb(pixels: &[u8], height: usize, width: usize) -> Result<ArrayD<f32>> {
    let expected = height * width * 3;
    if pixels.len() != expected {
        return Err(ClientErr::Image {
            got: pixels.len(),
            expected,
        });
    }

    let image = Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
        let value = pixels[(y * width + x) * 3 + c] as f32 / 255.0;
        (value - MEAN[c]) / STD[c]
    });

    Ok(image.into_dyn())
}
