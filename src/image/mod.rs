//! Image boundary types and range conversions.
//!
//! The crate consumes and produces 8-bit HWC pixel buffers while every tensor
//! fed to a backbone is NCHW. Conversions between the two layouts, and between
//! the unit `[0, 1]` and signed `[-1, 1]` value ranges, live here so the dual
//! range convention stays explicit instead of buried in a cast.

pub use burn::tensor::{backend::Backend, Tensor};

use crate::error::Error;
use burn::tensor::TensorData;

/// An 8-bit RGB image in `[H, W, 3]` layout.
///
/// Decoding, resizing and display belong to the caller; this type is the
/// narrow interface the core exchanges with them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Image {
    pub data: Vec<u8>,
    pub height: usize,
    pub width: usize,
}

impl Image {
    /// Wrap an 8-bit RGB pixel buffer.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Shape`] when the buffer length is not
    /// `height * width * 3`.
    pub fn new(
        data: Vec<u8>,
        height: usize,
        width: usize,
    ) -> Result<Self, Error> {
        if data.len() != height * width * 3 {
            return Err(Error::Shape(
                format!("The pixel buffer length {}", data.len()),
                format!("{} ({height} x {width} x 3)", height * width * 3),
            ));
        }
        Ok(Self {
            data,
            height,
            width,
        })
    }

    /// Convert into a `[0, 1]` tensor.
    ///
    /// ## Shapes
    ///
    /// * `output` - `[H, W, 3]`
    pub fn to_unit_tensor<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Tensor<B, 3> {
        let pixels = self
            .data
            .iter()
            .map(|&value| value as f32 / 255.0)
            .collect::<Vec<_>>();
        Tensor::from_data(
            TensorData::new(pixels, [self.height, self.width, 3]),
            device,
        )
    }

    /// Convert into a `[-1, 1]` tensor, the Inception-native range.
    ///
    /// ## Shapes
    ///
    /// * `output` - `[H, W, 3]`
    pub fn to_signed_tensor<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Tensor<B, 3> {
        self.to_unit_tensor(device).mul_scalar(2.0).sub_scalar(1.0)
    }

    /// Quantize a `[0, 1]` tensor to 8 bits.
    ///
    /// ## Shapes
    ///
    /// * `tensor` - `[H, W, 3]`
    pub fn from_unit_tensor<B: Backend>(tensor: Tensor<B, 3>) -> Self {
        let [height, width, _] = tensor.dims();
        let values = tensor
            .clamp(0.0, 1.0)
            .mul_scalar(255.0)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .expect("The data are converted to f32 above");
        let data = values.into_iter().map(|value| value.round() as u8).collect();
        Self {
            data,
            height,
            width,
        }
    }

    /// Quantize a `[-1, 1]` tensor to 8 bits: `(x + 1) / 2 * 255`.
    ///
    /// ## Shapes
    ///
    /// * `tensor` - `[H, W, 3]`
    pub fn from_signed_tensor<B: Backend>(tensor: Tensor<B, 3>) -> Self {
        Self::from_unit_tensor(tensor.add_scalar(1.0).div_scalar(2.0))
    }
}

/// Turn a single image into a network feed.
///
/// ## Shapes
///
/// * `image` - `[H, W, 3]`
/// * `output` - `[1, 3, H, W]`
pub fn into_feed<B: Backend>(image: Tensor<B, 3>) -> Tensor<B, 4> {
    image.permute([2, 0, 1]).unsqueeze()
}

/// Turn a single-image network feed back into an image.
///
/// ## Shapes
///
/// * `images` - `[1, 3, H, W]`
/// * `output` - `[H, W, 3]`
pub fn from_feed<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 3> {
    images.squeeze::<3>(0).permute([1, 2, 0])
}
