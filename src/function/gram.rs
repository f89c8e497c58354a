//! Gram matrix.

pub use super::*;

/// Compute the gram matrix of a feature map.
///
/// `F * F^T / (H * W)` where `F` flattens the spatial locations of each channel.
/// The result captures cross-channel co-occurrence statistics regardless of
/// the spatial arrangement.
///
/// ## Shapes
///
/// * `features` - `[B, C, H, W]`
/// * `output` - `[B, C, C]`
pub fn gram_matrix<B: Backend>(features: Tensor<B, 4>) -> Tensor<B, 3> {
    let [b, c, h, w] = features.dims();
    // [B, C, H * W]
    let features = features.reshape([b, c, h * w]);
    let matrix = features.to_owned().matmul(features.swap_dims(1, 2));
    matrix.div_scalar((h * w) as f32)
}
