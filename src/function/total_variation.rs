//! Total variation.

pub use super::*;

/// Compute the anisotropic total variation of an image batch,
/// the summed absolute differences between neighboring pixels.
///
/// A smoothness penalty discouraging high-frequency noise artifacts.
///
/// ## Shapes
///
/// * `images` - `[B, C, H, W]` with `H, W >= 2`
/// * `output` - `[1]`
pub fn total_variation<B: Backend>(images: Tensor<B, 4>) -> Tensor<B, 1> {
    let [_, _, h, w] = images.dims();
    // [B, C, H - 1, W]
    let vertical = images.to_owned().narrow(2, 1, h - 1)
        - images.to_owned().narrow(2, 0, h - 1);
    // [B, C, H, W - 1]
    let horizontal =
        images.to_owned().narrow(3, 1, w - 1) - images.narrow(3, 0, w - 1);
    vertical.abs().sum() + horizontal.abs().sum()
}
