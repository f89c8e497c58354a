//! Frozen convolutional backbones.

pub mod inception;
#[cfg(test)]
pub mod stub;
pub mod vgg;

pub use burn::tensor::{backend::Backend, Tensor};
pub use inception::*;
pub use vgg::*;

use crate::error::Error;

/// A frozen pretrained network exposed as an ordered set of named
/// activation taps.
///
/// Implementations never update their weights. They are read-only feature
/// extractors, shareable across any number of concurrent calls.
pub trait Backbone<B: Backend> {
    /// Ordered names of the activation taps.
    fn layer_names(&self) -> &'static [&'static str];

    /// Convert `[0, 1]` RGB images into the network's native input range.
    ///
    /// ## Shapes
    ///
    /// * `images` - `[B, 3, H, W]`
    fn preprocess(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4>;

    /// Compute the first `depth` named activations, in
    /// [`Self::layer_names`] order.
    ///
    /// Layers beyond `depth` are never evaluated, so shallow taps stay
    /// reachable on images too small for the full trunk.
    ///
    /// ## Shapes
    ///
    /// * `images` - `[B, 3, H, W]` in the native range
    fn features(
        &self,
        images: Tensor<B, 4>,
        depth: usize,
    ) -> Vec<Tensor<B, 4>>;
}

/// Resolve requested tap names into indices of the backbone's tap list.
///
/// ## Errors
///
/// Returns [`Error::UnknownLayer`] for the first name that is not part of
/// `names`, so misconfiguration fails at construction rather than at
/// first use.
pub fn resolve_layer_indices(
    names: &[&str],
    requested: &[impl AsRef<str>],
) -> Result<Vec<usize>, Error> {
    requested
        .iter()
        .map(|name| {
            let name = name.as_ref();
            names
                .iter()
                .position(|&known| known == name)
                .ok_or_else(|| Error::UnknownLayer(name.into()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #[test]
    fn resolve_layer_indices_in_request_order() {
        use super::*;

        let names = ["mixed0", "mixed1", "mixed2"];
        let indices =
            resolve_layer_indices(&names, &["mixed2", "mixed0"]).unwrap();
        assert_eq!(indices, vec![2, 0]);
    }

    #[test]
    fn resolve_layer_indices_fails_fast() {
        use super::*;

        let names = ["mixed0", "mixed1"];
        let result = resolve_layer_indices(&names, &["mixed0", "mixed9"]);
        assert!(
            matches!(result, Err(Error::UnknownLayer(name)) if name == "mixed9")
        );
    }
}
