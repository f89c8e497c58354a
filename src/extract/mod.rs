//! Feature extraction from frozen backbones.

pub use crate::backbone::{resolve_layer_indices, Backbone};
pub use burn::tensor::{backend::Backend, Tensor};

use crate::error::Error;
use std::{fmt, marker::PhantomData};

/// Ordered activations of one extraction.
#[derive(Clone, Debug)]
pub struct Extraction<B: Backend> {
    /// Raw style-layer feature maps, in the configured order.
    pub style: Vec<Tensor<B, 4>>,
    /// Raw content-layer feature maps, in the configured order.
    pub content: Vec<Tensor<B, 4>>,
}

/// Maps `[0, 1]` image batches to the activations of configured
/// backbone taps.
///
/// Tap names are resolved to indices at construction, so an unknown name
/// fails here rather than at first use, and live extractions stay aligned
/// positionally with target extractions.
#[derive(Clone)]
pub struct FeatureExtractor<B: Backend, M: Backbone<B>> {
    backbone: M,
    style_indices: Vec<usize>,
    content_indices: Vec<usize>,
    depth: usize,
    marker: PhantomData<B>,
}

impl<B: Backend, M: Backbone<B>> fmt::Debug for FeatureExtractor<B, M> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("style_indices", &self.style_indices)
            .field("content_indices", &self.content_indices)
            .field("depth", &self.depth)
            .finish()
    }
}

impl<B: Backend, M: Backbone<B>> FeatureExtractor<B, M> {
    /// ## Errors
    ///
    /// Returns [`Error::UnknownLayer`] when a requested tap name is not part
    /// of the backbone.
    pub fn new(
        backbone: M,
        style_layers: &[impl AsRef<str>],
        content_layers: &[impl AsRef<str>],
    ) -> Result<Self, Error> {
        let names = backbone.layer_names();
        let style_indices = resolve_layer_indices(names, style_layers)?;
        let content_indices = resolve_layer_indices(names, content_layers)?;
        // the backbone never runs past the deepest requested tap
        let depth = style_indices
            .iter()
            .chain(&content_indices)
            .max()
            .map_or(0, |&index| index + 1);
        Ok(Self {
            backbone,
            style_indices,
            content_indices,
            depth,
            marker: PhantomData,
        })
    }

    pub fn backbone(&self) -> &M {
        &self.backbone
    }

    pub fn style_layer_count(&self) -> usize {
        self.style_indices.len()
    }

    pub fn content_layer_count(&self) -> usize {
        self.content_indices.len()
    }

    /// Extract the configured activations from a `[0, 1]` image batch.
    ///
    /// The backbone's preprocessing is applied internally; its weights are
    /// never touched.
    ///
    /// ## Shapes
    ///
    /// * `images` - `[B, 3, H, W]`
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Shape`] when the batch does not have 3 channels.
    pub fn extract(
        &self,
        images: Tensor<B, 4>,
    ) -> Result<Extraction<B>, Error> {
        let channels = images.dims()[1];
        if channels != 3 {
            return Err(Error::Shape(
                format!("The input channel count {channels}"),
                "3".into(),
            ));
        }

        let features = self
            .backbone
            .features(self.backbone.preprocess(images), self.depth);
        Ok(Extraction {
            style: self
                .style_indices
                .iter()
                .map(|&index| features[index].to_owned())
                .collect(),
            content: self
                .content_indices
                .iter()
                .map(|&index| features[index].to_owned())
                .collect(),
        })
    }
}
