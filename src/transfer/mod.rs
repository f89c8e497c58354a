//! Neural style transfer.
//!
//! Synthesizes a canvas image whose intermediate features match fixed content
//! targets and whose gram matrices match fixed style targets, by Adam descent
//! on the canvas pixels against a frozen backbone.

pub mod canvas;

pub use crate::{
    backbone::Backbone,
    extract::{Extraction, FeatureExtractor},
    image::Image,
    loss::{LossEngine, LossMode, LossWeights},
};
pub use burn::{config::Config, tensor::backend::AutodiffBackend};
pub use canvas::Canvas;

use crate::{
    error::Error,
    function::gram_matrix,
    image::{from_feed, into_feed},
    loss::feature_loss,
    preset::{CONTENT_LAYER_NAMES_DEFAULT, STYLE_LAYER_NAMES_DEFAULT},
};
use burn::{
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::Backend, ElementConversion, Tensor},
};

/// The configuration for [`StyleTransfer`].
#[derive(Config, Debug)]
pub struct StyleTransferConfig {
    /// Loss term weights.
    pub weights: LossWeights,
    /// Optimization epoch count.
    #[config(default = 1000)]
    pub epochs: usize,
    /// Side length of the square canvas.
    #[config(default = 448)]
    pub image_size: usize,
    /// Adam learning rate.
    #[config(default = 2e-2)]
    pub learning_rate: f64,
    /// Adam first-moment decay.
    #[config(default = 0.99)]
    pub beta_1: f32,
    /// Adam epsilon.
    #[config(default = 0.1)]
    pub epsilon: f32,
    /// Snapshot the canvas every this many epochs; 0 disables snapshots.
    #[config(default = 20)]
    pub snapshot_interval: usize,
    /// Style tap names; the VGG-19 defaults when unset.
    pub style_layers: Option<Vec<String>>,
    /// Content tap names; the VGG-19 default when unset.
    pub content_layers: Option<Vec<String>>,
}

/// Fixed optimization targets, computed once and detached.
#[derive(Clone, Debug)]
pub struct Targets<B: Backend> {
    /// Content-layer feature maps of the content image.
    pub content: Vec<Tensor<B, 4>>,
    /// Style-layer gram matrices of the style image.
    pub style: Vec<Tensor<B, 3>>,
}

/// The style-transfer pipeline over a frozen backbone.
pub struct StyleTransfer<B: AutodiffBackend, M: Backbone<B>> {
    config: StyleTransferConfig,
    engine: LossEngine,
    extractor: FeatureExtractor<B, M>,
    style_layers: Vec<String>,
    device: B::Device,
}

impl<B: AutodiffBackend, M: Backbone<B>> StyleTransfer<B, M> {
    /// ## Errors
    ///
    /// Returns [`Error::UnknownLayer`] when a configured tap name is not
    /// part of the backbone.
    pub fn new(
        config: StyleTransferConfig,
        backbone: M,
        device: B::Device,
    ) -> Result<Self, Error> {
        let style_layers = config.style_layers.to_owned().unwrap_or_else(|| {
            STYLE_LAYER_NAMES_DEFAULT.map(String::from).to_vec()
        });
        let content_layers =
            config.content_layers.to_owned().unwrap_or_else(|| {
                CONTENT_LAYER_NAMES_DEFAULT.map(String::from).to_vec()
            });

        let extractor =
            FeatureExtractor::new(backbone, &style_layers, &content_layers)?;
        let engine = LossEngine::new(
            config.weights,
            style_layers.len(),
            content_layers.len(),
        );
        Ok(Self {
            config,
            engine,
            extractor,
            style_layers,
            device,
        })
    }

    /// Synthesize a canvas matching both style and content targets.
    ///
    /// ## Shapes
    ///
    /// * `style_image` - `[H', W', 3]` in `[0, 1]`, any size
    /// * `content_image` - `[S, S, 3]` in `[0, 1]`, the configured size
    /// * `output` - `[S, S, 3]` in `[0, 1]`
    pub fn transfer(
        &self,
        style_image: Tensor<B, 3>,
        content_image: Tensor<B, 3>,
    ) -> Result<Tensor<B, 3>, Error> {
        let targets = Targets {
            content: self.content_targets(content_image)?,
            style: self.style_targets(style_image)?,
        };
        let (canvas, _) = self.optimize(LossMode::Full, &targets)?;
        Ok(from_feed(canvas))
    }

    /// Reconstruct the content image from noise, driving the raw content
    /// loss only. Returns the 8-bit snapshot sequence.
    pub fn content_only(
        &self,
        content_image: Tensor<B, 3>,
    ) -> Result<Vec<Image>, Error> {
        let targets = Targets {
            content: self.content_targets(content_image)?,
            style: Vec::new(),
        };
        let (_, snapshots) =
            self.optimize(LossMode::ContentOnly, &targets)?;
        Ok(snapshots)
    }

    /// Paint the texture of one configured style layer from noise, driving
    /// the raw style loss only. Returns the 8-bit snapshot sequence.
    pub fn style_only(
        &self,
        style_image: Tensor<B, 3>,
        layer: &str,
    ) -> Result<Vec<Image>, Error> {
        let layer = self
            .style_layers
            .iter()
            .position(|name| name == layer)
            .ok_or_else(|| Error::UnknownLayer(layer.into()))?;
        let targets = Targets {
            content: Vec::new(),
            style: self.style_targets(style_image)?,
        };
        let (_, snapshots) =
            self.optimize(LossMode::StyleOnly { layer }, &targets)?;
        Ok(snapshots)
    }

    /// Extract and detach the content targets.
    ///
    /// The content image must match the configured canvas size, otherwise
    /// its feature maps could not be compared against the canvas's.
    pub fn content_targets(
        &self,
        content_image: Tensor<B, 3>,
    ) -> Result<Vec<Tensor<B, 4>>, Error> {
        let size = self.config.image_size;
        let dims = content_image.dims();
        if dims != [size, size, 3] {
            return Err(Error::Shape(
                format!("The content image dimensions {dims:?}"),
                format!("[{size}, {size}, 3]"),
            ));
        }

        let extraction = self.extractor.extract(into_feed(content_image))?;
        Ok(extraction
            .content
            .into_iter()
            .map(|features| features.detach())
            .collect())
    }

    /// Extract, gram and detach the style targets.
    ///
    /// Gram matrices are spatially invariant, so the style image may have
    /// any size.
    pub fn style_targets(
        &self,
        style_image: Tensor<B, 3>,
    ) -> Result<Vec<Tensor<B, 3>>, Error> {
        let extraction = self.extractor.extract(into_feed(style_image))?;
        Ok(extraction
            .style
            .into_iter()
            .map(|features| gram_matrix(features).detach())
            .collect())
    }

    /// Run the descent loop: extract, compare, step, clamp.
    ///
    /// Returns the final `[1, 3, S, S]` canvas and the snapshots taken
    /// along the way.
    pub fn optimize(
        &self,
        mode: LossMode,
        targets: &Targets<B>,
    ) -> Result<(Tensor<B, 4>, Vec<Image>), Error> {
        let mut canvas = Canvas::random(self.config.image_size, &self.device);
        let mut optimizer = AdamConfig::new()
            .with_beta_1(self.config.beta_1)
            .with_epsilon(self.config.epsilon)
            .init();
        let mut snapshots = Vec::new();

        for epoch in 1..=self.config.epochs {
            let loss = self.step_loss(mode, &canvas, targets)?;

            let value = loss.to_owned().into_scalar().elem::<f64>();
            if !value.is_finite() {
                return Err(Error::Numerical(format!(
                    "The loss {value} of the gradient step \
                    at epoch {epoch} is not finite"
                )));
            }

            let gradients =
                GradientsParams::from_grads(loss.backward(), &canvas);
            canvas = optimizer.step(self.config.learning_rate, canvas, gradients);
            canvas = canvas.clamped(0.0, 1.0);

            if epoch % 100 == 0 {
                log::info!(
                    target: "dreamcanvas::transfer",
                    "epoch {epoch}/{}: loss = {value}",
                    self.config.epochs,
                );
            }
            if self.config.snapshot_interval != 0
                && epoch % self.config.snapshot_interval == 0
            {
                snapshots.push(Image::from_unit_tensor(from_feed(
                    canvas.image.val(),
                )));
            }
        }

        Ok((canvas.image.val(), snapshots))
    }

    fn step_loss(
        &self,
        mode: LossMode,
        canvas: &Canvas<B>,
        targets: &Targets<B>,
    ) -> Result<Tensor<B, 1>, Error> {
        let extraction = self.extractor.extract(canvas.image.val())?;
        match mode {
            LossMode::ContentOnly => self
                .engine
                .content_loss(&extraction.content, &targets.content),
            LossMode::StyleOnly { layer } => {
                let output = extraction.style.get(layer).ok_or_else(|| {
                    Error::Shape(
                        format!("The style layer index {layer}"),
                        format!("less than {}", extraction.style.len()),
                    )
                })?;
                let target = targets.style.get(layer).ok_or_else(|| {
                    Error::Shape(
                        format!("The style layer index {layer}"),
                        format!("less than {}", targets.style.len()),
                    )
                })?;
                feature_loss(
                    &[gram_matrix(output.to_owned())],
                    &[target.to_owned()],
                )
            },
            LossMode::Full => {
                let style = extraction
                    .style
                    .iter()
                    .map(|features| gram_matrix(features.to_owned()))
                    .collect::<Vec<_>>();
                let breakdown = self.engine.total(
                    canvas.image.val(),
                    &style,
                    &targets.style,
                    &extraction.content,
                    &targets.content,
                )?;
                Ok(breakdown.total)
            },
        }
    }
}
