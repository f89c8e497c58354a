//! Deep-dream activation maximization.
//!
//! Climbs the mean activation of selected backbone taps by gradient ascent
//! on the image pixels, amplifying whatever patterns those taps respond to.

pub use crate::{backbone::Backbone, image::Image};
pub use burn::{config::Config, tensor::backend::AutodiffBackend};

use crate::{
    backbone::resolve_layer_indices,
    error::Error,
    function::standard_deviation,
    image::{from_feed, into_feed},
    preset::DREAM_LAYER_NAMES_DEFAULT,
};
use burn::tensor::{ElementConversion, Tensor};

/// The configuration for [`Dreamer`].
#[derive(Config, Debug)]
pub struct DreamerConfig {
    /// Ascent step count.
    #[config(default = 100)]
    pub steps: usize,
    /// Ascent step size, applied to the normalized gradient.
    #[config(default = 1e-2)]
    pub step_size: f64,
    /// Tap names to maximize; the Inception defaults when unset.
    pub layers: Option<Vec<String>>,
}

/// The deep-dream pipeline over a frozen backbone.
pub struct Dreamer<B: AutodiffBackend, M: Backbone<B>> {
    backbone: M,
    config: DreamerConfig,
    depth: usize,
    device: B::Device,
    indices: Vec<usize>,
}

impl<B: AutodiffBackend, M: Backbone<B>> Dreamer<B, M> {
    /// ## Errors
    ///
    /// Returns [`Error::UnknownLayer`] when a configured tap name is not
    /// part of the backbone, and [`Error::Shape`] when the tap list is
    /// empty.
    pub fn new(
        config: DreamerConfig,
        backbone: M,
        device: B::Device,
    ) -> Result<Self, Error> {
        let layers = config.layers.to_owned().unwrap_or_else(|| {
            DREAM_LAYER_NAMES_DEFAULT.map(String::from).to_vec()
        });
        if layers.is_empty() {
            return Err(Error::Shape(
                "The dream layer count 0".into(),
                "at least 1".into(),
            ));
        }
        let indices = resolve_layer_indices(backbone.layer_names(), &layers)?;
        // the backbone never runs past the deepest requested tap
        let depth = indices.iter().max().map_or(0, |&index| index + 1);

        Ok(Self {
            backbone,
            config,
            depth,
            device,
            indices,
        })
    }

    /// Amplify the configured taps on an 8-bit image.
    ///
    /// The input is mapped into the backbone's native range through its own
    /// preprocessing; the ascent clamp and the output rescale assume that
    /// range is `[-1, 1]`.
    pub fn generate(
        &self,
        image: &Image,
    ) -> Result<Image, Error> {
        let images = into_feed(image.to_unit_tensor::<B>(&self.device));
        let canvas = self.ascend(self.backbone.preprocess(images))?;

        Ok(Image::from_signed_tensor(from_feed(canvas)))
    }

    /// Mean activation of the configured taps, summed over taps.
    ///
    /// The images are already in the backbone's native range; preprocessing
    /// happens once before the ascent loop, not per step.
    ///
    /// ## Shapes
    ///
    /// * `images` - `[1, 3, H, W]` in `[-1, 1]`
    /// * `output` - `[1]`
    pub fn mean_activation(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        let features = self.backbone.features(images, self.depth);
        self.indices
            .iter()
            .map(|&index| features[index].to_owned().mean())
            .reduce(|sum, mean| sum + mean)
            .expect("The tap list is never empty")
    }

    /// Run the ascent loop: activate, normalize the gradient, step, clamp.
    ///
    /// ## Shapes
    ///
    /// * `canvas` - `[1, 3, H, W]` in `[-1, 1]`
    /// * `output` - `[1, 3, H, W]` in `[-1, 1]`
    pub fn ascend(
        &self,
        mut canvas: Tensor<B, 4>,
    ) -> Result<Tensor<B, 4>, Error> {
        for step in 1..=self.config.steps {
            canvas = canvas.detach().require_grad();
            let loss = self.mean_activation(canvas.to_owned());

            let value = loss.to_owned().into_scalar().elem::<f64>();
            if !value.is_finite() {
                return Err(Error::Numerical(format!(
                    "The activation loss {value} of the ascent step \
                    {step} is not finite"
                )));
            }

            let mut gradients = loss.backward();
            let gradient =
                canvas.grad_remove(&mut gradients).ok_or_else(|| {
                    Error::Numerical(format!(
                        "The canvas has no gradient at the ascent step {step}"
                    ))
                })?;

            // Division by the standard deviation keeps step magnitudes
            // comparable across taps with very different activation scales.
            let scale = standard_deviation(gradient.to_owned())
                .into_scalar()
                .elem::<f64>();
            let gradient = gradient.div_scalar(scale + 1e-8);

            canvas = Tensor::from_inner(
                (canvas.inner() + gradient.mul_scalar(self.config.step_size))
                    .clamp(-1.0, 1.0),
            );

            log::debug!(
                target: "dreamcanvas::dream",
                "step {step}/{}: activation = {value}",
                self.config.steps,
            );
        }

        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backbone::stub::StubBackbone;
    use burn::backend::{Autodiff, NdArray};

    type B = Autodiff<NdArray<f32>>;

    fn stub_dreamer(config: DreamerConfig) -> Dreamer<B, StubBackbone<B>> {
        let device = Default::default();
        Dreamer::new(
            config.with_layers(Some(vec!["conv".into()])),
            StubBackbone::init(&device),
            device,
        )
        .unwrap()
    }

    #[test]
    fn activation_trend_is_non_decreasing() {
        use burn::tensor::{backend::Backend, Distribution};

        <B as Backend>::seed(0);
        let dreamer = stub_dreamer(DreamerConfig::new().with_steps(1));

        let mut canvas = Tensor::<B, 4>::random(
            [1, 3, 8, 8],
            Distribution::Uniform(-0.5, 0.5),
            &Default::default(),
        );
        let mut activations = Vec::new();
        for _ in 0..10 {
            activations
                .push(dreamer.mean_activation(canvas.to_owned()).into_scalar());
            canvas = dreamer.ascend(canvas).unwrap();
        }
        activations.push(dreamer.mean_activation(canvas).into_scalar());

        // clamping may stall a step, so allow a couple of dips
        let decreases = activations
            .windows(2)
            .filter(|pair| pair[1] < pair[0])
            .count();
        assert!(
            decreases <= 2,
            "activations should climb: {activations:?}"
        );
    }

    #[test]
    fn ascent_keeps_the_canvas_in_the_signed_range() {
        use burn::tensor::{backend::Backend, Distribution};

        <B as Backend>::seed(1);
        let dreamer =
            stub_dreamer(DreamerConfig::new().with_steps(1).with_step_size(0.5));

        let mut canvas = Tensor::<B, 4>::random(
            [1, 3, 6, 6],
            Distribution::Uniform(-1.0, 1.0),
            &Default::default(),
        );
        // the clip must hold after every step, not only the last
        for _ in 0..20 {
            canvas = dreamer.ascend(canvas).unwrap();
            assert!(canvas.to_owned().min().into_scalar() >= -1.0);
            assert!(canvas.to_owned().max().into_scalar() <= 1.0);
        }

        assert_eq!(canvas.dims(), [1, 3, 6, 6]);
    }

    #[test]
    fn generate_preserves_the_image_size() {
        use burn::tensor::backend::Backend;

        <B as Backend>::seed(2);
        let dreamer = stub_dreamer(DreamerConfig::new().with_steps(3));

        let pixels = (0..5 * 7 * 3).map(|value| value as u8).collect();
        let image = Image::new(pixels, 5, 7).unwrap();
        let dreamed = dreamer.generate(&image).unwrap();

        assert_eq!(dreamed.height, 5);
        assert_eq!(dreamed.width, 7);
        assert_eq!(dreamed.data.len(), 5 * 7 * 3);
    }

    #[test]
    fn generate_round_trips_through_the_native_range() {
        use burn::tensor::backend::Backend;

        const TAP_NAMES: [&str; 1] = ["tap"];

        // an identity backbone whose native range is [-1, 1]
        #[derive(Debug)]
        struct SignedIdentity;

        impl<B: Backend> Backbone<B> for SignedIdentity {
            fn layer_names(&self) -> &'static [&'static str] {
                &TAP_NAMES
            }

            fn preprocess(
                &self,
                images: Tensor<B, 4>,
            ) -> Tensor<B, 4> {
                images.mul_scalar(2.0).sub_scalar(1.0)
            }

            fn features(
                &self,
                images: Tensor<B, 4>,
                depth: usize,
            ) -> Vec<Tensor<B, 4>> {
                let mut taps = Vec::new();
                if depth > 0 {
                    taps.push(images);
                }
                taps
            }
        }

        let dreamer = Dreamer::<B, _>::new(
            DreamerConfig::new()
                .with_steps(0)
                .with_layers(Some(vec!["tap".into()])),
            SignedIdentity,
            Default::default(),
        )
        .unwrap();

        // with no steps, preprocessing and the output rescale must cancel
        let image = Image::new(vec![0, 64, 128, 192, 255, 30], 1, 2).unwrap();
        assert_eq!(dreamer.generate(&image).unwrap(), image);
    }

    #[test]
    fn unknown_layer_is_rejected() {
        let device = Default::default();
        let result = Dreamer::<B, _>::new(
            DreamerConfig::new().with_layers(Some(vec!["missing".into()])),
            StubBackbone::init(&device),
            device,
        );
        assert!(matches!(result, Err(Error::UnknownLayer(..))));
    }

    #[test]
    fn empty_layer_list_is_rejected() {
        let device = Default::default();
        let result = Dreamer::<B, _>::new(
            DreamerConfig::new().with_layers(Some(Vec::new())),
            StubBackbone::init(&device),
            device,
        );
        assert!(matches!(result, Err(Error::Shape(..))));
    }
}
