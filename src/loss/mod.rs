//! Loss engine for canvas optimization.

pub use crate::function::*;
pub use burn::config::Config;

use crate::error::Error;

/// Scalar weights of the combined transfer loss.
#[derive(Config, Copy, Debug)]
pub struct LossWeights {
    /// Style term weight.
    #[config(default = 1e-1)]
    pub style: f64,
    /// Content term weight.
    #[config(default = 1e3)]
    pub content: f64,
    /// Total variation term weight.
    #[config(default = 1e-6)]
    pub total_variation: f64,
}

impl Default for LossWeights {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

/// Which terms drive the optimizer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LossMode {
    /// Content reconstruction only, unweighted.
    ContentOnly,
    /// One style layer only, unweighted. The index points into the
    /// configured style layer list.
    StyleOnly { layer: usize },
    /// The full weighted combination of style, content and total variation.
    Full,
}

/// The weighted loss and its components.
#[derive(Clone, Debug)]
pub struct LossBreakdown<B: Backend> {
    pub total: Tensor<B, 1>,
    pub style: Tensor<B, 1>,
    pub content: Tensor<B, 1>,
    pub total_variation: Tensor<B, 1>,
}

/// Sum of per-layer mean squared errors between positionally
/// paired tensors.
///
/// ## Errors
///
/// Returns [`Error::Shape`] when the sequences differ in length, are empty,
/// or a pair differs in dimensions.
pub fn feature_loss<B: Backend, const D: usize>(
    outputs: &[Tensor<B, D>],
    targets: &[Tensor<B, D>],
) -> Result<Tensor<B, 1>, Error> {
    if outputs.len() != targets.len() {
        return Err(Error::Shape(
            format!("The output layer count {}", outputs.len()),
            format!("the target layer count {}", targets.len()),
        ));
    }
    let device = match outputs.first() {
        Some(output) => output.device(),
        None => {
            return Err(Error::Shape(
                "The layer count 0".into(),
                "at least 1".into(),
            ))
        },
    };

    let mut loss = Tensor::zeros([1], &device);
    for (output, target) in outputs.iter().zip(targets) {
        if output.dims() != target.dims() {
            return Err(Error::Shape(
                format!("The output dimensions {:?}", output.dims()),
                format!("the target dimensions {:?}", target.dims()),
            ));
        }
        loss = loss
            + (output.to_owned() - target.to_owned())
                .powf_scalar(2.0)
                .mean();
    }
    Ok(loss)
}

/// Computes the loss terms and their weighted combination.
#[derive(Clone, Copy, Debug)]
pub struct LossEngine {
    pub weights: LossWeights,
    pub style_layer_count: usize,
    pub content_layer_count: usize,
}

impl LossEngine {
    pub fn new(
        weights: LossWeights,
        style_layer_count: usize,
        content_layer_count: usize,
    ) -> Self {
        Self {
            weights,
            style_layer_count,
            content_layer_count,
        }
    }

    /// Mean squared error between live and target content features,
    /// summed across layers.
    pub fn content_loss<B: Backend>(
        &self,
        outputs: &[Tensor<B, 4>],
        targets: &[Tensor<B, 4>],
    ) -> Result<Tensor<B, 1>, Error> {
        feature_loss(outputs, targets)
    }

    /// The same formula applied to gram matrices instead of raw activations.
    pub fn style_loss<B: Backend>(
        &self,
        outputs: &[Tensor<B, 3>],
        targets: &[Tensor<B, 3>],
    ) -> Result<Tensor<B, 1>, Error> {
        feature_loss(outputs, targets)
    }

    /// Smoothness penalty of the canvas itself.
    pub fn total_variation_loss<B: Backend>(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 1> {
        total_variation(images)
    }

    /// The weighted combination:
    ///
    /// `style / |S| * style_loss + content / |C| * content_loss + tv * tv_loss`
    pub fn total<B: Backend>(
        &self,
        canvas: Tensor<B, 4>,
        style_outputs: &[Tensor<B, 3>],
        style_targets: &[Tensor<B, 3>],
        content_outputs: &[Tensor<B, 4>],
        content_targets: &[Tensor<B, 4>],
    ) -> Result<LossBreakdown<B>, Error> {
        let style = self
            .style_loss(style_outputs, style_targets)?
            .mul_scalar(self.weights.style / self.style_layer_count as f64);
        let content = self
            .content_loss(content_outputs, content_targets)?
            .mul_scalar(self.weights.content / self.content_layer_count as f64);
        let total_variation = self
            .total_variation_loss(canvas)
            .mul_scalar(self.weights.total_variation);

        let total = style.to_owned()
            + content.to_owned()
            + total_variation.to_owned();
        Ok(LossBreakdown {
            total,
            style,
            content,
            total_variation,
        })
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn feature_loss_is_zero_for_identical_tensors() {
        use super::*;
        use burn::{backend::NdArray, tensor::Distribution};

        type B = NdArray<f32>;
        let device = &Default::default();

        let features = Tensor::<B, 4>::random(
            [1, 2, 3, 3],
            Distribution::Uniform(0.0, 1.0),
            device,
        );
        let loss =
            feature_loss(&[features.to_owned()], &[features]).unwrap();
        loss.into_data().assert_approx_eq_diff(
            &Tensor::<B, 1>::zeros([1], device).into_data(),
            1e-7,
        );
    }

    #[test]
    fn feature_loss_is_positive_for_different_tensors() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let outputs = [Tensor::<B, 4>::zeros([1, 2, 2, 2], device)];
        let targets = [Tensor::<B, 4>::full([1, 2, 2, 2], 0.5, device)];
        let loss = feature_loss(&outputs, &targets).unwrap();
        assert!(loss.into_scalar() > 0.0);
    }

    #[test]
    fn feature_loss_sums_across_layers() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        // Per-layer MSE of 1.0 and 4.0
        let outputs = [
            Tensor::<B, 4>::zeros([1, 1, 2, 2], device),
            Tensor::<B, 4>::zeros([1, 1, 2, 2], device),
        ];
        let targets = [
            Tensor::<B, 4>::full([1, 1, 2, 2], 1.0, device),
            Tensor::<B, 4>::full([1, 1, 2, 2], 2.0, device),
        ];
        let loss = feature_loss(&outputs, &targets).unwrap();
        loss.into_data().assert_approx_eq_diff(
            &Tensor::<B, 1>::from_data([5.0], device).into_data(),
            1e-6,
        );
    }

    #[test]
    fn feature_loss_rejects_mismatched_sequences() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let outputs = [Tensor::<B, 4>::zeros([1, 1, 2, 2], device)];
        let result = feature_loss(&outputs, &[]);
        assert!(matches!(result, Err(Error::Shape(..))));

        let targets = [Tensor::<B, 4>::zeros([1, 1, 3, 3], device)];
        let result = feature_loss(&outputs, &targets);
        assert!(matches!(result, Err(Error::Shape(..))));
    }

    #[test]
    fn total_combines_weighted_terms() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let weights = LossWeights::new()
            .with_style(2.0)
            .with_content(3.0)
            .with_total_variation(0.5);
        let engine = LossEngine::new(weights, 2, 1);

        // style MSE sum = 2.0 over two layers, content MSE = 1.0
        let style_outputs = [
            Tensor::<B, 3>::zeros([1, 2, 2], device),
            Tensor::<B, 3>::zeros([1, 2, 2], device),
        ];
        let style_targets = [
            Tensor::<B, 3>::full([1, 2, 2], 1.0, device),
            Tensor::<B, 3>::full([1, 2, 2], 1.0, device),
        ];
        let content_outputs = [Tensor::<B, 4>::zeros([1, 1, 2, 2], device)];
        let content_targets =
            [Tensor::<B, 4>::full([1, 1, 2, 2], 1.0, device)];
        // tv = 0 for a flat canvas
        let canvas = Tensor::<B, 4>::full([1, 3, 2, 2], 0.5, device);

        let breakdown = engine
            .total(
                canvas,
                &style_outputs,
                &style_targets,
                &content_outputs,
                &content_targets,
            )
            .unwrap();

        // 2.0 / 2 * 2.0 + 3.0 / 1 * 1.0 + 0.5 * 0.0 = 5.0
        breakdown.total.into_data().assert_approx_eq_diff(
            &Tensor::<B, 1>::from_data([5.0], device).into_data(),
            1e-6,
        );
        breakdown.style.into_data().assert_approx_eq_diff(
            &Tensor::<B, 1>::from_data([2.0], device).into_data(),
            1e-6,
        );
        breakdown.content.into_data().assert_approx_eq_diff(
            &Tensor::<B, 1>::from_data([3.0], device).into_data(),
            1e-6,
        );
    }
}
