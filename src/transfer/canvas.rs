//! The mutable canvas being optimized.

pub use burn::{
    module::Param,
    tensor::{backend::Backend, Tensor},
};

use burn::{module::Module, tensor::Distribution};

/// A square RGB canvas held as the single trainable parameter.
#[derive(Debug, Module)]
pub struct Canvas<B: Backend> {
    /// `[1, 3, S, S]`
    pub image: Param<Tensor<B, 4>>,
}

impl<B: Backend> Canvas<B> {
    /// Initialize with uniform random noise in `[0, 1]`.
    pub fn random(
        size: usize,
        device: &B::Device,
    ) -> Self {
        let image = Tensor::random(
            [1, 3, size, size],
            Distribution::Uniform(0.0, 1.0),
            device,
        );
        Self {
            image: Param::from_tensor(image),
        }
    }

    /// Clamp every pixel into `[min, max]`, keeping the parameter id so the
    /// optimizer state stays attached across steps.
    pub fn clamped(
        self,
        min: f64,
        max: f64,
    ) -> Self {
        let image = self.image.val().clamp(min, max).detach().require_grad();
        Self {
            image: Param::initialized(self.image.id, image),
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn random_is_within_unit_range() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let canvas = Canvas::<B>::random(8, device);
        let image = canvas.image.val();
        assert_eq!(image.dims(), [1, 3, 8, 8]);
        assert!(image.to_owned().min().into_scalar() >= 0.0);
        assert!(image.max().into_scalar() <= 1.0);
    }

    #[test]
    fn clamped_enforces_the_range() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let canvas = Canvas::<B> {
            image: Param::from_tensor(Tensor::from_data(
                [[[[-3.0, 0.5], [2.0, 1.0]]]],
                device,
            )),
        };
        let id = canvas.image.id.clone();
        let canvas = canvas.clamped(0.0, 1.0);

        assert_eq!(canvas.image.id, id);
        canvas.image.val().into_data().assert_approx_eq_diff(
            &Tensor::<B, 4>::from_data([[[[0.0, 0.5], [1.0, 1.0]]]], device)
                .into_data(),
            1e-6,
        );
    }
}
