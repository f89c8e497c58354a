//! A minimal single-convolution backbone for tests.

pub use super::*;
pub use burn::nn::conv::Conv2d;

use burn::{
    module::Module,
    nn::{conv::Conv2dConfig, PaddingConfig2d},
};

pub const STUB_LAYER_NAMES: [&str; 1] = ["conv"];

/// One 3x3 convolution, no activation, identity preprocessing.
#[derive(Debug, Module)]
pub struct StubBackbone<B: Backend> {
    conv: Conv2d<B>,
}

impl<B: Backend> StubBackbone<B> {
    pub fn init(device: &B::Device) -> Self {
        let conv = Conv2dConfig::new([3, 4], [3, 3])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init(device);
        Self { conv }.no_grad()
    }
}

impl<B: Backend> Backbone<B> for StubBackbone<B> {
    fn layer_names(&self) -> &'static [&'static str] {
        &STUB_LAYER_NAMES
    }

    fn preprocess(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        images
    }

    fn features(
        &self,
        images: Tensor<B, 4>,
        depth: usize,
    ) -> Vec<Tensor<B, 4>> {
        let mut taps = Vec::new();
        if depth > 0 {
            taps.push(self.conv.forward(images));
        }
        taps
    }
}
