//! VGG-19 feature backbone.

pub use super::*;
pub use burn::nn::{conv::Conv2d, pool::MaxPool2d, Relu};

use crate::error::Error;
use burn::{
    module::Module,
    nn::{conv::Conv2dConfig, pool::MaxPool2dConfig, PaddingConfig2d},
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use std::path::PathBuf;

/// Activation tap names of [`Vgg19`], one per convolution, taken after
/// its ReLU.
pub const VGG19_LAYER_NAMES: [&str; 16] = [
    "block1_conv1",
    "block1_conv2",
    "block2_conv1",
    "block2_conv2",
    "block3_conv1",
    "block3_conv2",
    "block3_conv3",
    "block3_conv4",
    "block4_conv1",
    "block4_conv2",
    "block4_conv3",
    "block4_conv4",
    "block5_conv1",
    "block5_conv2",
    "block5_conv3",
    "block5_conv4",
];

/// Mean pixel values subtracted by the preprocessing, in BGR order.
pub const IMAGENET_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];

// Output channels per convolution.
const CHANNELS: [usize; 16] = [
    64, 64, 128, 128, 256, 256, 256, 256, 512, 512, 512, 512, 512, 512, 512,
    512,
];

/// The 16-convolution feature trunk of VGG-19.
///
/// Every convolution is 3x3 with unit padding; a 2x2 max-pool of stride 2
/// sits between blocks. The classifier head is not part of the trunk.
#[derive(Debug, Module)]
pub struct Vgg19<B: Backend> {
    convs: Vec<Conv2d<B>>,
    pool: MaxPool2d,
    relu: Relu,
}

impl<B: Backend> Vgg19<B> {
    /// Initialize with random weights, frozen.
    pub fn init(device: &B::Device) -> Self {
        let mut convs = Vec::with_capacity(CHANNELS.len());
        let mut channels = 3;
        for count in CHANNELS {
            convs.push(
                Conv2dConfig::new([channels, count], [3, 3])
                    .with_padding(PaddingConfig2d::Explicit(1, 1))
                    .init(device),
            );
            channels = count;
        }

        Self {
            convs,
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            relu: Relu::new(),
        }
        .no_grad()
    }

    /// Load pretrained weights from a named-mpk record file, frozen.
    ///
    /// ## Errors
    ///
    /// Returns [`Error::Record`] when the record cannot be read.
    pub fn load(
        path: impl Into<PathBuf>,
        device: &B::Device,
    ) -> Result<Self, Error> {
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        Ok(Self::init(device)
            .load_file(path.into(), &recorder, device)?
            .no_grad())
    }

    /// Compute the first `depth` activation taps.
    ///
    /// Convolutions and pools beyond the last requested tap never run, so
    /// shallow taps stay reachable on images the deep pools would collapse.
    ///
    /// ## Shapes
    ///
    /// * `images` - `[B, 3, H, W]` in the native range
    /// * `output` - one map per leading name in [`VGG19_LAYER_NAMES`]
    pub fn forward(
        &self,
        mut images: Tensor<B, 4>,
        depth: usize,
    ) -> Vec<Tensor<B, 4>> {
        let depth = depth.min(self.convs.len());
        let mut taps = Vec::with_capacity(depth);
        for (index, conv) in self.convs.iter().take(depth).enumerate() {
            images = self.relu.forward(conv.forward(images));
            taps.push(images.to_owned());
            // 2x2 max-pool between blocks
            if taps.len() < depth && matches!(index, 1 | 3 | 7 | 11) {
                images = self.pool.forward(images);
            }
        }
        taps
    }
}

impl<B: Backend> Backbone<B> for Vgg19<B> {
    fn layer_names(&self) -> &'static [&'static str] {
        &VGG19_LAYER_NAMES
    }

    /// `x * 255`, RGB to BGR, ImageNet mean subtraction.
    fn preprocess(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let mut channels = images.mul_scalar(255.0).chunk(3, 1);
        let blue = channels.pop().expect("The input has 3 channels");
        let green = channels.pop().expect("The input has 3 channels");
        let red = channels.pop().expect("The input has 3 channels");
        Tensor::cat(
            vec![
                blue.sub_scalar(IMAGENET_MEAN_BGR[0]),
                green.sub_scalar(IMAGENET_MEAN_BGR[1]),
                red.sub_scalar(IMAGENET_MEAN_BGR[2]),
            ],
            1,
        )
    }

    fn features(
        &self,
        images: Tensor<B, 4>,
        depth: usize,
    ) -> Vec<Tensor<B, 4>> {
        self.forward(images, depth)
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn forward_shapes() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let model = Vgg19::<B>::init(device);
        let taps = model.forward(
            Tensor::zeros([1, 3, 16, 16], device),
            VGG19_LAYER_NAMES.len(),
        );

        assert_eq!(taps.len(), VGG19_LAYER_NAMES.len());
        assert_eq!(taps[0].dims(), [1, 64, 16, 16]);
        assert_eq!(taps[4].dims(), [1, 256, 4, 4]);
        assert_eq!(taps[12].dims(), [1, 512, 1, 1]);
        assert_eq!(taps[15].dims(), [1, 512, 1, 1]);
    }

    #[test]
    fn forward_skips_layers_beyond_the_depth() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let model = Vgg19::<B>::init(device);
        // an 8x8 input collapses to 1x1 by block 4; shallow taps must not
        // drag the forward pass through the deep pools
        let taps = model.forward(Tensor::zeros([1, 3, 8, 8], device), 3);

        assert_eq!(taps.len(), 3);
        assert_eq!(taps[2].dims(), [1, 128, 4, 4]);
    }

    #[test]
    fn preprocess_swaps_and_centers_channels() {
        use super::*;
        use burn::backend::NdArray;

        type B = NdArray<f32>;
        let device = &Default::default();

        let model = Vgg19::<B>::init(device);
        // r = 1, g = 0.5, b = 0
        let images = Tensor::<B, 4>::cat(
            vec![
                Tensor::full([1, 1, 2, 2], 1.0, device),
                Tensor::full([1, 1, 2, 2], 0.5, device),
                Tensor::full([1, 1, 2, 2], 0.0, device),
            ],
            1,
        );
        let output = model.preprocess(images);

        let expected = Tensor::<B, 4>::cat(
            vec![
                Tensor::full([1, 1, 2, 2], -IMAGENET_MEAN_BGR[0], device),
                Tensor::full([1, 1, 2, 2], 127.5 - IMAGENET_MEAN_BGR[1], device),
                Tensor::full([1, 1, 2, 2], 255.0 - IMAGENET_MEAN_BGR[2], device),
            ],
            1,
        );
        output
            .into_data()
            .assert_approx_eq_diff(&expected.into_data(), 1e-4);
    }
}
