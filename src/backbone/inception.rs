//! Inception-v3 feature backbone.

pub use super::*;
pub use burn::nn::{
    conv::Conv2d,
    pool::{AvgPool2d, MaxPool2d},
    Relu,
};

use crate::error::Error;
use burn::{
    module::Module,
    nn::{
        conv::Conv2dConfig,
        pool::{AvgPool2dConfig, MaxPool2dConfig},
        PaddingConfig2d,
    },
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use std::path::PathBuf;

/// Activation tap names of [`InceptionV3`], one per mixed block.
pub const INCEPTION_V3_LAYER_NAMES: [&str; 11] = [
    "mixed0", "mixed1", "mixed2", "mixed3", "mixed4", "mixed5", "mixed6",
    "mixed7", "mixed8", "mixed9", "mixed10",
];

/// A convolution with folded batch normalization, followed by ReLU.
///
/// Records exported for this crate fold the batch-norm scale and shift into
/// the convolution weights and bias, the standard form for frozen inference.
/// This keeps the forward pass stateless.
#[derive(Debug, Module)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> ConvBlock<B> {
    pub fn init(
        channels: [usize; 2],
        kernel: [usize; 2],
        stride: [usize; 2],
        padding: [usize; 2],
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new(channels, kernel)
            .with_stride(stride)
            .with_padding(PaddingConfig2d::Explicit(padding[0], padding[1]))
            .init(device);
        Self {
            conv,
            relu: Relu::new(),
        }
    }

    pub fn forward(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.relu.forward(self.conv.forward(images))
    }
}

/// Inception-A block (`mixed0..=mixed2`).
#[derive(Debug, Module)]
pub struct InceptionA<B: Backend> {
    branch1x1: ConvBlock<B>,
    branch5x5_1: ConvBlock<B>,
    branch5x5_2: ConvBlock<B>,
    branch3x3dbl_1: ConvBlock<B>,
    branch3x3dbl_2: ConvBlock<B>,
    branch3x3dbl_3: ConvBlock<B>,
    branch_pool: ConvBlock<B>,
    pool: AvgPool2d,
}

impl<B: Backend> InceptionA<B> {
    pub fn init(
        channels: usize,
        channels_pool: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            branch1x1: ConvBlock::init(
                [channels, 64],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch5x5_1: ConvBlock::init(
                [channels, 48],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch5x5_2: ConvBlock::init([48, 64], [5, 5], [1, 1], [2, 2], device),
            branch3x3dbl_1: ConvBlock::init(
                [channels, 64],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch3x3dbl_2: ConvBlock::init(
                [64, 96],
                [3, 3],
                [1, 1],
                [1, 1],
                device,
            ),
            branch3x3dbl_3: ConvBlock::init(
                [96, 96],
                [3, 3],
                [1, 1],
                [1, 1],
                device,
            ),
            branch_pool: ConvBlock::init(
                [channels, channels_pool],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            pool: AvgPool2dConfig::new([3, 3])
                .with_strides([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }

    /// ## Shapes
    ///
    /// * `output` - `[B, 224 + channels_pool, H, W]`
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch1x1 = self.branch1x1.forward(images.to_owned());
        let branch5x5 = self
            .branch5x5_2
            .forward(self.branch5x5_1.forward(images.to_owned()));
        let branch3x3dbl = self.branch3x3dbl_3.forward(
            self.branch3x3dbl_2
                .forward(self.branch3x3dbl_1.forward(images.to_owned())),
        );
        let branch_pool = self.branch_pool.forward(self.pool.forward(images));
        Tensor::cat(vec![branch1x1, branch5x5, branch3x3dbl, branch_pool], 1)
    }
}

/// Inception-B reduction block (`mixed3`).
#[derive(Debug, Module)]
pub struct InceptionB<B: Backend> {
    branch3x3: ConvBlock<B>,
    branch3x3dbl_1: ConvBlock<B>,
    branch3x3dbl_2: ConvBlock<B>,
    branch3x3dbl_3: ConvBlock<B>,
    pool: MaxPool2d,
}

impl<B: Backend> InceptionB<B> {
    pub fn init(
        channels: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            branch3x3: ConvBlock::init(
                [channels, 384],
                [3, 3],
                [2, 2],
                [0, 0],
                device,
            ),
            branch3x3dbl_1: ConvBlock::init(
                [channels, 64],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch3x3dbl_2: ConvBlock::init(
                [64, 96],
                [3, 3],
                [1, 1],
                [1, 1],
                device,
            ),
            branch3x3dbl_3: ConvBlock::init(
                [96, 96],
                [3, 3],
                [2, 2],
                [0, 0],
                device,
            ),
            pool: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
        }
    }

    /// ## Shapes
    ///
    /// * `output` - `[B, 480 + channels, H / 2, W / 2]`
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch3x3 = self.branch3x3.forward(images.to_owned());
        let branch3x3dbl = self.branch3x3dbl_3.forward(
            self.branch3x3dbl_2
                .forward(self.branch3x3dbl_1.forward(images.to_owned())),
        );
        let branch_pool = self.pool.forward(images);
        Tensor::cat(vec![branch3x3, branch3x3dbl, branch_pool], 1)
    }
}

/// Inception-C block (`mixed4..=mixed7`), factorized 7x7 convolutions.
#[derive(Debug, Module)]
pub struct InceptionC<B: Backend> {
    branch1x1: ConvBlock<B>,
    branch7x7_1: ConvBlock<B>,
    branch7x7_2: ConvBlock<B>,
    branch7x7_3: ConvBlock<B>,
    branch7x7dbl_1: ConvBlock<B>,
    branch7x7dbl_2: ConvBlock<B>,
    branch7x7dbl_3: ConvBlock<B>,
    branch7x7dbl_4: ConvBlock<B>,
    branch7x7dbl_5: ConvBlock<B>,
    branch_pool: ConvBlock<B>,
    pool: AvgPool2d,
}

impl<B: Backend> InceptionC<B> {
    pub fn init(
        channels: usize,
        channels_7x7: usize,
        device: &B::Device,
    ) -> Self {
        let mid = channels_7x7;
        Self {
            branch1x1: ConvBlock::init(
                [channels, 192],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch7x7_1: ConvBlock::init(
                [channels, mid],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch7x7_2: ConvBlock::init(
                [mid, mid],
                [1, 7],
                [1, 1],
                [0, 3],
                device,
            ),
            branch7x7_3: ConvBlock::init(
                [mid, 192],
                [7, 1],
                [1, 1],
                [3, 0],
                device,
            ),
            branch7x7dbl_1: ConvBlock::init(
                [channels, mid],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch7x7dbl_2: ConvBlock::init(
                [mid, mid],
                [7, 1],
                [1, 1],
                [3, 0],
                device,
            ),
            branch7x7dbl_3: ConvBlock::init(
                [mid, mid],
                [1, 7],
                [1, 1],
                [0, 3],
                device,
            ),
            branch7x7dbl_4: ConvBlock::init(
                [mid, mid],
                [7, 1],
                [1, 1],
                [3, 0],
                device,
            ),
            branch7x7dbl_5: ConvBlock::init(
                [mid, 192],
                [1, 7],
                [1, 1],
                [0, 3],
                device,
            ),
            branch_pool: ConvBlock::init(
                [channels, 192],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            pool: AvgPool2dConfig::new([3, 3])
                .with_strides([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }

    /// ## Shapes
    ///
    /// * `output` - `[B, 768, H, W]`
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch1x1 = self.branch1x1.forward(images.to_owned());
        let branch7x7 = self.branch7x7_3.forward(
            self.branch7x7_2.forward(self.branch7x7_1.forward(images.to_owned())),
        );
        let branch7x7dbl = self.branch7x7dbl_5.forward(
            self.branch7x7dbl_4.forward(
                self.branch7x7dbl_3.forward(
                    self.branch7x7dbl_2
                        .forward(self.branch7x7dbl_1.forward(images.to_owned())),
                ),
            ),
        );
        let branch_pool = self.branch_pool.forward(self.pool.forward(images));
        Tensor::cat(vec![branch1x1, branch7x7, branch7x7dbl, branch_pool], 1)
    }
}

/// Inception-D reduction block (`mixed8`).
#[derive(Debug, Module)]
pub struct InceptionD<B: Backend> {
    branch3x3_1: ConvBlock<B>,
    branch3x3_2: ConvBlock<B>,
    branch7x7x3_1: ConvBlock<B>,
    branch7x7x3_2: ConvBlock<B>,
    branch7x7x3_3: ConvBlock<B>,
    branch7x7x3_4: ConvBlock<B>,
    pool: MaxPool2d,
}

impl<B: Backend> InceptionD<B> {
    pub fn init(
        channels: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            branch3x3_1: ConvBlock::init(
                [channels, 192],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch3x3_2: ConvBlock::init(
                [192, 320],
                [3, 3],
                [2, 2],
                [0, 0],
                device,
            ),
            branch7x7x3_1: ConvBlock::init(
                [channels, 192],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch7x7x3_2: ConvBlock::init(
                [192, 192],
                [1, 7],
                [1, 1],
                [0, 3],
                device,
            ),
            branch7x7x3_3: ConvBlock::init(
                [192, 192],
                [7, 1],
                [1, 1],
                [3, 0],
                device,
            ),
            branch7x7x3_4: ConvBlock::init(
                [192, 192],
                [3, 3],
                [2, 2],
                [0, 0],
                device,
            ),
            pool: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
        }
    }

    /// ## Shapes
    ///
    /// * `output` - `[B, 512 + channels, H / 2, W / 2]`
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch3x3 = self
            .branch3x3_2
            .forward(self.branch3x3_1.forward(images.to_owned()));
        let branch7x7x3 = self.branch7x7x3_4.forward(
            self.branch7x7x3_3.forward(
                self.branch7x7x3_2
                    .forward(self.branch7x7x3_1.forward(images.to_owned())),
            ),
        );
        let branch_pool = self.pool.forward(images);
        Tensor::cat(vec![branch3x3, branch7x7x3, branch_pool], 1)
    }
}

/// Inception-E block (`mixed9..=mixed10`), expanded filter banks.
#[derive(Debug, Module)]
pub struct InceptionE<B: Backend> {
    branch1x1: ConvBlock<B>,
    branch3x3_1: ConvBlock<B>,
    branch3x3_2a: ConvBlock<B>,
    branch3x3_2b: ConvBlock<B>,
    branch3x3dbl_1: ConvBlock<B>,
    branch3x3dbl_2: ConvBlock<B>,
    branch3x3dbl_3a: ConvBlock<B>,
    branch3x3dbl_3b: ConvBlock<B>,
    branch_pool: ConvBlock<B>,
    pool: AvgPool2d,
}

impl<B: Backend> InceptionE<B> {
    pub fn init(
        channels: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            branch1x1: ConvBlock::init(
                [channels, 320],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch3x3_1: ConvBlock::init(
                [channels, 384],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch3x3_2a: ConvBlock::init(
                [384, 384],
                [1, 3],
                [1, 1],
                [0, 1],
                device,
            ),
            branch3x3_2b: ConvBlock::init(
                [384, 384],
                [3, 1],
                [1, 1],
                [1, 0],
                device,
            ),
            branch3x3dbl_1: ConvBlock::init(
                [channels, 448],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            branch3x3dbl_2: ConvBlock::init(
                [448, 384],
                [3, 3],
                [1, 1],
                [1, 1],
                device,
            ),
            branch3x3dbl_3a: ConvBlock::init(
                [384, 384],
                [1, 3],
                [1, 1],
                [0, 1],
                device,
            ),
            branch3x3dbl_3b: ConvBlock::init(
                [384, 384],
                [3, 1],
                [1, 1],
                [1, 0],
                device,
            ),
            branch_pool: ConvBlock::init(
                [channels, 192],
                [1, 1],
                [1, 1],
                [0, 0],
                device,
            ),
            pool: AvgPool2dConfig::new([3, 3])
                .with_strides([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }

    /// ## Shapes
    ///
    /// * `output` - `[B, 2048, H, W]`
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let branch1x1 = self.branch1x1.forward(images.to_owned());

        let branch3x3 = self.branch3x3_1.forward(images.to_owned());
        let branch3x3 = Tensor::cat(
            vec![
                self.branch3x3_2a.forward(branch3x3.to_owned()),
                self.branch3x3_2b.forward(branch3x3),
            ],
            1,
        );

        let branch3x3dbl = self
            .branch3x3dbl_2
            .forward(self.branch3x3dbl_1.forward(images.to_owned()));
        let branch3x3dbl = Tensor::cat(
            vec![
                self.branch3x3dbl_3a.forward(branch3x3dbl.to_owned()),
                self.branch3x3dbl_3b.forward(branch3x3dbl),
            ],
            1,
        );

        let branch_pool = self.branch_pool.forward(self.pool.forward(images));
        Tensor::cat(vec![branch1x1, branch3x3, branch3x3dbl, branch_pool], 1)
    }
}

/// The Inception-v3 trunk up to `mixed10`, without the classifier head.
///
/// Native input range is `[-1, 1]`; inputs should be at least 75x75 so the
/// strided stem does not collapse the spatial dimensions.
#[derive(Debug, Module)]
pub struct InceptionV3<B: Backend> {
    conv1a: ConvBlock<B>,
    conv2a: ConvBlock<B>,
    conv2b: ConvBlock<B>,
    conv3b: ConvBlock<B>,
    conv4a: ConvBlock<B>,
    pool: MaxPool2d,
    mixed0: InceptionA<B>,
    mixed1: InceptionA<B>,
    mixed2: InceptionA<B>,
    mixed3: InceptionB<B>,
    mixed4: InceptionC<B>,
    mixed5: InceptionC<B>,
    mixed6: InceptionC<B>,
    mixed7: InceptionC<B>,
    mixed8: InceptionD<B>,
    mixed9: InceptionE<B>,
    mixed10: InceptionE<B>,
}

impl<B: Backend> InceptionV3<B> {
    /// Initialize with random weights, frozen.
    pub fn init(device: &B::Device) -> Self {
        Self {
            conv1a: ConvBlock::init([3, 32], [3, 3], [2, 2], [0, 0], device),
            conv2a: ConvBlock::init([32, 32], [3, 3], [1, 1], [0, 0], device),
            conv2b: ConvBlock::init([32, 64], [3, 3], [1, 1], [1, 1], device),
            conv3b: ConvBlock::init([64, 80], [1, 1], [1, 1], [0, 0], device),
            conv4a: ConvBlock::init([80, 192], [3, 3], [1, 1], [0, 0], device),
            pool: MaxPool2dConfig::new([3, 3]).with_strides([2, 2]).init(),
            mixed0: InceptionA::init(192, 32, device),
            mixed1: InceptionA::init(256, 64, device),
            mixed2: InceptionA::init(288, 64, device),
            mixed3: InceptionB::init(288, device),
            mixed4: InceptionC::init(768, 128, device),
            mixed5: InceptionC::init(768, 160, device),
            mixed6: InceptionC::init(768, 160, device),
            mixed7: InceptionC::init(768, 192, device),
            mixed8: InceptionD::init(768, device),
            mixed9: InceptionE::init(1280, device),
            mixed10: InceptionE::init(2048, device),
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
    /// Mixed blocks beyond the last requested tap never run, so shallow
    /// taps stay reachable on images the reduction blocks would collapse.
    ///
    /// ## Shapes
    ///
    /// * `images` - `[B, 3, H, W]` in the native range
    /// * `output` - one map per leading name in [`INCEPTION_V3_LAYER_NAMES`]
    pub fn forward(
        &self,
        images: Tensor<B, 4>,
        depth: usize,
    ) -> Vec<Tensor<B, 4>> {
        let mut images = self.conv1a.forward(images);
        images = self.conv2a.forward(images);
        images = self.conv2b.forward(images);
        images = self.pool.forward(images);
        images = self.conv3b.forward(images);
        images = self.conv4a.forward(images);
        images = self.pool.forward(images);

        let blocks: [&dyn Fn(Tensor<B, 4>) -> Tensor<B, 4>; 11] = [
            &|x| self.mixed0.forward(x),
            &|x| self.mixed1.forward(x),
            &|x| self.mixed2.forward(x),
            &|x| self.mixed3.forward(x),
            &|x| self.mixed4.forward(x),
            &|x| self.mixed5.forward(x),
            &|x| self.mixed6.forward(x),
            &|x| self.mixed7.forward(x),
            &|x| self.mixed8.forward(x),
            &|x| self.mixed9.forward(x),
            &|x| self.mixed10.forward(x),
        ];
        let mut taps = Vec::with_capacity(depth.min(blocks.len()));
        for block in blocks.iter().take(depth) {
            images = block(images);
            taps.push(images.to_owned());
        }
        taps
    }
}

impl<B: Backend> Backbone<B> for InceptionV3<B> {
    fn layer_names(&self) -> &'static [&'static str] {
        &INCEPTION_V3_LAYER_NAMES
    }

    /// `2x - 1`, the unit range mapped onto `[-1, 1]`.
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
        self.forward(images, depth)
    }
}
