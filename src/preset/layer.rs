//! Default activation tap selections.

/// Default content tap of the VGG-19 backbone.
pub const CONTENT_LAYER_NAMES_DEFAULT: [&str; 1] = ["block5_conv2"];

/// Default taps amplified by the dream maximizer on the Inception backbone.
pub const DREAM_LAYER_NAMES_DEFAULT: [&str; 2] = ["mixed3", "mixed5"];

/// Default style taps of the VGG-19 backbone, one per block, shallow to deep.
pub const STYLE_LAYER_NAMES_DEFAULT: [&str; 5] = [
    "block1_conv1",
    "block2_conv1",
    "block3_conv1",
    "block4_conv1",
    "block5_conv1",
];
