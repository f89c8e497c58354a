pub use burn::tensor::backend::{AutodiffBackend, Backend};

use burn::backend::{autodiff, ndarray};

pub type Autodiff<B> = autodiff::Autodiff<B>;
pub type NdArray = ndarray::NdArray<f32>;

#[cfg(feature = "wgpu")]
pub use burn::backend::wgpu::WgpuDevice;

#[cfg(feature = "wgpu")]
pub type Wgpu = burn::backend::wgpu::Wgpu<f32, i32>;
