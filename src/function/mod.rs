pub mod gram;
pub mod statistics;
pub mod total_variation;

pub use burn::tensor::{backend::Backend, Tensor};
pub use gram::*;
pub use statistics::*;
pub use total_variation::*;
