#![allow(clippy::excessive_precision)]
#![allow(missing_docs)]

pub mod backbone;
pub mod backend;
pub mod dream;
pub mod error;
pub mod extract;
pub mod function;
pub mod image;
pub mod loss;
pub mod preset;
pub mod transfer;
