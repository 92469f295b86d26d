#![allow(clippy::cast_precision_loss)]

pub mod cache;
pub mod histogram;

pub use cache::Cache;
pub use histogram::Histogram;
