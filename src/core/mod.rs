pub mod classifier;
pub mod containment;
pub mod estimator;
pub mod fetcher;
pub mod geometry;
pub mod query;

pub use crate::domain::ports::{ConfigProvider, ElementSource};
pub use crate::utils::error::Result;
