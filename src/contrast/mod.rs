//! Hypothesis testing on a selected fitted model.

pub mod wald;

pub use wald::{test_contrast, ContrastResult};
