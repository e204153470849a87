//! Integral image engine.
//!
//! [`IntegralImage`] is the classic full-frame summed-area table, built once per
//! image. [`MovingWindowIntegral`] is its streaming counterpart used by the cascade
//! detector: a few rows of a resampled integral that slide down the region of
//! interest.

pub mod integral;
pub mod integral_mw;

pub use integral::*;
pub use integral_mw::*;

pub use cv_core::{Error, Result};
