//! Haar Cascade Object Detection
//!
//! Evaluation of pre-trained Viola-Jones cascades on grayscale images.
//!
//! # Algorithm Overview
//!
//! A cascade is a sequence of stages, each a sum of weak-classifier votes. A
//! weak classifier compares a weighted combination of rectangle sums, normalized
//! by the window's standard deviation, against its threshold and votes one of two
//! alphas. A window is accepted only if every stage score reaches the stage
//! threshold, and most windows are rejected within the first stages.
//!
//! Multi-scale search resamples the region of interest by a growing factor and
//! slides the fixed base window over it using moving-window integral images
//! (see [`cv_imgproc::MovingWindowIntegral`]). Low-contrast windows are rejected
//! before any stage runs. Accepted windows are mapped back to image coordinates
//! and overlapping hits are merged.
//!
//! # Usage
//!
//! ```no_run
//! # use cv_objdetect::haar::{HaarCascade, ScanParams};
//! # use cv_core::ImageView;
//! # use image::GrayImage;
//! let cascade = HaarCascade::load("frontalface.cascade")?
//!     .with_params(ScanParams::default().with_scale_factor(1.25))?;
//! let frame = GrayImage::new(320, 240);
//! let view = ImageView::from(&frame);
//! let faces = cascade.detect(&view, view.bounds()?)?;
//! # Ok::<(), cv_core::Error>(())
//! ```

mod cascade;
mod detect;
mod merge;
mod params;

pub use cascade::*;
pub use detect::*;
pub use merge::*;
pub use params::*;

#[cfg(test)]
mod haar_test;
