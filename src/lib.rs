//! Haar-cascade object detection for resource-constrained targets.
//!
//! Re-exports the workspace crates: [`core`] for errors, rectangles and image
//! views, [`imgproc`] for the integral image engine, and [`objdetect`] for cascade
//! loading, scanning and merging.

pub use cv_core as core;
pub use cv_imgproc as imgproc;
pub use cv_objdetect as objdetect;

pub use cv_core::{init_global_thread_pool, Error, ImageView, PixelFormat, Rect, Result};
pub use cv_objdetect::haar::{detect_objects, HaarCascade, MergePolicy, ScanParams};
