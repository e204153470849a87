pub mod haar;

pub use haar::*;

pub use cv_core::{Error, Result};
