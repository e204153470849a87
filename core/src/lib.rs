pub mod error;
pub mod geometry;
pub mod image;
pub mod runtime;

pub use self::error::*;
pub use self::geometry::*;
pub use self::image::*;
pub use self::runtime::*;
