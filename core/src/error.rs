use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Corrupt cascade: {0}")]
    CorruptCascade(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Rectangle ({x}, {y}, {w}, {h}) out of bounds for {width}x{height} accumulator")]
    OutOfBounds {
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        width: usize,
        height: usize,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Detection cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
