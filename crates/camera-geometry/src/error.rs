use thiserror::Error;

pub type Result<T, E = GeometryError> = core::result::Result<T, E>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// Depth sample at the representative pixel is zero, negative, NaN or absent.
    #[error("invalid depth at pixel ({u}, {v})")]
    InvalidDepth { u: u32, v: u32 },
    #[error("frame size mismatch: {0}")]
    FrameMismatch(String),
    #[error("bounding box {bbox:?} lies outside the {width}x{height} frame")]
    OutOfFrame {
        bbox: [u32; 4],
        width: u32,
        height: u32,
    },
    #[error("invalid depth sampling: {0}")]
    InvalidSampling(String),
    #[error("invalid bounding box: {0}")]
    InvalidBox(String),
    #[error("camera not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("image codec error: {0}")]
    Codec(String),
}
