//! camera-geometry: RGB-D frames, camera models and box deprojection

mod types;
pub use types::{DepthFrame, Frame, PixelFormat, RgbdFrame};

mod error;
pub use error::{GeometryError, Result};

mod camera;
pub use camera::{CameraExtrinsics, CameraIntrinsics, SpatialPoint};

mod bbox;
pub use bbox::{BoundingBox, BoxGrid, ImageExtent};

mod deproject;
pub use deproject::{deproject, deproject_with, DepthSampling};

mod traits;
pub use traits::CameraSource;

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::MockCamera;

pub mod io;
pub use io::{encode_png_data_uri, FileCamera};
