use crate::{Result, RgbdFrame};

pub trait CameraSource {
    /// Open an RGB-D source from a backend-specific spec string.
    fn open(spec: &str) -> Result<Self>
    where
        Self: Sized;

    /// Read one aligned color + depth pair.
    fn read(&mut self) -> Result<RgbdFrame>;
}
