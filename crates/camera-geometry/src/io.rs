//! File-backed frames: an external driver keeps writing the latest color and
//! depth images to disk; we reload them on every read.

use crate::{
    CameraSource, DepthFrame, Frame, GeometryError, PixelFormat, Result, RgbdFrame,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, ImageBuffer, ImageFormat, Luma, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub struct FileCamera {
    rgb_path: PathBuf,
    depth_path: PathBuf,
    counter: u64,
}

impl FileCamera {
    pub fn new(rgb_path: impl Into<PathBuf>, depth_path: impl Into<PathBuf>) -> Self {
        Self {
            rgb_path: rgb_path.into(),
            depth_path: depth_path.into(),
            counter: 0,
        }
    }
}

impl CameraSource for FileCamera {
    /// Spec is `RGB_PATH,DEPTH_PATH`.
    fn open(spec: &str) -> Result<Self> {
        let (rgb, depth) = spec
            .split_once(',')
            .ok_or_else(|| GeometryError::NotFound(format!("expected RGB,DEPTH paths: {spec}")))?;
        Ok(Self::new(rgb.trim(), depth.trim()))
    }

    fn read(&mut self) -> Result<RgbdFrame> {
        let color = read_rgb8(&self.rgb_path)?;
        let depth = read_depth_mm(&self.depth_path)?;
        self.counter += 1;
        Ok(RgbdFrame {
            seq: self.counter,
            color,
            depth,
        })
    }
}

pub fn read_rgb8(path: &Path) -> Result<Frame> {
    let img = image::open(path)
        .map_err(|e| GeometryError::Io(format!("{}: {e}", path.display())))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame {
        width,
        height,
        pixel_format: PixelFormat::Rgb8,
        data: img.into_raw(),
        ts: Some(OffsetDateTime::now_utc()),
    })
}

/// 16-bit single channel PNG in millimetres.
pub fn read_depth_mm(path: &Path) -> Result<DepthFrame> {
    let img = image::open(path)
        .map_err(|e| GeometryError::Io(format!("{}: {e}", path.display())))?
        .into_luma16();
    let (width, height) = img.dimensions();
    let mut depth = DepthFrame::from_millimeters(width, height, img.as_raw());
    depth.ts = Some(OffsetDateTime::now_utc());
    Ok(depth)
}

pub fn write_depth_mm(path: &Path, width: u32, height: u32, depth_mm: Vec<u16>) -> Result<()> {
    let img: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(width, height, depth_mm)
        .ok_or_else(|| GeometryError::FrameMismatch("depth buffer size".to_string()))?;
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| GeometryError::Io(format!("{}: {e}", path.display())))
}

pub fn encode_png(frame: &Frame) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let size_err = || GeometryError::FrameMismatch("color buffer size".to_string());
    match frame.pixel_format {
        PixelFormat::Rgb8 => RgbImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(size_err)?
            .write_to(&mut buf, ImageFormat::Png),
        PixelFormat::Gray8 => GrayImage::from_raw(frame.width, frame.height, frame.data.clone())
            .ok_or_else(size_err)?
            .write_to(&mut buf, ImageFormat::Png),
    }
    .map_err(|e| GeometryError::Codec(e.to_string()))?;
    Ok(buf.into_inner())
}

/// `data:image/png;base64,...` URI for inlining a live frame in a request.
pub fn encode_png_data_uri(frame: &Frame) -> Result<String> {
    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(encode_png(frame)?)
    ))
}
