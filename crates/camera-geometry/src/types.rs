use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PixelFormat {
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// Color frame, row-major.
#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    pub ts: Option<OffsetDateTime>,
}

/// Depth frame aligned to the color frame. Samples are metres; zero, negative
/// and non-finite samples mark sensor holes.
#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
    pub ts: Option<OffsetDateTime>,
}

impl DepthFrame {
    /// Build from a u16 millimetre buffer, the layout most RGB-D drivers emit.
    pub fn from_millimeters(width: u32, height: u32, depth_mm: &[u16]) -> Self {
        Self {
            width,
            height,
            data: depth_mm.iter().map(|&d| d as f32 * 1e-3).collect(),
            ts: None,
        }
    }

    /// Raw sample at (u, v); `None` when outside the buffer.
    pub fn at(&self, u: u32, v: u32) -> Option<f32> {
        if u >= self.width || v >= self.height {
            return None;
        }
        self.data
            .get(v as usize * self.width as usize + u as usize)
            .copied()
    }
}

/// Color and depth captured together.
#[derive(Clone, Debug)]
pub struct RgbdFrame {
    pub seq: u64,
    pub color: Frame,
    pub depth: DepthFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millimeter_conversion() {
        let d = DepthFrame::from_millimeters(2, 1, &[1500, 0]);
        assert_eq!(d.at(0, 0), Some(1.5));
        assert_eq!(d.at(1, 0), Some(0.0));
        assert_eq!(d.at(2, 0), None);
        assert_eq!(d.at(0, 1), None);
    }

    #[test]
    fn short_buffer_reads_as_missing() {
        let d = DepthFrame {
            width: 4,
            height: 4,
            data: vec![1.0; 3],
            ts: None,
        };
        assert_eq!(d.at(3, 3), None);
    }
}
