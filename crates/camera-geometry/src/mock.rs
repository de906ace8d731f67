use crate::{CameraSource, DepthFrame, Frame, PixelFormat, Result, RgbdFrame};
use time::OffsetDateTime;

/// Synthetic tabletop: gray ramp color over a flat plane at a fixed depth.
pub struct MockCamera {
    width: u32,
    height: u32,
    depth_m: f32,
    counter: u64,
}

impl MockCamera {
    pub fn new(width: u32, height: u32, depth_m: f32) -> Self {
        Self {
            width,
            height,
            depth_m,
            counter: 0,
        }
    }
}

impl CameraSource for MockCamera {
    /// Spec is `WIDTHxHEIGHT@DEPTH_M`; anything unparsable yields 640x360 at 0.8 m.
    fn open(spec: &str) -> Result<Self> {
        let parsed = spec.split_once('@').and_then(|(dims, z)| {
            let (w, h) = dims.split_once('x')?;
            Some((w.parse().ok()?, h.parse().ok()?, z.parse().ok()?))
        });
        let (w, h, z) = parsed.unwrap_or((640, 360, 0.8));
        Ok(Self::new(w, h, z))
    }

    fn read(&mut self) -> Result<RgbdFrame> {
        self.counter += 1;
        let (width, height) = (self.width, self.height);
        let mut data = vec![0u8; (width * height * 3) as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 3) as usize;
                let g = ((x + y) % 256) as u8;
                data[idx..idx + 3].copy_from_slice(&[g, g, g]);
            }
        }
        let ts = Some(OffsetDateTime::now_utc());
        Ok(RgbdFrame {
            seq: self.counter,
            color: Frame {
                width,
                height,
                pixel_format: PixelFormat::Rgb8,
                data,
                ts,
            },
            depth: DepthFrame {
                width,
                height,
                data: vec![self.depth_m; (width * height) as usize],
                ts,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_parses_spec() {
        let mut cam = MockCamera::open("320x240@1.25").unwrap();
        let f = cam.read().unwrap();
        assert_eq!((f.color.width, f.color.height), (320, 240));
        assert_eq!(f.depth.at(10, 10), Some(1.25));
        assert_eq!(f.seq, 1);
        assert_eq!(cam.read().unwrap().seq, 2);
    }

    #[test]
    fn open_falls_back_to_defaults() {
        let f = MockCamera::open("0").unwrap().read().unwrap();
        assert_eq!((f.depth.width, f.depth.height), (640, 360));
        assert_eq!(f.color.data.len(), 640 * 360 * 3);
    }
}
