use crate::{GeometryError, Result};
use serde::{Deserialize, Serialize};

/// Coordinate space a bounding box is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageExtent {
    pub width: u32,
    pub height: u32,
}

/// Grid the reasoning service reports boxes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BoxGrid {
    /// Pixel coordinates of the frame that was sent.
    #[default]
    Pixel,
    /// Resolution-independent `range` x `range` grid (Qwen-VL reports 0..1000).
    Normalized { range: u32 },
}

impl BoxGrid {
    /// Extent used to validate incoming boxes, given the frame size.
    pub fn extent(&self, frame_width: u32, frame_height: u32) -> ImageExtent {
        match *self {
            BoxGrid::Pixel => ImageExtent {
                width: frame_width,
                height: frame_height,
            },
            BoxGrid::Normalized { range } => ImageExtent {
                width: range,
                height: range,
            },
        }
    }

    /// Map a validated box on this grid into pixel space of a `width` x `height` frame.
    pub fn to_pixels(&self, b: &BoundingBox, width: u32, height: u32) -> Result<BoundingBox> {
        match *self {
            BoxGrid::Pixel => Ok(*b),
            BoxGrid::Normalized { range } => {
                if range == 0 {
                    return Err(GeometryError::InvalidBox("zero grid range".to_string()));
                }
                let sx = |x: u32| ((x as u64 * width as u64) / range as u64) as u32;
                let sy = |y: u32| ((y as u64 * height as u64) / range as u64) as u32;
                BoundingBox::new(
                    sx(b.x1),
                    sy(b.y1),
                    sx(b.x2),
                    sy(b.y2),
                    ImageExtent { width, height },
                )
            }
        }
    }
}

/// Axis-aligned box `[x1, y1, x2, y2]` with `x1 < x2 <= width` and `y1 < y2 <= height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "[u32; 4]")]
pub struct BoundingBox {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32, extent: ImageExtent) -> Result<Self> {
        if x1 >= x2 || y1 >= y2 {
            return Err(GeometryError::InvalidBox(format!(
                "degenerate box [{x1}, {y1}, {x2}, {y2}]"
            )));
        }
        if x2 > extent.width || y2 > extent.height {
            return Err(GeometryError::OutOfFrame {
                bbox: [x1, y1, x2, y2],
                width: extent.width,
                height: extent.height,
            });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Validate raw signed coordinates as received off the wire.
    pub fn from_coords(coords: &[i64], extent: ImageExtent) -> Result<Self> {
        let [x1, y1, x2, y2] = match coords {
            [a, b, c, d] => [*a, *b, *c, *d],
            _ => {
                return Err(GeometryError::InvalidBox(format!(
                    "expected 4 coordinates, got {}",
                    coords.len()
                )))
            }
        };
        let conv = |v: i64| {
            u32::try_from(v)
                .map_err(|_| GeometryError::InvalidBox(format!("coordinate {v} out of range")))
        };
        Self::new(conv(x1)?, conv(y1)?, conv(x2)?, conv(y2)?, extent)
    }

    pub fn x1(&self) -> u32 {
        self.x1
    }
    pub fn y1(&self) -> u32 {
        self.y1
    }
    pub fn x2(&self) -> u32 {
        self.x2
    }
    pub fn y2(&self) -> u32 {
        self.y2
    }

    pub fn to_array(&self) -> [u32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    /// Integer center pixel.
    pub fn center(&self) -> (u32, u32) {
        ((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }
}
