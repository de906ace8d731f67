//! Pinhole back-projection of image-space boxes into the camera frame.

use crate::{
    BoundingBox, CameraIntrinsics, DepthFrame, Frame, GeometryError, Result, SpatialPoint,
};
use serde::{Deserialize, Serialize};

/// How the representative depth of a box is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DepthSampling {
    /// Single sample at the box center.
    Center,
    /// Median of the valid samples in a `(2r+1)^2` window around the center.
    Median { radius: u32 },
}

impl Default for DepthSampling {
    fn default() -> Self {
        DepthSampling::Median { radius: 2 }
    }
}

fn valid(z: f32) -> Option<f64> {
    (z.is_finite() && z > 0.0).then_some(z as f64)
}

impl DepthSampling {
    /// Largest accepted median window radius.
    pub const MAX_RADIUS: u32 = 32;

    /// Rejects windows wider than [`DepthSampling::MAX_RADIUS`].
    pub fn check(&self) -> Result<()> {
        match *self {
            DepthSampling::Median { radius } if radius > Self::MAX_RADIUS => {
                Err(GeometryError::InvalidSampling(format!(
                    "median radius {radius} exceeds {}",
                    Self::MAX_RADIUS
                )))
            }
            _ => Ok(()),
        }
    }

    /// Representative depth in metres at `(u, v)`.
    pub fn sample(&self, depth: &DepthFrame, u: u32, v: u32) -> Result<f64> {
        match *self {
            DepthSampling::Center => depth
                .at(u, v)
                .and_then(valid)
                .ok_or(GeometryError::InvalidDepth { u, v }),
            DepthSampling::Median { radius } => {
                self.check()?;
                let u0 = u.saturating_sub(radius);
                let v0 = v.saturating_sub(radius);
                let u1 = u.saturating_add(radius).min(depth.width.saturating_sub(1));
                let v1 = v.saturating_add(radius).min(depth.height.saturating_sub(1));
                let window = (u1.saturating_sub(u0) as usize + 1) * (v1.saturating_sub(v0) as usize + 1);
                let mut samples = Vec::with_capacity(window);
                for y in v0..=v1 {
                    for x in u0..=u1 {
                        if let Some(z) = depth.at(x, y).and_then(valid) {
                            samples.push(z);
                        }
                    }
                }
                if samples.is_empty() {
                    return Err(GeometryError::InvalidDepth { u, v });
                }
                samples.sort_by(f64::total_cmp);
                Ok(samples[samples.len() / 2])
            }
        }
    }
}

/// Deproject the center of `bbox` with the default sampling strategy.
pub fn deproject(
    bbox: &BoundingBox,
    rgb: &Frame,
    depth: &DepthFrame,
    intr: &CameraIntrinsics,
) -> Result<SpatialPoint> {
    deproject_with(bbox, rgb, depth, intr, DepthSampling::default())
}

/// `X = (u - cx) * z / fx`, `Y = (v - cy) * z / fy`, `Z = z`.
pub fn deproject_with(
    bbox: &BoundingBox,
    rgb: &Frame,
    depth: &DepthFrame,
    intr: &CameraIntrinsics,
    sampling: DepthSampling,
) -> Result<SpatialPoint> {
    if rgb.width != depth.width || rgb.height != depth.height {
        return Err(GeometryError::FrameMismatch(format!(
            "color {}x{} vs depth {}x{}",
            rgb.width, rgb.height, depth.width, depth.height
        )));
    }
    if depth.width != intr.width || depth.height != intr.height {
        return Err(GeometryError::FrameMismatch(format!(
            "depth {}x{} vs intrinsics {}x{}",
            depth.width, depth.height, intr.width, intr.height
        )));
    }
    if bbox.x2() > depth.width || bbox.y2() > depth.height {
        return Err(GeometryError::OutOfFrame {
            bbox: bbox.to_array(),
            width: depth.width,
            height: depth.height,
        });
    }

    let (u, v) = bbox.center();
    let z = sampling.sample(depth, u, v)?;
    let x = (u as f64 - intr.cx) * z / intr.fx;
    let y = (v as f64 - intr.cy) * z / intr.fy;
    tracing::debug!(u, v, x, y, z, "deprojected box center");
    Ok(SpatialPoint::new(x, y, z))
}
