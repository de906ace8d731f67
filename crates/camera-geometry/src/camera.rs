use serde::{Deserialize, Serialize};

/// Pinhole intrinsics of the color stream (depth is aligned to it).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Default for CameraIntrinsics {
    /// Factory calibration of the head-mounted RealSense at 640x360.
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            fx: 345.9,
            fy: 346.0,
            cx: 322.7,
            cy: 181.3,
        }
    }
}

impl CameraIntrinsics {
    /// Project a camera-frame point back to pixel coordinates.
    pub fn project(&self, p: &SpatialPoint) -> (f64, f64) {
        (
            p.x * self.fx / p.z + self.cx,
            p.y * self.fy / p.z + self.cy,
        )
    }
}

/// 3D point in the camera optical frame (metres). Only deprojection creates these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpatialPoint {
    x: f64,
    y: f64,
    z: f64,
}

impl SpatialPoint {
    pub(crate) fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Rigid camera_T_base transform, row-major 4x4.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraExtrinsics {
    #[serde(rename = "camera_T_base")]
    pub camera_t_base: [f64; 16],
}

impl Default for CameraExtrinsics {
    fn default() -> Self {
        Self {
            camera_t_base: [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }
}

impl CameraExtrinsics {
    /// Express a camera-frame point in the robot base frame: X_base = inv(camera_T_base) * X_cam.
    pub fn to_base(&self, p: &SpatialPoint) -> [f64; 3] {
        let m = &self.camera_t_base;
        let r_cb = [[m[0], m[1], m[2]], [m[4], m[5], m[6]], [m[8], m[9], m[10]]];
        let t_cb = [m[3], m[7], m[11]];
        // inverse of (R t; 0 1) is (R^T, -R^T t)
        let mut out = [0.0; 3];
        for (i, o) in out.iter_mut().enumerate() {
            let r_col = [r_cb[0][i], r_cb[1][i], r_cb[2][i]];
            *o = r_col[0] * (p.x - t_cb[0]) + r_col[1] * (p.y - t_cb[1]) + r_col[2] * (p.z - t_cb[2]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_extrinsics_keep_point() {
        let p = SpatialPoint::new(0.1, -0.2, 0.8);
        assert_eq!(CameraExtrinsics::default().to_base(&p), [0.1, -0.2, 0.8]);
    }

    #[test]
    fn translated_camera() {
        // camera sits 0.5 m above the base origin looking along base +z
        let ext = CameraExtrinsics {
            camera_t_base: [
                1.0, 0.0, 0.0, 0.0, //
                0.0, 1.0, 0.0, 0.5, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        };
        let p = SpatialPoint::new(0.0, 0.5, 1.0);
        let b = ext.to_base(&p);
        assert!((b[1]).abs() < 1e-12);
        assert!((b[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rotated_camera_round_trips_axis() {
        // 90 degrees about z
        let ext = CameraExtrinsics {
            camera_t_base: [
                0.0, -1.0, 0.0, 0.0, //
                1.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 1.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        };
        let b = ext.to_base(&SpatialPoint::new(1.0, 0.0, 0.0));
        assert!((b[0]).abs() < 1e-12);
        assert!((b[1] + 1.0).abs() < 1e-12);
    }
}
