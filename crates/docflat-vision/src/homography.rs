// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Homography — 3x3 projective transforms between quadrilaterals, estimated
// with a Hartley-normalised direct linear transform.

use docflat_core::Point;
use docflat_core::error::{DocflatError, Result};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// Triangle area below this fraction of its longest side squared counts as
/// collinear.
const COLLINEAR_EPS: f64 = 1e-6;

/// Homogeneous weights closer to zero than this project to infinity.
const W_EPS: f64 = 1e-12;

/// A projective transform, normalised so that `h[2][2] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    /// Solve for the homography taking each `src[i]` onto `dst[i]`.
    ///
    /// Fails with `Transform` when either quadrilateral has three (near-)
    /// collinear corners or the resulting matrix is singular.
    pub fn from_quad(src: &[Point; 4], dst: &[Point; 4]) -> Result<Self> {
        check_general_position(src, "source")?;
        check_general_position(dst, "destination")?;

        let (t_src, src_n) = normalize_points(src);
        let (t_dst, dst_n) = normalize_points(dst);

        // Fix h33 = 1, leaving eight unknowns and two equations per corner:
        //   [x y 1 0 0 0 -ux -uy] h = u
        //   [0 0 0 x y 1 -vx -vy] h = v
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();
        for i in 0..4 {
            let (x, y) = (src_n[i].x, src_n[i].y);
            let (u, v) = (dst_n[i].x, dst_n[i].y);
            let r = 2 * i;

            a[(r, 0)] = x;
            a[(r, 1)] = y;
            a[(r, 2)] = 1.0;
            a[(r, 6)] = -u * x;
            a[(r, 7)] = -u * y;
            b[r] = u;

            a[(r + 1, 3)] = x;
            a[(r + 1, 4)] = y;
            a[(r + 1, 5)] = 1.0;
            a[(r + 1, 6)] = -v * x;
            a[(r + 1, 7)] = -v * y;
            b[r + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or_else(|| DocflatError::Transform("DLT system is singular".into()))?;
        let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);

        // Denormalise: H = T_dst^-1 * H_norm * T_src
        let t_dst_inv = t_dst
            .try_inverse()
            .ok_or_else(|| DocflatError::Transform("destination normaliser not invertible".into()))?;
        Self::normalized(t_dst_inv * h_norm * t_src)
    }

    /// Wrap a row-major matrix, rescaling it so `h[2][2] == 1`.
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Result<Self> {
        Self::normalized(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    fn normalized(matrix: Matrix3<f64>) -> Result<Self> {
        let scale = matrix[(2, 2)];
        if scale.abs() < W_EPS || !scale.is_finite() {
            return Err(DocflatError::Transform(
                "homography maps the origin to infinity".into(),
            ));
        }
        let matrix = matrix / scale;
        if matrix.iter().any(|v| !v.is_finite()) || matrix.determinant().abs() < W_EPS {
            return Err(DocflatError::Transform("homography is singular".into()));
        }
        Ok(Self { matrix })
    }

    /// Map a point; `None` if it lands on the line at infinity.
    pub fn project(&self, p: Point) -> Option<Point> {
        let q = self.matrix * Vector3::new(p.x, p.y, 1.0);
        if q[2].abs() < W_EPS {
            return None;
        }
        Some(Point::new(q[0] / q[2], q[1] / q[2]))
    }

    pub fn inverse(&self) -> Result<Self> {
        let inv = self
            .matrix
            .try_inverse()
            .ok_or_else(|| DocflatError::Transform("homography is not invertible".into()))?;
        Self::normalized(inv)
    }

    /// Row-major copy of the matrix.
    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.matrix;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    /// Row-major `f32` matrix in the layout `imageproc` projections expect.
    pub fn to_f32_array(&self) -> [f32; 9] {
        let r = self.to_rows();
        [
            r[0][0] as f32,
            r[0][1] as f32,
            r[0][2] as f32,
            r[1][0] as f32,
            r[1][1] as f32,
            r[1][2] as f32,
            r[2][0] as f32,
            r[2][1] as f32,
            r[2][2] as f32,
        ]
    }
}

// -- Helpers ------------------------------------------------------------------

fn check_general_position(points: &[Point; 4], which: &str) -> Result<()> {
    for skip in 0..4 {
        let mut tri = points.iter().enumerate().filter(|(i, _)| *i != skip).map(|(_, p)| p);
        let (Some(a), Some(b), Some(c)) = (tri.next(), tri.next(), tri.next()) else {
            continue;
        };
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        let longest = a.distance(b).max(b.distance(c)).max(a.distance(c));
        if !cross.is_finite() || longest == 0.0 || cross.abs() <= COLLINEAR_EPS * longest * longest
        {
            return Err(DocflatError::Transform(format!(
                "{which} corners contain three collinear points"
            )));
        }
    }
    Ok(())
}

/// Translate the centroid to the origin and scale the mean distance to sqrt(2).
fn normalize_points(points: &[Point; 4]) -> (Matrix3<f64>, [Point; 4]) {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / 4.0;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = points.map(|p| Point::new(s * (p.x - cx), s * (p.y - cy)));
    (t, normalized)
}
