//! Deterministic synthetic scenes: correspondences under a known homography,
//! a box-shaped polyhedral model and points scattered over its faces.

mod noise;

pub use noise::PixelNoise;

use crate::{from_homogeneous, to_homogeneous, Mat3, Pt2, Pt3, Real, Vec3};
use anyhow::{ensure, Context, Result};

/// Regular `cols x rows` grid with the given origin and spacing.
pub fn grid_points(origin: Pt2, cols: usize, rows: usize, spacing: Real) -> Vec<Pt2> {
    let mut pts = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        for c in 0..cols {
            pts.push(Pt2::new(
                origin.x + c as Real * spacing,
                origin.y + r as Real * spacing,
            ));
        }
    }
    pts
}

/// Map every point through `h` (frame B to frame A).
pub fn map_points(h: &Mat3, points_b: &[Pt2]) -> Result<Vec<Pt2>> {
    points_b
        .iter()
        .map(|p| from_homogeneous(&(h * to_homogeneous(p))).context("point mapped to infinity"))
        .collect()
}

/// Correspondences under `h` with uniform noise on the A side and gross outliers.
///
/// Points whose index is listed in `outliers` are displaced by
/// `outlier_distance` pixels in a pseudo-random direction.
pub fn homography_correspondences(
    h: &Mat3,
    points_b: &[Pt2],
    noise: &PixelNoise,
    outliers: &[usize],
    outlier_distance: Real,
) -> Result<Vec<Pt2>> {
    let mut points_a = map_points(h, points_b)?;
    for (i, p) in points_a.iter_mut().enumerate() {
        *p += noise.sample(0, i);
    }
    for &i in outliers {
        ensure!(i < points_a.len(), "outlier index {} out of range", i);
        points_a[i] += noise.direction(1, i) * outlier_distance;
    }
    Ok(points_a)
}

/// Corners of an axis-aligned cube of half-size `half`, centred on the origin.
///
/// Each face is wound counter-clockwise when seen from outside, so
/// `(p1 - p0) x (p2 - p1)` is its outward normal. Faces are ordered
/// `-Z, +Z, -X, +X, -Y, +Y`.
pub fn box_faces(half: Real) -> Vec<Vec<Pt3>> {
    let s = half;
    let p = Pt3::new;
    vec![
        vec![p(-s, -s, -s), p(-s, s, -s), p(s, s, -s), p(s, -s, -s)],
        vec![p(-s, -s, s), p(s, -s, s), p(s, s, s), p(-s, s, s)],
        vec![p(-s, -s, -s), p(-s, -s, s), p(-s, s, s), p(-s, s, -s)],
        vec![p(s, -s, -s), p(s, s, -s), p(s, s, s), p(s, -s, s)],
        vec![p(-s, -s, -s), p(s, -s, -s), p(s, -s, s), p(-s, -s, s)],
        vec![p(-s, s, -s), p(-s, s, s), p(s, s, s), p(s, s, -s)],
    ]
}

/// `cols x rows` points inside a planar quadrilateral face.
///
/// Points are bilinear combinations of the corners with parameters in
/// `[inset, 1 - inset]`, so they stay clear of the face border.
pub fn face_points(corners: &[Pt3], cols: usize, rows: usize, inset: Real) -> Result<Vec<Pt3>> {
    ensure!(corners.len() == 4, "expected a quadrilateral, got {} corners", corners.len());
    ensure!(cols >= 2 && rows >= 2, "need at least a 2x2 grid");
    ensure!((0.0..0.5).contains(&inset), "inset must be in [0, 0.5)");

    let lerp = |a: &Pt3, b: &Pt3, t: Real| -> Vec3 { a.coords * (1.0 - t) + b.coords * t };
    let mut pts = Vec::with_capacity(cols * rows);
    for r in 0..rows {
        let v = inset + (1.0 - 2.0 * inset) * r as Real / (rows - 1) as Real;
        for c in 0..cols {
            let u = inset + (1.0 - 2.0 * inset) * c as Real / (cols - 1) as Real;
            let bottom = lerp(&corners[0], &corners[1], u);
            let top = lerp(&corners[3], &corners[2], u);
            pts.push(Pt3::from(bottom * (1.0 - v) + top * v));
        }
    }
    Ok(pts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_faces_have_outward_normals() {
        for face in box_faces(0.1) {
            let n = (face[1] - face[0]).cross(&(face[2] - face[1]));
            let centroid = face.iter().fold(Vec3::zeros(), |acc, p| acc + p.coords) / 4.0;
            assert!(n.dot(&centroid) > 0.0, "inward normal for face {face:?}");
        }
    }

    #[test]
    fn face_points_stay_on_the_face() -> Result<()> {
        let faces = box_faces(0.1);
        let pts = face_points(&faces[3], 5, 3, 0.2)?;
        assert_eq!(pts.len(), 15);
        for p in &pts {
            assert!((p.x - 0.1).abs() < 1e-12);
            assert!(p.y.abs() <= 0.06 + 1e-12 && p.z.abs() <= 0.06 + 1e-12);
        }
        Ok(())
    }

    #[test]
    fn outliers_are_displaced_by_the_requested_distance() -> Result<()> {
        let h = Mat3::new(1.1, 0.02, 5.0, -0.01, 0.95, -3.0, 1e-4, 2e-4, 1.0);
        let b = grid_points(Pt2::new(10.0, 20.0), 4, 3, 30.0);
        let exact = map_points(&h, &b)?;
        let a = homography_correspondences(&h, &b, &PixelNoise::default(), &[2], 40.0)?;
        assert!(((a[2] - exact[2]).norm() - 40.0).abs() < 1e-9);
        assert!((a[0] - exact[0]).norm() < 1e-12);
        Ok(())
    }
}
