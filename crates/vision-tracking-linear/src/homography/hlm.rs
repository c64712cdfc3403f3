//! Closed-form estimation with a known scene structure.
//!
//! Planar scenes: both point sets are expressed in the projective frame of
//! four basis points (three corners of the frame plus the unit point), where
//! the homography is close to identity, then solved by DLT over all points
//! and mapped back.
//!
//! Non-planar scenes: the fundamental matrix is estimated first and the
//! homography induced by the plane through three reference points is
//! recovered as `H = [e']x F - e' v^T` (Hartley & Zisserman, Result 13.6).

use super::dlt::{solve_homogeneous, DEFAULT_SINGULAR_THRESHOLD};
use super::{check_pairs, Homography, HomographyError};
use crate::epipolar::fundamental_8point;
use crate::math::triangle_shape_ratio;
use vision_tracking_core::{skew, to_homogeneous, Mat3, Pt2, Real, Vec3};

/// Minimum triangle shape ratio accepted for basis points.
const MIN_BASIS_SHAPE: Real = 1e-6;

/// Pick four points spanning the set: far apart and with no three collinear.
fn select_basis(points: &[Pt2]) -> Result<[usize; 4], HomographyError> {
    let degenerate = HomographyError::DegenerateConfiguration("collinear projective basis");
    let i0 = 0;
    let i1 = (0..points.len())
        .max_by(|&i, &j| {
            let di = (points[i] - points[i0]).norm_squared();
            let dj = (points[j] - points[i0]).norm_squared();
            di.total_cmp(&dj)
        })
        .ok_or(degenerate.clone())?;
    let i2 = (0..points.len())
        .max_by(|&i, &j| {
            let ai = triangle_shape_ratio(&points[i0], &points[i1], &points[i]).abs();
            let aj = triangle_shape_ratio(&points[i0], &points[i1], &points[j]).abs();
            ai.total_cmp(&aj)
        })
        .ok_or(degenerate.clone())?;

    let worst_triplet = |k: usize| -> Real {
        let (a, b, c, d) = (&points[i0], &points[i1], &points[i2], &points[k]);
        [
            triangle_shape_ratio(a, b, d),
            triangle_shape_ratio(a, c, d),
            triangle_shape_ratio(b, c, d),
            triangle_shape_ratio(a, b, c),
        ]
        .iter()
        .map(|r| r.abs())
        .fold(Real::INFINITY, Real::min)
    };
    let i3 = (0..points.len())
        .filter(|&k| k != i0 && k != i1 && k != i2)
        .max_by(|&i, &j| worst_triplet(i).total_cmp(&worst_triplet(j)))
        .ok_or(degenerate.clone())?;

    if worst_triplet(i3) < MIN_BASIS_SHAPE {
        return Err(degenerate);
    }
    Ok([i0, i1, i2, i3])
}

/// Collineation taking the basis points to `e1, e2, e3, (1, 1, 1)`.
fn basis_transform(points: &[Pt2], basis: &[usize; 4]) -> Result<Mat3, HomographyError> {
    let p = |i: usize| to_homogeneous(&points[basis[i]]);
    let m = Mat3::from_columns(&[p(0), p(1), p(2)]);
    let lambda = m
        .lu()
        .solve(&p(3))
        .ok_or(HomographyError::DegenerateConfiguration("collinear projective basis"))?;
    let scaled = Mat3::from_columns(&[p(0) * lambda.x, p(1) * lambda.y, p(2) * lambda.z]);
    scaled
        .try_inverse()
        .ok_or(HomographyError::DegenerateConfiguration("collinear projective basis"))
}

pub(crate) fn hlm_planar(points_b: &[Pt2], points_a: &[Pt2]) -> Result<Homography, HomographyError> {
    check_pairs(points_b, points_a, 4)?;
    let basis = select_basis(points_b)?;
    let tb = basis_transform(points_b, &basis)?;
    let ta = basis_transform(points_a, &basis)?;

    let canon = |t: &Mat3, pts: &[Pt2]| -> Vec<Vec3> {
        pts.iter()
            .map(|p| {
                let v = t * to_homogeneous(p);
                v / v.norm()
            })
            .collect()
    };
    let cb = canon(&tb, points_b);
    let ca = canon(&ta, points_a);

    let hc = solve_homogeneous(&cb, &ca, None, DEFAULT_SINGULAR_THRESHOLD)?;
    let ta_inv = ta
        .try_inverse()
        .ok_or(HomographyError::DegenerateConfiguration("collinear projective basis"))?;
    Ok(Homography::canonical_or_unit(ta_inv * hc * tb))
}

pub(crate) fn hlm_non_planar(
    points_b: &[Pt2],
    points_a: &[Pt2],
) -> Result<Homography, HomographyError> {
    check_pairs(points_b, points_a, 8)?;

    let f = fundamental_8point(points_b, points_a)?;

    // Epipole in A: left null vector of F.
    let svd = f.transpose().svd(false, true);
    let v_t = svd.v_t.ok_or(HomographyError::SvdFailed)?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .ok_or(HomographyError::SvdFailed)?;
    let e = v_t.row(min_idx).transpose();

    // First three non-collinear points define the plane.
    let refs = (2..points_b.len())
        .find_map(|k| {
            (triangle_shape_ratio(&points_b[0], &points_b[1], &points_b[k]).abs()
                > MIN_BASIS_SHAPE)
                .then_some([0, 1, k])
        })
        .ok_or(HomographyError::DegenerateConfiguration(
            "reference points are collinear",
        ))?;

    let a_mat = skew(&e) * f;
    let mut m = Mat3::zeros();
    let mut rhs = Vec3::zeros();
    for (row, &i) in refs.iter().enumerate() {
        let xb = to_homogeneous(&points_b[i]);
        let xa = to_homogeneous(&points_a[i]);
        let xe = xa.cross(&e);
        let denom = xe.norm_squared();
        if denom <= Real::EPSILON {
            return Err(HomographyError::NumericalDegeneracy("point on the epipole"));
        }
        m.set_row(row, &xb.transpose());
        rhs[row] = xa.cross(&(a_mat * xb)).dot(&xe) / denom;
    }
    let v = m
        .lu()
        .solve(&rhs)
        .ok_or(HomographyError::DegenerateConfiguration(
            "reference points are collinear",
        ))?;

    Ok(Homography::canonical_or_unit(a_mat - e * v.transpose()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};
    use vision_tracking_core::synthetic::{grid_points, map_points};
    use vision_tracking_core::{Iso3, PinholeIntrinsics, Plane, Pt3};

    #[test]
    fn planar_hlm_recovers_homography() {
        let truth = Mat3::new(0.9, -0.12, 25.0, 0.07, 1.1, -14.0, -3e-4, 1e-4, 1.0);
        let b = grid_points(Pt2::new(20.0, 30.0), 4, 3, 60.0);
        let a = map_points(&truth, &b).unwrap();
        let h = hlm_planar(&b, &a).unwrap();
        let d = h.distance(&Homography::from_matrix(truth));
        assert!(d < 1e-9, "distance {d}");
    }

    #[test]
    fn planar_hlm_rejects_collinear_basis() {
        let b: Vec<Pt2> = (0..6).map(|i| Pt2::new(i as Real, 2.0 * i as Real)).collect();
        let res = hlm_planar(&b, &b);
        assert!(matches!(res, Err(HomographyError::DegenerateConfiguration(_))));
    }

    #[test]
    fn non_planar_hlm_recovers_reference_plane_homography() {
        let k = PinholeIntrinsics::new(700.0, 700.0, 320.0, 240.0);
        let a_from_b = Iso3::from_parts(
            Translation3::new(0.2, -0.05, 0.05),
            UnitQuaternion::from_euler_angles(0.03, -0.08, 0.02),
        );
        let world = [
            Pt3::new(-0.3, -0.2, 2.0),
            Pt3::new(0.4, -0.25, 2.2),
            Pt3::new(0.1, 0.3, 1.8),
            Pt3::new(-0.2, 0.1, 2.6),
            Pt3::new(0.25, 0.05, 3.0),
            Pt3::new(-0.35, 0.35, 2.4),
            Pt3::new(0.05, -0.3, 2.9),
            Pt3::new(0.3, 0.25, 2.1),
            Pt3::new(-0.1, -0.05, 1.7),
            Pt3::new(0.15, -0.15, 2.5),
        ];
        let mut b = Vec::new();
        let mut a = Vec::new();
        for p in &world {
            b.push(k.project(p).unwrap());
            a.push(k.project(&(a_from_b * p)).unwrap());
        }

        let plane = Plane::from_points(&world[0], &world[1], &world[2]).unwrap();
        let truth = Homography::from_pose_plane(&a_from_b, &plane)
            .unwrap()
            .to_pixel(&k)
            .unwrap();

        let h = hlm_non_planar(&b, &a).unwrap();
        let d = h.distance(&truth);
        assert!(d < 1e-6, "distance {d}");
    }

    #[test]
    fn non_planar_hlm_needs_eight_points() {
        let b = grid_points(Pt2::new(0.0, 0.0), 3, 2, 10.0);
        assert_eq!(
            hlm_non_planar(&b, &b),
            Err(HomographyError::NotEnoughPoints { required: 8, got: 6 })
        );
    }
}
