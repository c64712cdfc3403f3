use nalgebra::{Isometry3, Matrix3, Matrix6, Point2, Point3, Vector2, Vector3, Vector6};

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Vec3 = Vector3<Real>;
pub type Vec6 = Vector6<Real>;
pub type Pt2 = Point2<Real>;
pub type Pt3 = Point3<Real>;
pub type Mat3 = Matrix3<Real>;
pub type Mat6 = Matrix6<Real>;
pub type Iso3 = Isometry3<Real>;

pub fn to_homogeneous(p: &Pt2) -> Vec3 {
    Vec3::new(p.x, p.y, 1.0)
}

/// Dehomogenize `v`, returning `None` when the last coordinate is (near) zero.
pub fn from_homogeneous(v: &Vec3) -> Option<Pt2> {
    if v.z.abs() <= Real::EPSILON {
        return None;
    }
    Some(Pt2::new(v.x / v.z, v.y / v.z))
}

/// Skew-symmetric matrix `[v]x` such that `[v]x * w = v x w`.
pub fn skew(v: &Vec3) -> Mat3 {
    Mat3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Median of a slice of values. Returns `None` for empty input.
///
/// Works on a scratch copy; the input is left untouched.
pub fn median(values: &[Real]) -> Option<Real> {
    if values.is_empty() {
        return None;
    }
    let mut scratch = values.to_vec();
    let mid = scratch.len() / 2;
    let (_, m, _) = scratch.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    let upper = *m;
    if scratch.len() % 2 == 1 {
        return Some(upper);
    }
    let lower = scratch[..mid]
        .iter()
        .copied()
        .fold(Real::NEG_INFINITY, Real::max);
    Some(0.5 * (lower + upper))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn skew_matches_cross_product() {
        let a = Vec3::new(0.3, -1.2, 2.0);
        let b = Vec3::new(-0.7, 0.4, 1.1);
        let diff = (skew(&a) * b - a.cross(&b)).norm();
        assert!(diff < 1e-12, "skew mismatch: {diff}");
    }

    #[test]
    fn dehomogenize_rejects_points_at_infinity() {
        assert!(from_homogeneous(&Vec3::new(1.0, 2.0, 0.0)).is_none());
        let p = from_homogeneous(&Vec3::new(2.0, 4.0, 2.0)).unwrap();
        assert_eq!(p, Pt2::new(1.0, 2.0));
    }
}
