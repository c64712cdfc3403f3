//! Binary pixel mask restricting where new features may be selected.

use vision_tracking_core::{Pt2, Real};

/// `width x height` raster; `true` marks pixels eligible for new features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl FeatureMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mask value at integer pixel `(u, v)`; out-of-image pixels are `false`.
    pub fn get(&self, u: u32, v: u32) -> bool {
        if u >= self.width || v >= self.height {
            return false;
        }
        self.data[(v * self.width + u) as usize]
    }

    /// Mask value at the pixel containing `p`.
    pub fn contains(&self, p: &Pt2) -> bool {
        if !(p.x >= 0.0 && p.y >= 0.0) {
            return false;
        }
        self.get(p.x as u32, p.y as u32)
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|b| **b).count()
    }

    pub fn clear(&mut self) {
        self.data.fill(false);
    }

    /// Mark the interior of `polygon` (pixel coordinates), keeping only pixels
    /// at least `border` pixels away from every edge.
    pub fn fill_polygon(&mut self, polygon: &[Pt2], border: u32) {
        if polygon.len() < 3 {
            return;
        }
        let Some((u0, u1, v0, v1)) = self.clamped_bounds(polygon) else {
            return;
        };
        let border = border as Real;
        for v in v0..=v1 {
            for u in u0..=u1 {
                let p = Pt2::new(u as Real, v as Real);
                if !point_in_polygon(&p, polygon) {
                    continue;
                }
                if border > 0.0 && distance_to_boundary(&p, polygon) < border {
                    continue;
                }
                self.data[(v * self.width + u) as usize] = true;
            }
        }
    }

    fn clamped_bounds(&self, polygon: &[Pt2]) -> Option<(u32, u32, u32, u32)> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let (mut umin, mut umax, mut vmin, mut vmax) =
            (Real::INFINITY, Real::NEG_INFINITY, Real::INFINITY, Real::NEG_INFINITY);
        for p in polygon {
            umin = umin.min(p.x);
            umax = umax.max(p.x);
            vmin = vmin.min(p.y);
            vmax = vmax.max(p.y);
        }
        let w = (self.width - 1) as Real;
        let h = (self.height - 1) as Real;
        if umax < 0.0 || vmax < 0.0 || umin > w || vmin > h {
            return None;
        }
        Some((
            umin.max(0.0).floor() as u32,
            umax.min(w).ceil() as u32,
            vmin.max(0.0).floor() as u32,
            vmax.min(h).ceil() as u32,
        ))
    }
}

/// Even-odd point-in-polygon test.
pub fn point_in_polygon(p: &Pt2, polygon: &[Pt2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn distance_to_boundary(p: &Pt2, polygon: &[Pt2]) -> Real {
    let n = polygon.len();
    (0..n)
        .map(|i| segment_distance(p, &polygon[i], &polygon[(i + 1) % n]))
        .fold(Real::INFINITY, Real::min)
}

fn segment_distance(p: &Pt2, a: &Pt2, b: &Pt2) -> Real {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= Real::EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(a: Real, b: Real) -> Vec<Pt2> {
        vec![Pt2::new(a, a), Pt2::new(b, a), Pt2::new(b, b), Pt2::new(a, b)]
    }

    #[test]
    fn fills_interior_and_respects_border() {
        let mut mask = FeatureMask::new(100, 100);
        mask.fill_polygon(&square(10.0, 50.0), 0);
        assert!(mask.get(30, 30));
        assert!(mask.get(11, 11));
        assert!(!mask.get(60, 60));

        let mut inset = FeatureMask::new(100, 100);
        inset.fill_polygon(&square(10.0, 50.0), 5);
        assert!(inset.get(30, 30));
        assert!(!inset.get(12, 30), "pixel 2 px from the edge must be masked out");
        assert!(inset.get(15, 30));
        assert!(inset.count() < mask.count());
    }

    #[test]
    fn polygon_outside_image_leaves_mask_empty() {
        let mut mask = FeatureMask::new(50, 50);
        mask.fill_polygon(&square(100.0, 200.0), 0);
        assert_eq!(mask.count(), 0);
        assert!(!mask.contains(&Pt2::new(-1.0, 3.0)));
    }

    #[test]
    fn even_odd_test_handles_concave_shapes() {
        let l_shape = vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(4.0, 0.0),
            Pt2::new(4.0, 1.0),
            Pt2::new(1.0, 1.0),
            Pt2::new(1.0, 4.0),
            Pt2::new(0.0, 4.0),
        ];
        assert!(point_in_polygon(&Pt2::new(0.5, 3.0), &l_shape));
        assert!(point_in_polygon(&Pt2::new(3.0, 0.5), &l_shape));
        assert!(!point_in_polygon(&Pt2::new(3.0, 3.0), &l_shape));
    }
}
