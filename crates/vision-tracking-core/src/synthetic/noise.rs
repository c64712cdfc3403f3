//! Deterministic noise for synthetic correspondences.
//!
//! Avoids `thread_rng` and the internal algorithm of `rand` generators so
//! synthetic data stays identical across versions and platforms.

use crate::{Real, Vec2};

/// Deterministic uniform pixel noise in `[-amplitude, +amplitude]` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelNoise {
    pub seed: u64,
    /// Maximum absolute per-axis noise (pixels).
    pub amplitude: Real,
}

impl PixelNoise {
    pub fn new(seed: u64, amplitude: Real) -> Self {
        Self { seed, amplitude }
    }

    /// Noise vector for stream `stream` and point `index`.
    pub fn sample(&self, stream: usize, index: usize) -> Vec2 {
        let a = self.amplitude.abs();
        if a == 0.0 {
            return Vec2::zeros();
        }
        let key = self.seed
            ^ (stream as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        let u = unit(splitmix64(key));
        let v = unit(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        Vec2::new((2.0 * u - 1.0) * a, (2.0 * v - 1.0) * a)
    }

    /// Unit direction for point `index`, used to push outliers a fixed distance away.
    pub fn direction(&self, stream: usize, index: usize) -> Vec2 {
        let key = splitmix64(self.seed.wrapping_add(0xD1B5_4A32_D192_ED03))
            ^ (stream as u64).rotate_left(17)
            ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let angle = unit(splitmix64(key)) * std::f64::consts::TAU;
        Vec2::new(angle.cos(), angle.sin())
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Top 53 bits as a double in `[0, 1)`.
fn unit(x: u64) -> Real {
    ((x >> 11) as Real) * (1.0 / ((1u64 << 53) as Real))
}
