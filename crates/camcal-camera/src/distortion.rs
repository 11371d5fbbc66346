use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Brown-Conrady lens distortion with three radial and two tangential terms.
///
/// Coefficients are stored and serialised in the conventional
/// `(k1, k2, p1, p2, k3)` order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl Distortion {
    pub const UNDISTORT_ITERS: usize = 20;

    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|&c| c == 0.0)
    }

    /// Apply distortion to an ideal normalized image point.
    #[inline]
    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xy2 = 2.0 * x * y;
        let dx = self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x);
        let dy = self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2;
        Vector2::new(x * radial + dx, y * radial + dy)
    }

    /// Invert [`Self::distort`] by fixed-point iteration.
    pub fn undistort(&self, d: &Vector2<f64>) -> Vector2<f64> {
        if self.is_zero() {
            return *d;
        }
        let (mut x, mut y) = (d.x, d.y);
        for _ in 0..Self::UNDISTORT_ITERS {
            let r2 = x * x + y * y;
            let icdist = 1.0 / (1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3)));
            if !icdist.is_finite() || icdist <= 0.0 {
                // Outside the invertible region of the radial polynomial.
                return Vector2::new(x, y);
            }
            let xy2 = 2.0 * x * y;
            let dx = self.p1 * xy2 + self.p2 * (r2 + 2.0 * x * x);
            let dy = self.p1 * (r2 + 2.0 * y * y) + self.p2 * xy2;
            x = (d.x - dx) * icdist;
            y = (d.y - dy) * icdist;
        }
        Vector2::new(x, y)
    }
}
