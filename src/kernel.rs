use crate::{UmbraError, UmbraResult};

/// A square, odd-sided blur kernel with a precomputed 2D prefix-sum table.
///
/// Weights are normalized at construction so the full-kernel sum is `1.0`; the
/// prefix table therefore feeds 8-bit channel scaling directly. Consumers only ever
/// read a `&Kernel`; nothing in this crate mutates one after construction.
#[derive(Clone, Debug)]
pub struct Kernel {
    diameter: usize,
    weights: Vec<f64>,
    prefix: Vec<f64>,
}

impl Kernel {
    /// Build a kernel from a `diameter * diameter` weight table.
    ///
    /// The diameter must be odd and positive, and the weights finite, non-negative,
    /// and not all zero. Weights are normalized to sum to `1.0`.
    pub fn from_weights(diameter: usize, weights: Vec<f64>) -> UmbraResult<Self> {
        if diameter == 0 || diameter % 2 == 0 {
            return Err(UmbraError::validation(
                "kernel diameter must be odd and positive",
            ));
        }
        let expected_len = diameter
            .checked_mul(diameter)
            .ok_or_else(|| UmbraError::validation("kernel size overflow"))?;
        if weights.len() != expected_len {
            return Err(UmbraError::validation(
                "kernel weights must match diameter*diameter",
            ));
        }
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(UmbraError::validation(
                "kernel weights must be finite and non-negative",
            ));
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(UmbraError::validation("kernel weight sum must be > 0"));
        }

        let weights: Vec<f64> = weights.iter().map(|w| w / total).collect();
        let prefix = prefix_sums(diameter, &weights);
        Ok(Self {
            diameter,
            weights,
            prefix,
        })
    }

    /// Build a Gaussian kernel of the given radius (side `2*radius + 1`).
    ///
    /// Radius 0 yields a single unit weight, which produces sharp shadows.
    pub fn gaussian(radius: usize) -> UmbraResult<Self> {
        if radius == 0 {
            return Self::from_weights(1, vec![1.0]);
        }
        let d = 2 * radius + 1;
        let center = radius as f64;
        let sigma2 = (radius * radius) as f64;
        let mut weights = Vec::with_capacity(d * d);
        for y in 0..d {
            for x in 0..d {
                let dx = x as f64 - center;
                let dy = y as f64 - center;
                weights.push((-0.5 * (dx * dx + dy * dy) / sigma2).exp());
            }
        }
        Self::from_weights(d, weights)
    }

    /// Kernel side length `d = 2r + 1`.
    pub fn diameter(&self) -> usize {
        self.diameter
    }

    /// Half the side length, `d / 2`.
    pub fn radius(&self) -> usize {
        self.diameter / 2
    }

    /// Normalized weight at `(x, y)`.
    pub fn weight(&self, x: usize, y: usize) -> f64 {
        self.weights[y * self.diameter + x]
    }

    /// Row-major inclusive prefix-sum table: entry `y*d + x` is the sum of
    /// normalized weights over the rectangle `(0, 0)..=(x, y)`.
    pub fn prefix_sums(&self) -> &[f64] {
        &self.prefix
    }

    /// Sum of normalized weights over the rectangle with top-left `(x, y)` and the
    /// given size, clipped to the kernel bounds. The top-left may be negative.
    pub fn sum_clipped(&self, x: i32, y: i32, width: u32, height: u32) -> f64 {
        let d = self.diameter as i64;
        let x0 = i64::from(x).clamp(0, d);
        let y0 = i64::from(y).clamp(0, d);
        let x1 = (i64::from(x) + i64::from(width)).clamp(0, d);
        let y1 = (i64::from(y) + i64::from(height)).clamp(0, d);
        if x1 <= x0 || y1 <= y0 {
            return 0.0;
        }
        self.corner(x1 - 1, y1 - 1) - self.corner(x0 - 1, y1 - 1) - self.corner(x1 - 1, y0 - 1)
            + self.corner(x0 - 1, y0 - 1)
    }

    // Inclusive prefix lookup with a zero row/column at index -1.
    fn corner(&self, x: i64, y: i64) -> f64 {
        if x < 0 || y < 0 {
            return 0.0;
        }
        self.prefix[y as usize * self.diameter + x as usize]
    }
}

fn prefix_sums(d: usize, weights: &[f64]) -> Vec<f64> {
    let mut prefix = vec![0.0; weights.len()];
    for y in 0..d {
        let mut row = 0.0;
        for x in 0..d {
            row += weights[y * d + x];
            let above = if y > 0 { prefix[(y - 1) * d + x] } else { 0.0 };
            prefix[y * d + x] = row + above;
        }
    }
    prefix
}
