//! Sample interpolation for fractional playback positions.

/// Interpolation method used when reading between sample frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    /// Nearest lower frame (cheapest, aliased).
    None,
    /// Linear interpolation between two frames.
    Linear,
    /// 4-point cubic interpolation.
    #[default]
    FourthOrder,
}

impl Interpolation {
    /// Interpolate at `frac` ∈ [0, 1) between `y1` and `y2`.
    ///
    /// `y0` is the frame before `y1`, `y3` the frame after `y2`.
    #[inline]
    pub fn apply(self, y0: f32, y1: f32, y2: f32, y3: f32, frac: f32) -> f32 {
        match self {
            Interpolation::None => y1,
            Interpolation::Linear => y1 + (y2 - y1) * frac,
            Interpolation::FourthOrder => {
                // Catmull-Rom (4-point, 3rd-order Hermite)
                let c1 = 0.5 * (y2 - y0);
                let c2 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
                let c3 = 0.5 * (y3 - y0) + 1.5 * (y1 - y2);

                ((c3 * frac + c2) * frac + c1) * frac + y1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_on_frames() {
        for interp in [Interpolation::None, Interpolation::Linear, Interpolation::FourthOrder] {
            assert_eq!(interp.apply(0.1, 0.5, 0.9, 0.2, 0.0), 0.5);
        }
    }

    #[test]
    fn test_linear_midpoint() {
        assert_eq!(Interpolation::Linear.apply(0.0, 0.0, 1.0, 0.0, 0.5), 0.5);
    }

    #[test]
    fn test_cubic_reproduces_line() {
        // A straight line is reproduced exactly by the cubic kernel
        let v = Interpolation::FourthOrder.apply(0.0, 1.0, 2.0, 3.0, 0.25);
        assert!((v - 1.25).abs() < 1e-6);
    }
}
