//! Central finite differences for gradient components without an expression.

/// Default relative step for central differences.
pub const DEFAULT_STEP: f64 = 1e-6;

/// Approximates ∂f/∂x[index] at `point` with a central difference.
///
/// The step is scaled by the magnitude of the coordinate so that large
/// parameter values are not swamped by rounding.
pub fn partial_derivative<F>(f: &F, point: &[f64], index: usize, step: f64) -> f64
where
    F: Fn(&[f64]) -> f64 + ?Sized,
{
    let x = point[index];
    let h = if x.abs() > 1.0 { x.abs() * step } else { step };

    let mut shifted = point.to_vec();
    shifted[index] = x + h;
    let forward = f(&shifted);
    shifted[index] = x - h;
    let backward = f(&shifted);

    (forward - backward) / (2.0 * h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_partial_derivative() {
        let f = |x: &[f64]| x[0] * x[0] * x[1];
        assert_abs_diff_eq!(partial_derivative(&f, &[3.0, 2.0], 0, DEFAULT_STEP), 12.0, epsilon = 1e-5);
        assert_abs_diff_eq!(partial_derivative(&f, &[3.0, 2.0], 1, DEFAULT_STEP), 9.0, epsilon = 1e-5);
    }

    #[test]
    fn test_large_coordinates() {
        let f = |x: &[f64]| x[0].powi(2);
        assert_abs_diff_eq!(partial_derivative(&f, &[1e6], 0, DEFAULT_STEP), 2e6, epsilon = 1.0);
    }
}
