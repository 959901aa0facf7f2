/// Leading coefficients this small relative to the linear one are treated as zero.
const LINEAR_EPSILON: f64 = 1e-12;

/// Real roots of `a x² + b x + c = 0`, smaller root first.
///
/// Falls back to the linear equation when `a` is negligible compared to `b`,
/// returning its single root twice. `None` if there is no real solution.
pub fn solve(a: f64, b: f64, c: f64) -> Option<(f64, f64)> {
    if a == 0. || a.abs() <= LINEAR_EPSILON * b.abs() {
        if b == 0. {
            return None;
        }
        let x = -c / b;
        return Some((x, x));
    }

    let discriminant = b * b - 4. * a * c;
    if discriminant < 0. {
        return None;
    }

    // q has the sign of b, so b + q never cancels
    let q = -0.5 * (b + b.signum() * discriminant.sqrt());
    if q == 0. {
        // b == 0 and c == 0
        return Some((0., 0.));
    }
    let (x, y) = (q / a, c / q);
    Some(if x <= y { (x, y) } else { (y, x) })
}
