//! Trajectory interpolation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::PI;
use util::maths::lin_map;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Interpolate between an initial and a target position along a half-cosine ease curve.
///
/// The curve starts and ends with zero slope, so a move started from rest arrives at rest with
/// no velocity discontinuity at either end. For `t >= duration`, or a non-positive duration, the
/// target is returned exactly, so repeated evaluation past the end of a move holds the target.
pub fn interpolate(q_init: f64, q_target: f64, t: f64, duration: f64) -> f64 {
    if duration <= 0.0 || t >= duration {
        return q_target;
    }

    let ratio = (1.0 - (PI * t / duration).cos()) / 2.0;
    lin_map((0.0, 1.0), (q_init, q_target), ratio)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(interpolate(-0.3, 0.7, 0.0, 5.0), -0.3);
        assert_eq!(interpolate(-0.3, 0.7, 5.0, 5.0), 0.7);
    }

    #[test]
    fn test_terminal_idempotence() {
        // Past the end of the move the target is held exactly, however far t advances
        for t in &[5.0, 5.02, 6.0, 100.0] {
            assert_eq!(interpolate(0.1, 0.9, *t, 5.0), 0.9);
        }

        // Degenerate durations snap to the target
        assert_eq!(interpolate(0.1, 0.9, 0.0, 0.0), 0.9);
        assert_eq!(interpolate(0.1, 0.9, 0.0, -1.0), 0.9);
    }

    #[test]
    fn test_bounded_and_monotonic() {
        let (q_init, q_target, duration) = (-0.5, 1.2, 2.0);
        let mut prev = q_init;

        for i in 0..=1000 {
            let t = duration * (i as f64) / 1000.0;
            let q = interpolate(q_init, q_target, t, duration);

            // No overshoot in either direction
            assert!(q >= q_init - 1e-12 && q <= q_target + 1e-12);

            // Non-decreasing toward the target
            assert!(q >= prev - 1e-12);
            prev = q;
        }
    }

    #[test]
    fn test_descending_move_bounded() {
        let (q_init, q_target, duration) = (0.8, -0.4, 1.0);

        for i in 0..=100 {
            let t = duration * (i as f64) / 100.0;
            let q = interpolate(q_init, q_target, t, duration);
            assert!(q <= q_init + 1e-12 && q >= q_target - 1e-12);
        }
    }

    #[test]
    fn test_midpoint() {
        // The half-cosine curve passes through the midpoint at half duration
        let q = interpolate(0.0, 1.0, 2.5, 5.0);
        assert!((q - 0.5).abs() < 1e-12);
    }
}
