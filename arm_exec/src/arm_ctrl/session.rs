//! Motion session data

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::joints::JointId;
use std::collections::HashMap;

use super::interp::interpolate;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One in-flight interpolated move from a captured initial posture to a target posture over a
/// fixed duration.
///
/// Initial positions are captured once, from the cached state at the time the move is requested,
/// and are never re-read from live state while the session runs. This keeps the mapping from
/// duration to trajectory predictable: a disturbance during the move is corrected by the PD
/// tracking of the commanded curve, not by re-aiming the curve itself.
#[derive(Debug, Clone)]
pub struct MotionSession {
    /// Initial position of each targeted joint, captured at session start.
    q_init: HashMap<JointId, f64>,

    /// Target position of each targeted joint.
    targets: HashMap<JointId, f64>,

    /// Time elapsed since session start, advanced only by the periodic task.
    ///
    /// Units: seconds
    elapsed_s: f64,

    /// Total duration of the move.
    ///
    /// Units: seconds
    duration_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionSession {
    /// Create a new session starting at the given initial posture.
    pub fn new(
        q_init: HashMap<JointId, f64>,
        targets: HashMap<JointId, f64>,
        duration_s: f64,
    ) -> Self {
        Self {
            q_init,
            targets,
            elapsed_s: 0.0,
            duration_s,
        }
    }

    /// The commanded position of the given joint at the session's current elapsed time, or
    /// `None` if the joint is not targeted by this session.
    pub fn q_at_elapsed(&self, joint: JointId) -> Option<f64> {
        let target = *self.targets.get(&joint)?;
        let init = *self.q_init.get(&joint)?;

        Some(interpolate(init, target, self.elapsed_s, self.duration_s))
    }

    /// Advance the session's elapsed time by one tick period.
    pub fn advance(&mut self, dt_s: f64) {
        self.elapsed_s += dt_s;
    }

    /// True once the elapsed time has reached the duration. A complete session keeps holding
    /// its targets, it just no longer changes the commanded position.
    pub fn complete(&self) -> bool {
        self.elapsed_s >= self.duration_s
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_session_progress() {
        let mut q_init = HashMap::new();
        q_init.insert(JointId::LeftElbow, 0.2);
        let mut targets = HashMap::new();
        targets.insert(JointId::LeftElbow, 1.0);

        let mut session = MotionSession::new(q_init, targets, 1.0);

        assert!(!session.complete());
        assert_eq!(session.q_at_elapsed(JointId::LeftElbow), Some(0.2));

        // Joints outside the session have no commanded position
        assert_eq!(session.q_at_elapsed(JointId::RightElbow), None);

        session.advance(0.5);
        let mid = session.q_at_elapsed(JointId::LeftElbow).unwrap();
        assert!((mid - 0.6).abs() < 1e-12);

        session.advance(0.5);
        assert!(session.complete());
        assert_eq!(session.q_at_elapsed(JointId::LeftElbow), Some(1.0));

        // Holding past completion does not move the command
        session.advance(10.0);
        assert_eq!(session.q_at_elapsed(JointId::LeftElbow), Some(1.0));
    }
}
