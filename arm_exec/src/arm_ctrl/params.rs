//! Parameters structure for the motion controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the upper-body motion controller.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- CONTROL ----

    /// Period of the command synthesis task.
    ///
    /// Units: seconds
    pub control_period_s: f64,

    /// Proportional gain applied to every controlled joint.
    pub kp: f64,

    /// Derivative gain applied to every controlled joint.
    pub kd: f64,

    /// Position tolerance within which a joint counts as having reached its target.
    ///
    /// Units: radians
    pub position_tolerance_rad: f64,

    /// Absolute limit applied to commanded joint positions. Targets beyond the limit are
    /// clamped, not rejected.
    ///
    /// Units: radians
    pub target_limit_rad: f64,

    /// If true the leg joints are commanded to position zero with zero gains as a safety
    /// posture. If false their slots are left at the frame default.
    pub command_idle_joints: bool,

    // ---- RELEASE ----

    /// Which release strategy to use at shutdown.
    pub release_mode: ReleaseMode,

    /// Duration of the supervisory arbitration ramp under [`ReleaseMode::Ramp`].
    ///
    /// Units: seconds
    pub release_ramp_duration_s: f64,

    /// Rest posture moved to under [`ReleaseMode::RestPosture`], joint name to position in
    /// radians. Controlled joints not named here rest at zero.
    pub rest_posture_rad: HashMap<String, f64>,

    /// Duration of the move to the rest posture.
    ///
    /// Units: seconds
    pub rest_duration_s: f64,

    /// Observation timeout of the move to the rest posture.
    ///
    /// Units: seconds
    pub rest_max_wait_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Validate the loaded parameters.
    ///
    /// The durations and periods here all reach `Duration::from_secs_f64` eventually, which
    /// panics on negative input, so a malformed parameter file must be rejected at load rather
    /// than mid-move.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let positive = [
            ("control_period_s", self.control_period_s),
            ("position_tolerance_rad", self.position_tolerance_rad),
            ("target_limit_rad", self.target_limit_rad),
            ("release_ramp_duration_s", self.release_ramp_duration_s),
            ("rest_duration_s", self.rest_duration_s),
            ("rest_max_wait_s", self.rest_max_wait_s),
        ];

        for &(name, value) in positive.iter() {
            // Negated comparison so NaN is rejected too
            if !(value > 0.0) {
                return Err(ParamsError::NotPositive(name, value));
            }
        }

        for &(name, value) in [("kp", self.kp), ("kd", self.kd)].iter() {
            if !(value >= 0.0) {
                return Err(ParamsError::Negative(name, value));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Parameter validation errors, raised once at load.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Parameter {0} must be positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Parameter {0} must not be negative, found {1}")]
    Negative(&'static str, f64),
}

/// Release strategies for handing the upper body back to the default controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseMode {
    /// Hold the current posture and ramp the supervisory arbitration value from armed to
    /// released over [`Params::release_ramp_duration_s`], gains held throughout.
    Ramp,

    /// Move to the configured rest posture, then send one final frame with all gains zeroed
    /// and the arbitration value released.
    RestPosture,
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use crate::test_util::test_params;

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(test_params().validate().is_ok());

        let mut params = test_params();
        params.control_period_s = 0.0;
        assert!(params.validate().is_err());

        let mut params = test_params();
        params.release_ramp_duration_s = -0.05;
        assert!(params.validate().is_err());

        let mut params = test_params();
        params.kp = -1.0;
        assert!(params.validate().is_err());

        let mut params = test_params();
        params.rest_max_wait_s = f64::NAN;
        assert!(params.validate().is_err());
    }
}
