//! Parameters structure for the executable.
//!
//! Controller-level parameters live in [`crate::arm_ctrl::Params`], this structure only carries
//! the concerns of the executable itself.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use crate::arm_ctrl::ParamsError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the upper-body control executable.
#[derive(Debug, Clone, Deserialize)]
pub struct ArmExecParams {
    /// Minimum log level name, one of `trace`, `debug` or `info`.
    pub log_level: String,

    /// One archive row is written per this many inbound state frames.
    pub sample_decimation: u64,

    /// If true and the deployment publishes odometry, odometry frames are archived at the same
    /// decimation as joint states.
    pub sample_odometry: bool,

    /// How long to wait for the first state frame before warning, in seconds.
    pub first_state_timeout_s: f64,

    /// Default duration of an interactively commanded move, in seconds.
    pub default_duration_s: f64,

    /// Default observation timeout of an interactively commanded move, in seconds.
    pub default_max_wait_s: f64,

    /// Extra observation time granted to a routine step on top of its duration, in seconds.
    pub move_grace_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmExecParams {
    /// Validate the loaded parameters.
    ///
    /// The durations here reach `Duration::from_secs_f64` through move observation windows,
    /// which panics on negative input, so a malformed parameter file must be rejected at load.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let positive = [
            ("first_state_timeout_s", self.first_state_timeout_s),
            ("default_duration_s", self.default_duration_s),
            ("default_max_wait_s", self.default_max_wait_s),
        ];

        for &(name, value) in positive.iter() {
            // Negated comparison so NaN is rejected too
            if !(value > 0.0) {
                return Err(ParamsError::NotPositive(name, value));
            }
        }

        if !(self.move_grace_s >= 0.0) {
            return Err(ParamsError::Negative("move_grace_s", self.move_grace_s));
        }

        if self.sample_decimation == 0 {
            return Err(ParamsError::NotPositive("sample_decimation", 0.0));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn good_params() -> ArmExecParams {
        ArmExecParams {
            log_level: String::from("info"),
            sample_decimation: 5,
            sample_odometry: false,
            first_state_timeout_s: 5.0,
            default_duration_s: 3.0,
            default_max_wait_s: 10.0,
            move_grace_s: 2.0,
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(good_params().validate().is_ok());

        let mut params = good_params();
        params.move_grace_s = -10.0;
        assert!(params.validate().is_err());

        let mut params = good_params();
        params.sample_decimation = 0;
        assert!(params.validate().is_err());

        let mut params = good_params();
        params.default_max_wait_s = 0.0;
        assert!(params.validate().is_err());
    }
}
