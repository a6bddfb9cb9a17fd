//! # Low level command and state frames
//!
//! These structures are the wire-level contract with the robot's actuator firmware. Command
//! frames are published at the control rate and carry one [`MotorCmd`] per motor slot plus an
//! integrity checksum, state frames arrive on the subscription at the firmware's own rate.
//!
//! The firmware rejects any command frame whose checksum does not match its contents, so
//! [`CommandFrame::seal`] must be called after the last field mutation and before every send.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crc_any::CRCu32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::joints::NUM_MOTOR_SLOTS;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Command for a single motor slot.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct MotorCmd {
    /// Demanded position in radians.
    pub q: f64,

    /// Demanded velocity in radians/second. Always zero under position control.
    pub dq: f64,

    /// Feed-forward torque in newton metres. Always zero under position control.
    pub tau: f64,

    /// Proportional gain.
    pub kp: f64,

    /// Derivative gain.
    pub kd: f64,
}

/// Measured state of a single motor slot.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct MotorState {
    /// Measured position in radians.
    pub q: f64,

    /// Measured velocity in radians/second.
    pub dq: f64,

    /// Estimated torque in newton metres.
    pub tau_est: f64,
}

/// A full actuator command frame, published to the firmware every control tick.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct CommandFrame {
    /// Control mode tag (pitch/roll mode).
    pub mode_pr: u8,

    /// Echo of the machine mode reported by the last received state frame.
    pub mode_machine: u8,

    /// Per-slot motor commands. Slot [`SUPERVISORY_IDX`](super::joints::SUPERVISORY_IDX) carries
    /// the arbitration value rather than a joint demand.
    pub motor_cmd: [MotorCmd; NUM_MOTOR_SLOTS],

    /// Integrity checksum over the rest of the frame, see [`CommandFrame::seal`].
    pub crc: u32,
}

/// A full actuator state frame, received on the state subscription.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct StateFrame {
    /// Frame counter maintained by the firmware.
    pub tick: u32,

    /// The firmware's current machine mode, echoed back in command frames.
    pub mode_machine: u8,

    /// Per-slot motor states.
    pub motor_state: [MotorState; NUM_MOTOR_SLOTS],
}

/// Odometry estimate, published by deployments which carry the odometry service.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
pub struct OdomFrame {
    /// Position in the odometry frame, metres.
    pub position_m: [f64; 3],

    /// Velocity in the odometry frame, metres/second.
    pub velocity_ms: [f64; 3],

    /// Yaw rate in radians/second.
    pub yaw_rate_rads: f64,

    /// Orientation as roll, pitch, yaw in radians.
    pub rpy_rad: [f64; 3],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur when sealing or verifying a frame checksum.
#[derive(Debug, Error)]
pub enum ChecksumError {
    #[error("Could not serialize the frame for checksumming: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CommandFrame {
    /// Compute the checksum over this frame's contents.
    ///
    /// The checksum is a CRC-32 over the serialized frame with the `crc` field zeroed.
    fn compute_crc(&self) -> Result<u32, ChecksumError> {
        let mut zeroed = self.clone();
        zeroed.crc = 0;

        let bytes = serde_json::to_vec(&zeroed).map_err(ChecksumError::SerializationError)?;

        let mut crc = CRCu32::crc32();
        crc.digest(&bytes);
        Ok(crc.get_crc())
    }

    /// Recompute and store the frame checksum.
    ///
    /// Must be called after the last field mutation and before every send, a stale checksum is
    /// rejected by the firmware.
    pub fn seal(&mut self) -> Result<(), ChecksumError> {
        self.crc = self.compute_crc()?;
        Ok(())
    }

    /// Check that the stored checksum matches the frame contents.
    pub fn verify(&self) -> Result<bool, ChecksumError> {
        Ok(self.crc == self.compute_crc()?)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_seal_is_deterministic() {
        let mut frame_a = CommandFrame::default();
        frame_a.motor_cmd[15].q = 0.5;
        frame_a.motor_cmd[15].kp = 60.0;

        let mut frame_b = frame_a.clone();

        frame_a.seal().unwrap();
        frame_b.seal().unwrap();

        assert_eq!(frame_a.crc, frame_b.crc);
        assert!(frame_a.verify().unwrap());
    }

    #[test]
    fn test_seal_sensitive_to_any_field() {
        let mut frame = CommandFrame::default();
        frame.motor_cmd[15].q = 0.5;
        frame.seal().unwrap();
        let sealed_crc = frame.crc;

        // Any motor command field change must change the checksum
        frame.motor_cmd[15].kd = 1.5;
        frame.seal().unwrap();
        assert_ne!(frame.crc, sealed_crc);

        // A stale checksum must fail verification
        frame.motor_cmd[16].q = -0.2;
        assert!(!frame.verify().unwrap());
    }

    #[test]
    fn test_frame_round_trip() {
        let mut frame = CommandFrame {
            mode_pr: 1,
            mode_machine: 4,
            ..Default::default()
        };
        frame.motor_cmd[29].q = 1.0;
        frame.seal().unwrap();

        let json = serde_json::to_string(&frame).unwrap();
        let parsed: CommandFrame = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, frame);
        assert!(parsed.verify().unwrap());
    }
}
