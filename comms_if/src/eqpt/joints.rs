//! # Joint index layout
//!
//! The robot carries a fixed set of 29 actuators: twelve leg joints, three waist joints and seven
//! joints per arm (shoulder, elbow and wrist). One extra reserved slot, one past the last named
//! joint, carries the supervisory arbitration value which signals whether this software or the
//! robot's default controller owns the upper body.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of named joints on the robot.
pub const NUM_JOINTS: usize = 29;

/// Index of the reserved supervisory/arbitration slot in command frames.
pub const SUPERVISORY_IDX: usize = 29;

/// Number of motor slots carried by command and state frames, the named joints plus the
/// supervisory slot.
pub const NUM_MOTOR_SLOTS: usize = 30;

/// The joints actively commanded by this software (waist and both arms), in the fixed order used
/// for archives and frames.
const UPPER_BODY: [JointId; 17] = [
    JointId::LeftShoulderPitch,
    JointId::LeftShoulderRoll,
    JointId::LeftShoulderYaw,
    JointId::LeftElbow,
    JointId::LeftWristRoll,
    JointId::LeftWristPitch,
    JointId::LeftWristYaw,
    JointId::RightShoulderPitch,
    JointId::RightShoulderRoll,
    JointId::RightShoulderYaw,
    JointId::RightElbow,
    JointId::RightWristRoll,
    JointId::RightWristPitch,
    JointId::RightWristYaw,
    JointId::WaistYaw,
    JointId::WaistRoll,
    JointId::WaistPitch,
];

/// The leg joints, which this software never drives but must command to a neutral posture.
const LEGS: [JointId; 12] = [
    JointId::LeftHipPitch,
    JointId::LeftHipRoll,
    JointId::LeftHipYaw,
    JointId::LeftKnee,
    JointId::LeftAnklePitch,
    JointId::LeftAnkleRoll,
    JointId::RightHipPitch,
    JointId::RightHipRoll,
    JointId::RightHipYaw,
    JointId::RightKnee,
    JointId::RightAnklePitch,
    JointId::RightAnkleRoll,
];

/// All named joints in index order, used for raw index conversion.
const ALL_JOINTS: [JointId; NUM_JOINTS] = [
    JointId::LeftHipPitch,
    JointId::LeftHipRoll,
    JointId::LeftHipYaw,
    JointId::LeftKnee,
    JointId::LeftAnklePitch,
    JointId::LeftAnkleRoll,
    JointId::RightHipPitch,
    JointId::RightHipRoll,
    JointId::RightHipYaw,
    JointId::RightKnee,
    JointId::RightAnklePitch,
    JointId::RightAnkleRoll,
    JointId::WaistYaw,
    JointId::WaistRoll,
    JointId::WaistPitch,
    JointId::LeftShoulderPitch,
    JointId::LeftShoulderRoll,
    JointId::LeftShoulderYaw,
    JointId::LeftElbow,
    JointId::LeftWristRoll,
    JointId::LeftWristPitch,
    JointId::LeftWristYaw,
    JointId::RightShoulderPitch,
    JointId::RightShoulderRoll,
    JointId::RightShoulderYaw,
    JointId::RightElbow,
    JointId::RightWristRoll,
    JointId::RightWristPitch,
    JointId::RightWristYaw,
];

/// Static joint name table, indexed by the joint's discriminant.
const JOINT_NAMES: [&str; NUM_JOINTS] = [
    "LeftHipPitch",
    "LeftHipRoll",
    "LeftHipYaw",
    "LeftKnee",
    "LeftAnklePitch",
    "LeftAnkleRoll",
    "RightHipPitch",
    "RightHipRoll",
    "RightHipYaw",
    "RightKnee",
    "RightAnklePitch",
    "RightAnkleRoll",
    "WaistYaw",
    "WaistRoll",
    "WaistPitch",
    "LeftShoulderPitch",
    "LeftShoulderRoll",
    "LeftShoulderYaw",
    "LeftElbow",
    "LeftWristRoll",
    "LeftWristPitch",
    "LeftWristYaw",
    "RightShoulderPitch",
    "RightShoulderRoll",
    "RightShoulderYaw",
    "RightElbow",
    "RightWristRoll",
    "RightWristPitch",
    "RightWristYaw",
];

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// IDs of all named actuators on the robot.
///
/// The discriminants match the motor index layout of the firmware, so a `JointId` can be used
/// directly to index the motor slots of a command or state frame.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum JointId {
    // Left leg
    LeftHipPitch = 0,
    LeftHipRoll = 1,
    LeftHipYaw = 2,
    LeftKnee = 3,
    LeftAnklePitch = 4,
    LeftAnkleRoll = 5,

    // Right leg
    RightHipPitch = 6,
    RightHipRoll = 7,
    RightHipYaw = 8,
    RightKnee = 9,
    RightAnklePitch = 10,
    RightAnkleRoll = 11,

    // Waist
    WaistYaw = 12,
    WaistRoll = 13,
    WaistPitch = 14,

    // Left arm
    LeftShoulderPitch = 15,
    LeftShoulderRoll = 16,
    LeftShoulderYaw = 17,
    LeftElbow = 18,
    LeftWristRoll = 19,
    LeftWristPitch = 20,
    LeftWristYaw = 21,

    // Right arm
    RightShoulderPitch = 22,
    RightShoulderRoll = 23,
    RightShoulderYaw = 24,
    RightElbow = 25,
    RightWristRoll = 26,
    RightWristPitch = 27,
    RightWristYaw = 28,
}

/// Errors which can occur when converting raw values into a [`JointId`].
#[derive(Debug, Error)]
pub enum JointIdError {
    #[error("{0} is not a valid joint index (expected 0..{})", NUM_JOINTS)]
    InvalidIndex(u8),

    #[error("{0:?} is not a recognised joint name or index")]
    UnknownName(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl JointId {
    /// The joints actively commanded by this software, in fixed archive order.
    pub fn upper_body() -> &'static [JointId] {
        &UPPER_BODY
    }

    /// The leg joints, held at a neutral posture by this software.
    pub fn legs() -> &'static [JointId] {
        &LEGS
    }

    /// Get the motor slot index of this joint.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Get the name of this joint from the static name table.
    pub fn name(&self) -> &'static str {
        JOINT_NAMES[self.index()]
    }

    /// True if this joint is in the controlled (upper body) set.
    pub fn is_controlled(&self) -> bool {
        UPPER_BODY.contains(self)
    }
}

impl TryFrom<u8> for JointId {
    type Error = JointIdError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match ALL_JOINTS.get(value as usize) {
            Some(joint) => Ok(*joint),
            None => Err(JointIdError::InvalidIndex(value)),
        }
    }
}

impl From<JointId> for u8 {
    fn from(id: JointId) -> u8 {
        id as u8
    }
}

impl FromStr for JointId {
    type Err = JointIdError;

    /// Parse a joint from its name or its decimal index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(idx) = s.parse::<u8>() {
            return JointId::try_from(idx);
        }

        match JOINT_NAMES.iter().position(|n| n.eq_ignore_ascii_case(s)) {
            Some(idx) => JointId::try_from(idx as u8),
            None => Err(JointIdError::UnknownName(s.into())),
        }
    }
}

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_index_name_round_trip() {
        for idx in 0..NUM_JOINTS as u8 {
            let joint = JointId::try_from(idx).unwrap();
            assert_eq!(joint.index(), idx as usize);
            assert_eq!(JointId::from_str(joint.name()).unwrap(), joint);
        }

        assert!(JointId::try_from(NUM_JOINTS as u8).is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!(JointId::from_str("15").unwrap(), JointId::LeftShoulderPitch);
        assert_eq!(JointId::from_str("waistyaw").unwrap(), JointId::WaistYaw);
        assert!(JointId::from_str("29").is_err());
        assert!(JointId::from_str("Grabber").is_err());
    }

    #[test]
    fn test_joint_sets() {
        assert_eq!(JointId::upper_body().len(), 17);
        assert_eq!(JointId::legs().len(), 12);

        for joint in JointId::upper_body() {
            assert!(joint.is_controlled());
            assert!(!JointId::legs().contains(joint));
        }

        for joint in JointId::legs() {
            assert!(!joint.is_controlled());
        }
    }
}
