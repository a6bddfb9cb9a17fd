//! # Equipment Interface
//!
//! This module defines the interface structures which are exchanged with the robot's firmware and
//! with the locomotion service.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Joint index layout for the robot's actuators
pub mod joints;

/// Locomotion velocity-command contract
pub mod loco;

/// Low level command and state frames
pub mod low_level;
