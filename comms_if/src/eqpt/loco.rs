//! # Locomotion command contract
//!
//! Walking is handled by the robot's locomotion service, this software only issues velocity
//! commands over a request/reply channel. No gait logic lives here.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A velocity command that can be executed by the locomotion service.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, StructOpt)]
pub enum LocoCmd {
    /// Walk with the given body-frame velocity.
    ///
    /// The command is held by the service until replaced or stopped.
    #[structopt(name = "move")]
    Move {
        /// Forward velocity in meters/second, positive forwards.
        vx_ms: f64,

        /// Lateral velocity in meters/second, positive to the left.
        vy_ms: f64,

        /// Yaw rate in radians/second, positive turning left.
        wz_rads: f64,
    },

    /// Stop walking, zeroing all body velocities.
    #[structopt(name = "stop")]
    Stop,
}

/// Response from the locomotion service to a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LocoResponse {
    /// The command was accepted and will be executed.
    CmdOk,

    /// The command was rejected, with a reason.
    CmdRejected(String),
}
