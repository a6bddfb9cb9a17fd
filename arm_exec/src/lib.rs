//! Library for the upper-body control executable.
//!
//! The executable drives the robot's upper-body actuators (arms, wrists, waist) over the
//! firmware's publish/subscribe command-state loop. The controller core lives in [`arm_ctrl`],
//! the periodic command task in [`cmd_writer`], and the transport endpoints in [`cmd_server`],
//! [`state_client`] and [`loco_client`]. Routines (declarative motion sequences) are handled by
//! [`routine`], state stream archiving by [`sampler`], and the operator console by [`menu`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod arm_ctrl;
pub mod cmd_server;
pub mod cmd_writer;
pub mod loco_client;
pub mod menu;
pub mod params;
pub mod routine;
pub mod sampler;
pub mod state_client;

#[cfg(test)]
pub mod test_util;
