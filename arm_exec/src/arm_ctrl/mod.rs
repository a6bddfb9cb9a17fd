//! # Upper-body motion controller
//!
//! This module is the controller core: a shared context ([`ArmCtrl`]) holding the latest
//! received state frame and the active [`MotionSession`], the half-cosine trajectory
//! interpolator, and the motion sequencer (`move_to` / `has_reached` / `release`).
//!
//! The controller does not own a thread of its own. The periodic command task
//! ([`crate::cmd_writer`]) calls [`ArmCtrl::tick`] at the control rate to synthesise command
//! frames, and the state reception loop calls [`ArmCtrl::update_state`] as frames arrive.
//! Callers drive motion through [`ArmCtrl::move_to`], which blocks the calling context only.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod interp;
mod params;
mod session;
mod state;

pub use interp::interpolate;
pub use params::{Params, ParamsError, ReleaseMode};
pub use session::MotionSession;
pub use state::{ArmCtrl, ArmCtrlError, MoveOutcome, Phase};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Supervisory arbitration value signalling that this controller owns the upper body.
pub const SUPERVISORY_ARMED: f64 = 1.0;

/// Supervisory arbitration value handing the upper body back to the default controller.
pub const SUPERVISORY_RELEASED: f64 = 0.0;

/// Control mode tag carried by every command frame.
pub const MODE_PR: u8 = 0;
