//! # Periodic command task
//!
//! The fixed-period loop that turns the controller's state into published command frames. Runs
//! on a dedicated thread from shortly after startup until release completes or the transport
//! faults, regardless of what callers are doing: command publication must never stop while the
//! supervisory arbitration is armed, or the actuator firmware faults.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use std::thread;
use std::time::{Duration, Instant};

use comms_if::eqpt::low_level::ChecksumError;

use crate::arm_ctrl::{ArmCtrl, Phase};
use crate::cmd_server::{CmdServer, CmdServerError};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Fatal errors of the command task. Any of these stops publication, so they propagate to
/// top-level shutdown rather than being recovered locally.
#[derive(Debug, thiserror::Error)]
pub enum CmdWriterError {
    #[error("Could not publish the command frame: {0}")]
    PublishError(CmdServerError),

    #[error("Could not seal the command frame: {0}")]
    SealError(ChecksumError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run the periodic command task until release completes.
///
/// Each tick synthesises a frame under the controller lock, then seals and publishes it outside
/// the lock. Ticks with no baseline state are skipped, not errors. On a publish failure the
/// fault flag is raised (waking all blocked waiters) and the error is returned, the process
/// must then attempt release and exit.
pub fn run(ctrl: ArmCtrl, mut server: CmdServer) -> Result<(), CmdWriterError> {
    let period_s = ctrl.params().control_period_s;
    let period = Duration::from_secs_f64(period_s);

    debug!("Command task started, period {} ms", period_s * 1000.0);

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        if let Some(mut frame) = ctrl.tick() {
            // The checksum must be recomputed after the last mutation, immediately before send
            if let Err(e) = frame.seal() {
                ctrl.set_fault();
                return Err(CmdWriterError::SealError(e));
            }

            if let Err(e) = server.publish(&frame) {
                ctrl.set_fault();
                return Err(CmdWriterError::PublishError(e));
            }
        }

        // The terminal frame of a release has now been published, stop cleanly
        if ctrl.phase() == Phase::Released {
            debug!("Release complete, command task stopping");
            return Ok(());
        }

        // Sleep out the remainder of the cycle
        let cycle_dur = Instant::now() - cycle_start_instant;

        match period.checked_sub(cycle_dur) {
            Some(remainder) => thread::sleep(remainder),
            None => warn!(
                "Control cycle overran, took {:.06} s",
                cycle_dur.as_secs_f64()
            ),
        }
    }
}
