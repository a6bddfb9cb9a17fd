//! # State stream sampler
//!
//! Downsamples the high-rate inbound state stream into the session's CSV archives: one row per
//! N inbound frames for joint positions and torques, the same decimation for odometry where the
//! deployment publishes it, and one summary row per completed move.
//!
//! The sampler is shared between the reception thread and the shutdown path, so closing is
//! idempotent and samples arriving after close are dropped silently rather than crashing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use comms_if::eqpt::{
    joints::JointId,
    low_level::{OdomFrame, StateFrame},
};

// Internal
use crate::arm_ctrl::MoveOutcome;
use util::archive::{ArchiveError, Archiver};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Fixed-ratio downsampling archiver for the inbound state streams.
pub struct Sampler {
    inner: Mutex<Inner>,

    /// Timestamps in archive rows are seconds since sampler creation.
    epoch: Instant,
}

struct Inner {
    joints: Archiver,

    odom: Option<Archiver>,

    moves: Option<Archiver>,

    state_count: u64,

    odom_count: u64,

    decimation: u64,
}

/// Summary row archived for each completed move.
#[derive(Serialize)]
struct MoveRecord<'a> {
    time_s: f64,
    label: &'a str,
    outcome: String,
    duration_s: f64,
    wait_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Sampler {
    /// Create a new sampler writing into the given archives.
    ///
    /// One row is written per `decimation` inbound frames. The joint and odometry headers are
    /// written here, exactly once.
    pub fn new(
        mut joints: Archiver,
        mut odom: Option<Archiver>,
        moves: Option<Archiver>,
        decimation: u64,
    ) -> Result<Self, ArchiveError> {
        // Per-joint header, in the fixed controlled-joint order
        let mut header = vec![String::from("timestamp")];
        for joint in JointId::upper_body() {
            header.push(format!("q_joint{}", joint.index()));
            header.push(format!("tau_joint{}", joint.index()));
        }
        joints.write_raw(&header)?;

        if let Some(ref mut odom) = odom {
            odom.write_raw(&[
                "timestamp",
                "x_m",
                "y_m",
                "z_m",
                "vx_ms",
                "vy_ms",
                "vz_ms",
                "yaw_rate_rads",
                "roll_rad",
                "pitch_rad",
                "yaw_rad",
            ])?;
        }

        Ok(Self {
            inner: Mutex::new(Inner {
                joints,
                odom,
                moves,
                state_count: 0,
                odom_count: 0,
                decimation: decimation.max(1),
            }),
            epoch: Instant::now(),
        })
    }

    /// Count an inbound state frame, archiving a row if this frame falls on the decimation.
    pub fn sample_state(&self, frame: &StateFrame) {
        let mut inner = self.lock();

        inner.state_count += 1;
        if inner.state_count % inner.decimation != 0 {
            return;
        }

        let mut row = vec![format!("{:.6}", self.epoch.elapsed().as_secs_f64())];
        for joint in JointId::upper_body() {
            let motor = &frame.motor_state[joint.index()];
            row.push(format!("{:.6}", motor.q));
            row.push(format!("{:.6}", motor.tau_est));
        }

        Self::append(inner.joints.write_raw(&row), "state");
    }

    /// Count an inbound odometry frame, archiving a row if this frame falls on the decimation.
    pub fn sample_odom(&self, frame: &OdomFrame) {
        let mut inner = self.lock();

        inner.odom_count += 1;
        if inner.odom_count % inner.decimation != 0 {
            return;
        }

        let row = vec![
            format!("{:.6}", self.epoch.elapsed().as_secs_f64()),
            format!("{:.6}", frame.position_m[0]),
            format!("{:.6}", frame.position_m[1]),
            format!("{:.6}", frame.position_m[2]),
            format!("{:.6}", frame.velocity_ms[0]),
            format!("{:.6}", frame.velocity_ms[1]),
            format!("{:.6}", frame.velocity_ms[2]),
            format!("{:.6}", frame.yaw_rate_rads),
            format!("{:.6}", frame.rpy_rad[0]),
            format!("{:.6}", frame.rpy_rad[1]),
            format!("{:.6}", frame.rpy_rad[2]),
        ];

        if let Some(ref mut arch) = inner.odom {
            Self::append(arch.write_raw(&row), "odometry");
        }
    }

    /// Archive a summary row for a completed move.
    pub fn record_move(&self, label: &str, outcome: MoveOutcome, duration_s: f64, wait_s: f64) {
        let record = MoveRecord {
            time_s: self.epoch.elapsed().as_secs_f64(),
            label,
            outcome: format!("{:?}", outcome),
            duration_s,
            wait_s,
        };

        let mut inner = self.lock();
        if let Some(ref mut arch) = inner.moves {
            Self::append(arch.serialise(record), "move summary");
        }
    }

    /// Flush and close all archives. Idempotent, and safe against samples still arriving from
    /// the reception thread: rows after close are dropped.
    pub fn close(&self) {
        let mut inner = self.lock();

        if let Err(e) = inner.joints.close() {
            warn!("Could not close the joint archive: {}", e);
        }
        if let Some(ref mut arch) = inner.odom {
            if let Err(e) = arch.close() {
                warn!("Could not close the odometry archive: {}", e);
            }
        }
        if let Some(ref mut arch) = inner.moves {
            if let Err(e) = arch.close() {
                warn!("Could not close the move archive: {}", e);
            }
        }
    }

    // ---- PRIVATE ----

    fn lock(&self) -> MutexGuard<Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Handle an archive write result: dropped-after-close is expected during shutdown, other
    /// failures are reported.
    fn append(result: Result<(), ArchiveError>, what: &str) {
        match result {
            Ok(()) => (),
            Err(ArchiveError::Closed) => (),
            Err(e) => warn!("Could not archive {} sample: {}", what, e),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("deimos_sampler_test_{}_{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_decimation_row_count() {
        let path = temp_path("decim.csv");
        let sampler =
            Sampler::new(Archiver::from_file(&path).unwrap(), None, None, 500).unwrap();

        let frame = StateFrame::default();
        for _ in 0..1234 {
            sampler.sample_state(&frame);
        }
        sampler.close();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();

        // Header exactly once, first, then floor(1234 / 500) rows
        assert_eq!(lines.len(), 1 + 2);
        assert!(lines[0].starts_with("timestamp,q_joint15,tau_joint15"));
        assert!(!lines[1].starts_with("timestamp"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_samples_after_close_are_dropped() {
        let path = temp_path("closed.csv");
        let sampler =
            Sampler::new(Archiver::from_file(&path).unwrap(), None, None, 1).unwrap();

        sampler.sample_state(&StateFrame::default());
        sampler.close();
        sampler.close();

        // No panic, no new rows
        sampler.sample_state(&StateFrame::default());
        sampler.record_move("late", MoveOutcome::Converged, 1.0, 1.0);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        std::fs::remove_file(&path).ok();
    }
}
