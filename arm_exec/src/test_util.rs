//! Shared helpers for unit tests.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use comms_if::eqpt::low_level::{CommandFrame, StateFrame};

use crate::arm_ctrl::{ArmCtrl, Params, ReleaseMode};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Controller parameters for tests: simulation-rate control period, short release ramp.
pub fn test_params() -> Params {
    Params {
        control_period_s: 0.002,
        kp: 60.0,
        kd: 1.5,
        position_tolerance_rad: 0.05,
        target_limit_rad: 3.0,
        command_idle_joints: true,
        release_mode: ReleaseMode::Ramp,
        release_ramp_duration_s: 0.05,
        rest_posture_rad: HashMap::new(),
        rest_duration_s: 0.05,
        rest_max_wait_s: 0.5,
    }
}

/// Build a state frame which reflects a command frame's positions exactly, as an ideal robot
/// with instant tracking would.
pub fn echo_state(frame: &CommandFrame) -> StateFrame {
    let mut state = StateFrame::default();
    state.mode_machine = frame.mode_machine;

    for (i, cmd) in frame.motor_cmd.iter().enumerate() {
        state.motor_state[i].q = cmd.q;
    }

    state
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A controller wired to a perfect echo: a background thread ticks the synthesis and feeds
/// every commanded position straight back as measured state.
pub struct EchoRig {
    pub ctrl: ArmCtrl,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EchoRig {
    pub fn start() -> Self {
        Self::with_params(test_params())
    }

    pub fn with_params(params: Params) -> Self {
        let ctrl = ArmCtrl::new(params);

        // Seed a baseline state so the first tick is not skipped
        ctrl.update_state(StateFrame::default());

        let stop = Arc::new(AtomicBool::new(false));
        let tick_ctrl = ctrl.clone();
        let tick_stop = stop.clone();

        let handle = thread::spawn(move || {
            while !tick_stop.load(Ordering::Relaxed) {
                if let Some(frame) = tick_ctrl.tick() {
                    tick_ctrl.update_state(echo_state(&frame));
                }
                thread::sleep(Duration::from_millis(1));
            }
        });

        Self {
            ctrl,
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for EchoRig {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}
