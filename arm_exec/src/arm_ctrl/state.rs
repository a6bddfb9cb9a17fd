//! Motion controller state and sequencer

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

use comms_if::eqpt::{
    joints::{JointId, SUPERVISORY_IDX},
    low_level::{CommandFrame, StateFrame},
};

// Internal
use super::{
    MotionSession, Params, ReleaseMode, MODE_PR, SUPERVISORY_ARMED, SUPERVISORY_RELEASED,
};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The shared motion controller context.
///
/// A cheaply clonable handle over state shared between the state reception loop, the periodic
/// command task and the caller driving moves. All shared fields live behind a single lock which
/// is held only for the duration of field access, never across a publish or a sleep.
#[derive(Clone)]
pub struct ArmCtrl {
    inner: Arc<Inner>,
}

struct Inner {
    params: Params,

    /// Guards the state cache, the active session and the sequencer phase.
    shared: Mutex<Shared>,

    /// Signalled by the periodic task every tick and on every state update, so blocking waits
    /// need no fixed poll granularity.
    tick: Condvar,

    /// Caller/operator abort flag, checked by every blocking wait.
    cancelled: AtomicBool,

    /// Set when the command transport has failed. Terminal.
    faulted: AtomicBool,
}

struct Shared {
    /// Latest received state frame, `None` until the first frame arrives.
    state: Option<StateFrame>,

    /// Machine mode echoed from the last received state frame.
    mode_machine: u8,

    /// The active motion session, if any. Kept after completion so the final posture continues
    /// to be published every tick.
    session: Option<MotionSession>,

    /// Sequencer phase.
    phase: Phase,

    /// Current supervisory arbitration value.
    supervisory: f64,

    /// Last commanded position per controlled joint. Initialised from the measured baseline on
    /// the first synthesis, then tracks whatever was last commanded, so joints not covered by
    /// the active session hold their posture.
    hold: HashMap<JointId, f64>,

    /// Set during a rest-posture release: the next synthesised frame carries zero gains.
    zero_gains: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Sequencer phase.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// No move requested yet.
    Idle,

    /// A session is active and a caller is blocked in [`ArmCtrl::move_to`].
    Moving,

    /// The last move reached its targets within tolerance.
    Converged,

    /// The last move's observation timeout expired before convergence.
    TimedOut,

    /// The last move was aborted by the cancellation flag.
    Cancelled,

    /// A release is in progress, the periodic task is handing control back.
    Releasing,

    /// Release complete. Terminal, no further moves are accepted.
    Released,
}

/// Outcome of a blocking move. These are reportable results, not errors: callers use them to
/// decide whether to proceed, retry or abort.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// All targeted joints are within tolerance of their targets.
    Converged,

    /// The observation timeout expired. The periodic task keeps commanding toward the targets.
    TimedOut,

    /// The cancellation flag was raised mid-move.
    Cancelled,
}

/// Errors raised by the motion controller.
#[derive(Debug, Error)]
pub enum ArmCtrlError {
    #[error("No state frame has been received yet, cannot capture a motion baseline")]
    NotReady,

    #[error("Invalid move request: {0}")]
    InvalidInput(String),

    #[error("The controller has been released, no further moves are accepted")]
    Released,

    #[error("The command transport has faulted")]
    TransportFault,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Create a new controller context.
    pub fn new(params: Params) -> Self {
        Self {
            inner: Arc::new(Inner {
                params,
                shared: Mutex::new(Shared {
                    state: None,
                    mode_machine: 0,
                    session: None,
                    phase: Phase::Idle,
                    supervisory: SUPERVISORY_ARMED,
                    hold: HashMap::new(),
                    zero_gains: false,
                }),
                tick: Condvar::new(),
                cancelled: AtomicBool::new(false),
                faulted: AtomicBool::new(false),
            }),
        }
    }

    /// The controller's parameters.
    pub fn params(&self) -> &Params {
        &self.inner.params
    }

    // ---- STATE CACHE ----

    /// Store a newly received state frame and wake any blocked waiters.
    pub fn update_state(&self, frame: StateFrame) {
        {
            let mut shared = self.lock();
            shared.mode_machine = frame.mode_machine;
            shared.state = Some(frame);
        }

        self.inner.tick.notify_all();
    }

    /// True once at least one state frame has been received.
    pub fn has_state(&self) -> bool {
        self.lock().state.is_some()
    }

    /// Latest measured position of the given joint, or `None` if no state has been received.
    pub fn joint_q(&self, joint: JointId) -> Option<f64> {
        self.lock()
            .state
            .as_ref()
            .map(|s| s.motor_state[joint.index()].q)
    }

    /// Latest measured positions of all controlled joints, in fixed order.
    pub fn measured_positions(&self) -> Option<Vec<(JointId, f64)>> {
        let shared = self.lock();
        let state = shared.state.as_ref()?;

        Some(
            JointId::upper_body()
                .iter()
                .map(|j| (*j, state.motor_state[j.index()].q))
                .collect(),
        )
    }

    // ---- SEQUENCER ----

    /// Move the controlled joints to the given targets and block until the move converges, the
    /// observation timeout expires, the cancellation flag is raised, or the transport faults.
    ///
    /// `duration_s` shapes the interpolated trajectory, `max_wait_s` only bounds this blocking
    /// wait: the periodic task is unaffected by either and keeps publishing on its own schedule.
    ///
    /// Initial positions are captured from the cached state once, here. Starting a new move
    /// while one is active replaces the session wholesale (fresh baseline, elapsed time reset).
    /// A caller displaced that way keeps waiting on its own targets and its own deadline, and
    /// returns its own outcome.
    pub fn move_to(
        &self,
        targets: &HashMap<JointId, f64>,
        duration_s: f64,
        max_wait_s: f64,
    ) -> Result<MoveOutcome, ArmCtrlError> {
        if self.inner.faulted.load(Ordering::Relaxed) {
            return Err(ArmCtrlError::TransportFault);
        }

        let mut shared = self.lock();

        match shared.phase {
            Phase::Releasing | Phase::Released => return Err(ArmCtrlError::Released),
            _ => (),
        }

        // Only controlled joints may be driven
        for joint in targets.keys() {
            if !joint.is_controlled() {
                return Err(ArmCtrlError::InvalidInput(format!(
                    "{} is not a controlled joint",
                    joint
                )));
            }
        }

        let state = shared.state.as_ref().ok_or(ArmCtrlError::NotReady)?;

        // Clamp targets to the position limit rather than rejecting them
        let limit = self.inner.params.target_limit_rad;
        let mut clamped: HashMap<JointId, f64> = HashMap::with_capacity(targets.len());

        for (joint, q) in targets {
            let c = clamp(q, &-limit, &limit);
            if (c - q).abs() > f64::EPSILON {
                warn!(
                    "Target for {} clamped from {:.3} to {:.3} rad",
                    joint, q, c
                );
            }
            clamped.insert(*joint, c);
        }

        // Capture the initial posture once for this session
        let q_init: HashMap<JointId, f64> = clamped
            .keys()
            .map(|j| (*j, state.motor_state[j.index()].q))
            .collect();

        shared.session = Some(MotionSession::new(q_init, clamped.clone(), duration_s));
        shared.phase = Phase::Moving;

        // Block on the condvar until one of the four outcomes. The deadline is wall clock from
        // call start.
        let deadline = Instant::now() + Duration::from_secs_f64(max_wait_s);
        let tolerance = self.inner.params.position_tolerance_rad;

        loop {
            if self.inner.faulted.load(Ordering::Relaxed) {
                shared.phase = Phase::Idle;
                return Err(ArmCtrlError::TransportFault);
            }

            if self.inner.cancelled.load(Ordering::Relaxed) {
                shared.phase = Phase::Cancelled;
                return Ok(MoveOutcome::Cancelled);
            }

            let now = Instant::now();
            if now >= deadline {
                shared.phase = Phase::TimedOut;
                return Ok(MoveOutcome::TimedOut);
            }

            if Self::reached(&shared, &clamped, tolerance) {
                shared.phase = Phase::Converged;
                return Ok(MoveOutcome::Converged);
            }

            let (guard, _) = self
                .inner
                .tick
                .wait_timeout(shared, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            shared = guard;
        }
    }

    /// True iff every controlled joint named in `targets` is within `tolerance_rad` of its
    /// target. Vacuously true for an empty target map, false if no state has been received.
    pub fn has_reached(&self, targets: &HashMap<JointId, f64>, tolerance_rad: f64) -> bool {
        Self::reached(&self.lock(), targets, tolerance_rad)
    }

    /// Raise the cancellation flag, waking any blocked wait.
    ///
    /// The periodic task is unaffected and keeps publishing.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Relaxed);
        self.inner.tick.notify_all();
    }

    /// True if the cancellation flag has been raised.
    pub fn cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Mark the command transport as faulted, waking any blocked wait. Terminal.
    pub fn set_fault(&self) {
        self.inner.faulted.store(true, Ordering::Relaxed);
        self.inner.tick.notify_all();
    }

    /// True if the command transport has faulted.
    pub fn faulted(&self) -> bool {
        self.inner.faulted.load(Ordering::Relaxed)
    }

    /// Current sequencer phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Current supervisory arbitration value.
    pub fn supervisory(&self) -> f64 {
        self.lock().supervisory
    }

    /// The configured rest posture over all controlled joints. Joints not named in the
    /// parameter file rest at zero.
    pub fn rest_targets(&self) -> HashMap<JointId, f64> {
        let mut targets: HashMap<JointId, f64> =
            JointId::upper_body().iter().map(|j| (*j, 0.0)).collect();

        for (name, q) in &self.inner.params.rest_posture_rad {
            match JointId::from_str(name) {
                Ok(joint) if joint.is_controlled() => {
                    targets.insert(joint, *q);
                }
                Ok(joint) => warn!("Rest posture names uncontrolled joint {}, ignored", joint),
                Err(e) => warn!("Invalid joint in rest posture: {}", e),
            }
        }

        targets
    }

    /// Hand control of the upper body back to the robot's default controller.
    ///
    /// Under [`ReleaseMode::Ramp`] the current posture is held while the supervisory
    /// arbitration value ramps linearly to released over the configured duration. Under
    /// [`ReleaseMode::RestPosture`] the controller first moves to the configured rest posture,
    /// then sends one final frame with all gains zeroed and the arbitration value released.
    ///
    /// Terminal and idempotent: after the first release completes every further `move_to`
    /// returns [`ArmCtrlError::Released`].
    pub fn release(&self) -> Result<(), ArmCtrlError> {
        if self.inner.params.release_mode == ReleaseMode::RestPosture
            && !self.inner.faulted.load(Ordering::Relaxed)
            && !self.inner.cancelled.load(Ordering::Relaxed)
        {
            let rest = self.rest_targets();
            match self.move_to(
                &rest,
                self.inner.params.rest_duration_s,
                self.inner.params.rest_max_wait_s,
            ) {
                Ok(outcome) => info!("Rest posture move finished: {:?}", outcome),
                // Without a baseline there is nothing to move, fall through to the handback
                Err(ArmCtrlError::NotReady) => (),
                Err(ArmCtrlError::Released) => (),
                Err(e) => return Err(e),
            }
        }

        let mut shared = self.lock();

        match shared.phase {
            Phase::Released => return Ok(()),
            Phase::Releasing => (),
            _ => {
                if shared.state.is_none() {
                    // Nothing was ever commanded, no handback needed
                    shared.phase = Phase::Released;
                    self.inner.tick.notify_all();
                    return Ok(());
                }

                if self.inner.params.release_mode == ReleaseMode::RestPosture {
                    shared.zero_gains = true;
                    shared.supervisory = SUPERVISORY_RELEASED;
                }

                shared.phase = Phase::Releasing;
                info!("Release started ({:?})", self.inner.params.release_mode);
            }
        }

        // Wait for the periodic task to finish the handback. The timeout guards against the
        // task having died without the fault flag being observed yet.
        loop {
            if shared.phase == Phase::Released {
                return Ok(());
            }

            if self.inner.faulted.load(Ordering::Relaxed) {
                return Err(ArmCtrlError::TransportFault);
            }

            let (guard, _) = self
                .inner
                .tick
                .wait_timeout(shared, Duration::from_millis(100))
                .unwrap_or_else(|e| e.into_inner());
            shared = guard;
        }
    }

    // ---- COMMAND SYNTHESIS ----

    /// Synthesise the command frame for one control tick.
    ///
    /// Returns `None` before the first state frame has been received, in which case no command
    /// must be sent (there is no baseline to hold). Otherwise the frame reflects the session
    /// state as of this tick's lock acquisition. The caller seals the checksum and publishes
    /// outside the lock.
    pub fn tick(&self) -> Option<CommandFrame> {
        let mut shared = self.lock();

        shared.state.as_ref()?;

        // Initialise the hold posture from the measured baseline on the first synthesis
        if shared.hold.is_empty() {
            if let Some(ref state) = shared.state {
                let baseline: Vec<(JointId, f64)> = JointId::upper_body()
                    .iter()
                    .map(|j| (*j, state.motor_state[j.index()].q))
                    .collect();
                shared.hold.extend(baseline);
            }
        }

        // Advance the release ramp before synthesis so the final published frame carries the
        // fully released arbitration value
        if shared.phase == Phase::Releasing && self.inner.params.release_mode == ReleaseMode::Ramp
        {
            let step = (SUPERVISORY_ARMED - SUPERVISORY_RELEASED)
                * self.inner.params.control_period_s
                / self.inner.params.release_ramp_duration_s;

            shared.supervisory -= step;
            if shared.supervisory <= SUPERVISORY_RELEASED {
                shared.supervisory = SUPERVISORY_RELEASED;
                shared.phase = Phase::Released;
            }
        }

        let mut frame = CommandFrame {
            mode_pr: MODE_PR,
            mode_machine: shared.mode_machine,
            ..Default::default()
        };

        // Supervisory arbitration slot
        frame.motor_cmd[SUPERVISORY_IDX].q = shared.supervisory;

        // Controlled joints: interpolated command where the session covers them, held posture
        // otherwise
        for joint in JointId::upper_body() {
            let q = shared
                .session
                .as_ref()
                .and_then(|s| s.q_at_elapsed(*joint))
                .or_else(|| shared.hold.get(joint).copied())
                .unwrap_or(0.0);

            let cmd = &mut frame.motor_cmd[joint.index()];
            cmd.q = q;
            cmd.dq = 0.0;
            cmd.tau = 0.0;

            if shared.zero_gains {
                cmd.kp = 0.0;
                cmd.kd = 0.0;
            } else {
                cmd.kp = self.inner.params.kp;
                cmd.kd = self.inner.params.kd;
            }

            shared.hold.insert(*joint, q);
        }

        // Legs are a safety posture, not a locomotion command
        if self.inner.params.command_idle_joints {
            for joint in JointId::legs() {
                let cmd = &mut frame.motor_cmd[joint.index()];
                cmd.q = 0.0;
                cmd.kp = 0.0;
                cmd.kd = 0.0;
            }
        }

        // A rest-posture release completes with this frame
        if shared.phase == Phase::Releasing
            && self.inner.params.release_mode == ReleaseMode::RestPosture
        {
            shared.phase = Phase::Released;
        }

        // A complete session keeps holding its targets, its elapsed time stops advancing
        if let Some(ref mut session) = shared.session {
            if !session.complete() {
                session.advance(self.inner.params.control_period_s);
            }
        }

        drop(shared);
        self.inner.tick.notify_all();

        Some(frame)
    }

    // ---- PRIVATE ----

    fn lock(&self) -> MutexGuard<Shared> {
        // A poisoned lock means a panicking waiter, the controller state itself is still
        // consistent and publication must not stop
        self.inner
            .shared
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn reached(shared: &Shared, targets: &HashMap<JointId, f64>, tolerance_rad: f64) -> bool {
        if targets.is_empty() {
            return true;
        }

        let state = match shared.state {
            Some(ref s) => s,
            None => return false,
        };

        targets.iter().all(|(joint, target)| {
            if !joint.is_controlled() {
                return true;
            }
            (state.motor_state[joint.index()].q - target).abs() <= tolerance_rad
        })
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{echo_state, test_params, EchoRig};
    use std::thread;

    fn one_target(joint: JointId, q: f64) -> HashMap<JointId, f64> {
        let mut targets = HashMap::new();
        targets.insert(joint, q);
        targets
    }

    #[test]
    fn test_has_reached_semantics() {
        let ctrl = ArmCtrl::new(test_params());

        // Vacuously true for an empty map, even with no state
        assert!(ctrl.has_reached(&HashMap::new(), 0.05));

        // False for a non-empty map before any state has arrived
        assert!(!ctrl.has_reached(&one_target(JointId::LeftElbow, 0.0), 0.05));

        let mut state = StateFrame::default();
        state.motor_state[JointId::LeftElbow.index()].q = 0.5;
        state.motor_state[JointId::RightElbow.index()].q = 2.0;
        ctrl.update_state(state);

        // Within tolerance of the covered joint, other joints do not matter
        assert!(ctrl.has_reached(&one_target(JointId::LeftElbow, 0.52), 0.05));

        // Outside tolerance
        assert!(!ctrl.has_reached(&one_target(JointId::LeftElbow, 0.7), 0.05));

        // Two joints, one off target
        let mut targets = one_target(JointId::LeftElbow, 0.5);
        targets.insert(JointId::RightElbow, 0.0);
        assert!(!ctrl.has_reached(&targets, 0.05));
    }

    #[test]
    fn test_move_before_state_is_not_ready() {
        let ctrl = ArmCtrl::new(test_params());

        match ctrl.move_to(&one_target(JointId::LeftElbow, 0.3), 0.1, 0.1) {
            Err(ArmCtrlError::NotReady) => (),
            other => panic!("Expected NotReady, got {:?}", other),
        }
    }

    #[test]
    fn test_uncontrolled_joint_rejected() {
        let ctrl = ArmCtrl::new(test_params());
        ctrl.update_state(StateFrame::default());

        match ctrl.move_to(&one_target(JointId::LeftKnee, 0.3), 0.1, 0.1) {
            Err(ArmCtrlError::InvalidInput(_)) => (),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_short_wait_times_out() {
        // No ticking task is running, so the move can never converge
        let ctrl = ArmCtrl::new(test_params());
        ctrl.update_state(StateFrame::default());

        let outcome = ctrl
            .move_to(&one_target(JointId::LeftElbow, 1.0), 5.0, 0.05)
            .unwrap();

        assert_eq!(outcome, MoveOutcome::TimedOut);
        assert_eq!(ctrl.phase(), Phase::TimedOut);
    }

    #[test]
    fn test_cancel_unblocks_move() {
        let ctrl = ArmCtrl::new(test_params());
        ctrl.update_state(StateFrame::default());

        let canceller = ctrl.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });

        let start = Instant::now();
        let outcome = ctrl
            .move_to(&one_target(JointId::LeftElbow, 1.0), 5.0, 5.0)
            .unwrap();
        handle.join().unwrap();

        assert_eq!(outcome, MoveOutcome::Cancelled);
        // Unblocked promptly, not at the observation deadline
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_tick_skipped_before_first_state() {
        let ctrl = ArmCtrl::new(test_params());
        assert!(ctrl.tick().is_none());
    }

    #[test]
    fn test_tick_holds_baseline_posture() {
        let ctrl = ArmCtrl::new(test_params());

        let mut state = StateFrame::default();
        state.motor_state[JointId::WaistYaw.index()].q = 0.3;
        state.mode_machine = 4;
        ctrl.update_state(state);

        let frame = ctrl.tick().unwrap();

        // Idle ticks hold the measured posture with the supervisory slot armed
        assert_eq!(frame.motor_cmd[SUPERVISORY_IDX].q, SUPERVISORY_ARMED);
        assert_eq!(frame.mode_machine, 4);
        assert_eq!(frame.motor_cmd[JointId::WaistYaw.index()].q, 0.3);
        assert_eq!(frame.motor_cmd[JointId::WaistYaw.index()].kp, 60.0);
        assert_eq!(frame.motor_cmd[JointId::WaistYaw.index()].dq, 0.0);

        // Legs at the neutral safety posture with zero gains
        assert_eq!(frame.motor_cmd[JointId::LeftKnee.index()].q, 0.0);
        assert_eq!(frame.motor_cmd[JointId::LeftKnee.index()].kp, 0.0);
    }

    #[test]
    fn test_move_converges_against_echo() {
        let rig = EchoRig::start();

        let outcome = rig
            .ctrl
            .move_to(&one_target(JointId::LeftShoulderPitch, 0.4), 0.05, 2.0)
            .unwrap();

        assert_eq!(outcome, MoveOutcome::Converged);
        assert!((rig.ctrl.joint_q(JointId::LeftShoulderPitch).unwrap() - 0.4).abs() <= 0.05);
    }

    #[test]
    fn test_release_ramp_reaches_zero_and_is_terminal() {
        let ctrl = ArmCtrl::new(test_params());
        ctrl.update_state(StateFrame::default());

        let releaser = ctrl.clone();
        let handle = thread::spawn(move || releaser.release());

        // Drive the ramp by ticking manually, publication must continue throughout
        let mut ticks = 0;
        while ctrl.phase() != Phase::Released {
            let frame = ctrl.tick().expect("Publication stopped during release");
            assert!(frame.motor_cmd[SUPERVISORY_IDX].q >= SUPERVISORY_RELEASED);
            ticks += 1;
            assert!(ticks < 1000, "Ramp never completed");
            thread::sleep(Duration::from_millis(1));
        }

        handle.join().unwrap().unwrap();

        // Ramp length matches the configured duration in control periods
        let params = test_params();
        let expected = (params.release_ramp_duration_s / params.control_period_s).round() as i32;
        assert!((ticks - expected).abs() <= 1, "{} vs {}", ticks, expected);

        assert_eq!(ctrl.supervisory(), SUPERVISORY_RELEASED);

        // Terminal: no further moves accepted
        match ctrl.move_to(&one_target(JointId::LeftElbow, 0.1), 0.1, 0.1) {
            Err(ArmCtrlError::Released) => (),
            other => panic!("Expected Released, got {:?}", other),
        }

        // Idempotent
        ctrl.release().unwrap();
    }

    #[test]
    fn test_release_rest_posture_zeroes_gains_and_is_terminal() {
        let mut params = test_params();
        params.release_mode = ReleaseMode::RestPosture;
        params.rest_posture_rad.insert(String::from("LeftElbow"), 0.3);

        let ctrl = ArmCtrl::new(params);
        ctrl.update_state(StateFrame::default());

        let releaser = ctrl.clone();
        let handle = thread::spawn(move || releaser.release());

        // Drive the rest move and the handback by ticking manually, echoing every commanded
        // position straight back as measured state
        let mut last = None;
        let mut ticks = 0;
        while ctrl.phase() != Phase::Released {
            if let Some(frame) = ctrl.tick() {
                ctrl.update_state(echo_state(&frame));
                last = Some(frame);
            }
            ticks += 1;
            assert!(ticks < 2000, "Release never completed");
            thread::sleep(Duration::from_millis(1));
        }

        handle.join().unwrap().unwrap();

        // The terminal frame hands back with zero gains on every controlled joint and the
        // arbitration slot released
        let frame = last.expect("No frame was published");
        assert_eq!(frame.motor_cmd[SUPERVISORY_IDX].q, SUPERVISORY_RELEASED);
        for joint in JointId::upper_body() {
            assert_eq!(frame.motor_cmd[joint.index()].kp, 0.0);
            assert_eq!(frame.motor_cmd[joint.index()].kd, 0.0);
        }

        // The configured rest posture was reached before the handback
        assert!((ctrl.joint_q(JointId::LeftElbow).unwrap() - 0.3).abs() <= 0.05);

        // Terminal: no further moves accepted
        match ctrl.move_to(&one_target(JointId::LeftElbow, 0.1), 0.1, 0.1) {
            Err(ArmCtrlError::Released) => (),
            other => panic!("Expected Released, got {:?}", other),
        }

        // Idempotent
        ctrl.release().unwrap();
    }

    #[test]
    fn test_overwritten_move_keeps_its_own_wait() {
        let rig = EchoRig::start();

        // A slow first move that cannot finish within its own observation window
        let first = rig.ctrl.clone();
        let handle = thread::spawn(move || {
            first.move_to(&one_target(JointId::LeftElbow, 1.0), 10.0, 0.5)
        });

        // Let the first wait begin, then overwrite the session with a quick move of the same
        // joint to a nearer target
        thread::sleep(Duration::from_millis(100));
        let outcome = rig
            .ctrl
            .move_to(&one_target(JointId::LeftElbow, 0.3), 0.05, 1.0)
            .unwrap();
        assert_eq!(outcome, MoveOutcome::Converged);

        // The displaced caller keeps judging its own targets against live state until its own
        // deadline, so it times out rather than adopting the second move's outcome
        let displaced = handle.join().unwrap().unwrap();
        assert_eq!(displaced, MoveOutcome::TimedOut);

        // The commanded posture is the second move's target
        assert!((rig.ctrl.joint_q(JointId::LeftElbow).unwrap() - 0.3).abs() <= 0.05);
    }

    #[test]
    fn test_release_without_state_is_immediate() {
        let ctrl = ArmCtrl::new(test_params());
        ctrl.release().unwrap();
        assert_eq!(ctrl.phase(), Phase::Released);
    }
}
