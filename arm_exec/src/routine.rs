//! # Routine loading and playback
//!
//! A routine is a named, ordered sequence of steps, each with its own partial joint target map
//! and duration, loaded from a declarative JSON document:
//!
//! ```json
//! {
//!     "name": "wave",
//!     "steps": [
//!         { "name": "raise", "targets": { "22": 0.8, "RightElbow": 1.2 }, "duration_s": 2.0 }
//!     ]
//! }
//! ```
//!
//! Target keys may be joint indices or joint names, both are normalized into [`JointId`] at
//! load time. Unknown or malformed keys are rejected once, at load, never per access.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

use comms_if::eqpt::joints::{JointId, JointIdError};

// Internal
use crate::arm_ctrl::{ArmCtrl, ArmCtrlError, MoveOutcome};
use crate::sampler::Sampler;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A named ordered sequence of motion steps. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct Routine {
    pub name: String,

    pub steps: Vec<Step>,
}

/// One step of a routine: a partial target posture and the duration of the move toward it.
#[derive(Debug, Clone)]
pub struct Step {
    pub name: String,

    /// Joint targets in radians. May cover any subset of the controlled joints.
    pub targets: HashMap<JointId, f64>,

    /// Duration of the interpolated move.
    ///
    /// Units: seconds
    pub duration_s: f64,
}

/// Raw document shape as found on disk, before key normalization.
#[derive(Debug, Deserialize)]
struct RawRoutine {
    name: String,
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    name: String,
    targets: HashMap<String, f64>,
    duration_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with loading or playing a routine.
#[derive(Debug, Error)]
pub enum RoutineError {
    #[error("Could not find the routine file at {0:?}")]
    NotFound(PathBuf),

    #[error("Could not load the routine file: {0}")]
    LoadError(std::io::Error),

    #[error("Could not parse the routine document: {0}")]
    ParseError(serde_json::Error),

    #[error("Step {step:?} has an invalid joint key {key:?}: {source}")]
    InvalidJointKey {
        step: String,
        key: String,
        source: JointIdError,
    },

    #[error("Step {step:?} has a non-positive duration ({duration_s} s)")]
    InvalidDuration { step: String, duration_s: f64 },

    #[error("The routine was cancelled")]
    Cancelled,

    #[error(transparent)]
    CtrlError(#[from] ArmCtrlError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Routine {
    /// Load a routine from a JSON file, normalizing all step target keys.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RoutineError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RoutineError::NotFound(path.to_path_buf()));
        }

        let document = fs::read_to_string(path).map_err(RoutineError::LoadError)?;
        let raw: RawRoutine =
            serde_json::from_str(&document).map_err(RoutineError::ParseError)?;

        let mut steps = Vec::with_capacity(raw.steps.len());

        for raw_step in raw.steps {
            if raw_step.duration_s <= 0.0 {
                return Err(RoutineError::InvalidDuration {
                    step: raw_step.name,
                    duration_s: raw_step.duration_s,
                });
            }

            let mut targets = HashMap::with_capacity(raw_step.targets.len());

            for (key, q) in &raw_step.targets {
                let joint =
                    JointId::from_str(key).map_err(|e| RoutineError::InvalidJointKey {
                        step: raw_step.name.clone(),
                        key: key.clone(),
                        source: e,
                    })?;
                targets.insert(joint, *q);
            }

            steps.push(Step {
                name: raw_step.name,
                targets,
                duration_s: raw_step.duration_s,
            });
        }

        Ok(Self {
            name: raw.name,
            steps,
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Play a routine, driving the sequencer through each step strictly in order.
///
/// Each step's observation timeout is its duration plus `grace_s`. Converged and timed-out
/// steps both continue the routine (logged distinctly), cancellation aborts it, transport
/// faults propagate. Targets naming valid but uncontrolled joints are dropped with a warning.
pub fn play(
    ctrl: &ArmCtrl,
    routine: &Routine,
    grace_s: f64,
    sampler: Option<&Sampler>,
) -> Result<(), RoutineError> {
    if routine.steps.is_empty() {
        info!("Routine {:?} has no steps, nothing to do", routine.name);
        return Ok(());
    }

    info!(
        "Playing routine {:?} ({} steps)",
        routine.name,
        routine.steps.len()
    );

    for (i, step) in routine.steps.iter().enumerate() {
        // Restrict the step to the controlled set
        let mut targets: HashMap<JointId, f64> = HashMap::with_capacity(step.targets.len());
        for (joint, q) in &step.targets {
            if joint.is_controlled() {
                targets.insert(*joint, *q);
            } else {
                warn!(
                    "Step {:?} targets uncontrolled joint {}, dropped",
                    step.name, joint
                );
            }
        }

        info!(
            "Step {}/{} {:?}: {} joints over {:.1} s",
            i + 1,
            routine.steps.len(),
            step.name,
            targets.len(),
            step.duration_s
        );

        let wait_start = Instant::now();
        let outcome = ctrl.move_to(&targets, step.duration_s, step.duration_s + grace_s)?;

        if let Some(sampler) = sampler {
            sampler.record_move(
                &step.name,
                outcome,
                step.duration_s,
                wait_start.elapsed().as_secs_f64(),
            );
        }

        match outcome {
            MoveOutcome::Converged => info!("Step {:?} converged", step.name),
            MoveOutcome::TimedOut => {
                warn!("Step {:?} timed out, continuing with held command", step.name)
            }
            MoveOutcome::Cancelled => {
                warn!("Routine {:?} cancelled at step {:?}", routine.name, step.name);
                return Err(RoutineError::Cancelled);
            }
        }
    }

    info!("Routine {:?} complete", routine.name);
    Ok(())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::EchoRig;
    use util::archive::Archiver;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("deimos_routine_test_{}_{}", std::process::id(), name));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_normalizes_keys() {
        let path = write_temp(
            "keys.json",
            r#"{
                "name": "test",
                "steps": [
                    { "name": "a", "targets": { "15": 0.28, "WaistYaw": -0.1 }, "duration_s": 3.0 }
                ]
            }"#,
        );

        let routine = Routine::load(&path).unwrap();
        assert_eq!(routine.name, "test");
        assert_eq!(routine.steps.len(), 1);

        let step = &routine.steps[0];
        assert_eq!(step.targets[&JointId::LeftShoulderPitch], 0.28);
        assert_eq!(step.targets[&JointId::WaistYaw], -0.1);
        assert_eq!(step.duration_s, 3.0);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_rejects_bad_keys_and_durations() {
        let path = write_temp(
            "bad_key.json",
            r#"{ "name": "t", "steps": [
                { "name": "a", "targets": { "Grabber": 0.1 }, "duration_s": 1.0 }
            ] }"#,
        );
        assert!(matches!(
            Routine::load(&path),
            Err(RoutineError::InvalidJointKey { .. })
        ));
        fs::remove_file(&path).ok();

        let path = write_temp(
            "bad_dur.json",
            r#"{ "name": "t", "steps": [
                { "name": "a", "targets": { "15": 0.1 }, "duration_s": 0.0 }
            ] }"#,
        );
        assert!(matches!(
            Routine::load(&path),
            Err(RoutineError::InvalidDuration { .. })
        ));
        fs::remove_file(&path).ok();

        assert!(matches!(
            Routine::load("/nonexistent/routine.json"),
            Err(RoutineError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_routine_is_noop() {
        let rig = EchoRig::start();
        let routine = Routine {
            name: "empty".into(),
            steps: vec![],
        };

        play(&rig.ctrl, &routine, 1.0, None).unwrap();
    }

    #[test]
    fn test_two_step_routine_converges_against_echo() {
        let rig = EchoRig::start();

        let mut up = HashMap::new();
        up.insert(JointId::LeftElbow, 1.0);
        let mut down = HashMap::new();
        down.insert(JointId::LeftElbow, 0.0);

        let routine = Routine {
            name: "two_step".into(),
            steps: vec![
                Step {
                    name: "up".into(),
                    targets: up,
                    duration_s: 0.05,
                },
                Step {
                    name: "down".into(),
                    targets: down,
                    duration_s: 0.05,
                },
            ],
        };

        // Record the step outcomes through a sampler so each one can be checked
        let mut joints_path = std::env::temp_dir();
        joints_path.push(format!("deimos_routine_test_{}_joints.csv", std::process::id()));
        let mut arch_path = std::env::temp_dir();
        arch_path.push(format!("deimos_routine_test_{}_moves.csv", std::process::id()));
        let sampler = Sampler::new(
            Archiver::from_file(&joints_path).unwrap(),
            None,
            Some(Archiver::from_file(&arch_path).unwrap()),
            500,
        )
        .unwrap();

        play(&rig.ctrl, &routine, 2.0, Some(&sampler)).unwrap();
        sampler.close();

        assert!((rig.ctrl.joint_q(JointId::LeftElbow).unwrap() - 0.0).abs() <= 0.05);

        let contents = fs::read_to_string(&arch_path).unwrap();
        let converged = contents.matches("Converged").count();
        assert_eq!(converged, 2, "both steps should converge: {}", contents);

        fs::remove_file(&arch_path).ok();
        fs::remove_file(&joints_path).ok();
    }
}
