//! # Operator console
//!
//! Interactive command line run when the executable is started without a routine argument.
//! Reads commands with line editing and per-session history, drives the motion controller, and
//! forwards walking commands to the locomotion service where one is configured.
//!
//! Bad input is printed and re-prompted, never fatal: only a transport fault (or end of input)
//! ends the console.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{info, warn};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Instant;
use structopt::StructOpt;
use thiserror::Error;

use comms_if::eqpt::{joints::JointId, loco::LocoCmd};

// Internal
use crate::arm_ctrl::{ArmCtrl, ArmCtrlError};
use crate::loco_client::LocoClient;
use crate::params::ArmExecParams;
use crate::routine::{self, Routine};
use crate::sampler::Sampler;
use util::session::Session;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const PROMPT: &str = "deimos $ ";

const HELP: &str = "Commands:
    move <Joint>=<rad> [...] [dur=<s>]  interpolated move of the named joints
    zero [dur=<s>]                      move all controlled joints to zero
    rest [dur=<s>]                      move to the configured rest posture
    routine <path>                      play a routine file
    walk <vx> <vy> <wz> <dur_s>         walk at a body-frame velocity, then stop
    stop                                stop walking immediately
    loco <move|stop> [...]              raw locomotion command
    status                              show phase, arbitration and joint positions
    help                                show this text
    exit                                release the upper body and quit

Joints may be named (e.g. LeftElbow, WaistYaw) or indexed (e.g. 18).";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Fatal errors of the console. Everything recoverable is printed in the loop instead.
#[derive(Debug, Error)]
pub enum MenuError {
    #[error("Console input error: {0}")]
    ReadlineError(#[from] ReadlineError),

    #[error(transparent)]
    CtrlError(#[from] ArmCtrlError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run the operator console until the operator exits or the transport faults.
///
/// Does not release the controller itself, the caller owns the shutdown sequence.
pub fn run(
    ctrl: &ArmCtrl,
    mut loco: Option<LocoClient>,
    sampler: &Sampler,
    session: &Session,
    params: &ArmExecParams,
) -> Result<(), MenuError> {
    let mut rl = DefaultEditor::new()?;

    let mut history_path = session.session_root.clone();
    history_path.push("history.txt");
    if rl.load_history(&history_path).is_err() {
        info!("No console history found, starting fresh");
    }

    println!("Deimos upper-body console, type `help` for commands");

    loop {
        // A dead command task must end the console promptly, not sit behind a live prompt
        check_transport(ctrl)?;

        let line = match rl.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Exiting");
                break;
            }
            Err(e) => return Err(MenuError::ReadlineError(e)),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        // The transport may have faulted while the console was blocked reading
        check_transport(ctrl)?;

        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens[0] {
            "help" => println!("{}", HELP),
            "status" => print_status(ctrl),
            "move" => match parse_move(&tokens[1..], params.default_duration_s) {
                Ok((targets, _)) if targets.is_empty() => {
                    println!("No targets given, see `help`")
                }
                Ok((targets, duration_s)) => {
                    do_move(ctrl, sampler, "menu:move", &targets, duration_s, params)?
                }
                Err(msg) => println!("{}", msg),
            },
            "zero" => {
                let duration_s = match parse_duration(&tokens[1..], params.default_duration_s) {
                    Ok(d) => d,
                    Err(msg) => {
                        println!("{}", msg);
                        continue;
                    }
                };
                let targets: HashMap<JointId, f64> =
                    JointId::upper_body().iter().map(|j| (*j, 0.0)).collect();
                do_move(ctrl, sampler, "menu:zero", &targets, duration_s, params)?
            }
            "rest" => {
                let duration_s = match parse_duration(&tokens[1..], params.default_duration_s) {
                    Ok(d) => d,
                    Err(msg) => {
                        println!("{}", msg);
                        continue;
                    }
                };
                let targets = ctrl.rest_targets();
                do_move(ctrl, sampler, "menu:rest", &targets, duration_s, params)?
            }
            "routine" => {
                if tokens.len() != 2 {
                    println!("Usage: routine <path>");
                    continue;
                }
                match Routine::load(tokens[1]) {
                    Ok(r) => match routine::play(ctrl, &r, params.move_grace_s, Some(sampler)) {
                        Ok(()) => println!("Routine {:?} complete", r.name),
                        Err(routine::RoutineError::CtrlError(
                            ArmCtrlError::TransportFault,
                        )) => return Err(ArmCtrlError::TransportFault.into()),
                        Err(e) => println!("Routine failed: {}", e),
                    },
                    Err(e) => println!("Could not load the routine: {}", e),
                }
            }
            "walk" => match parse_walk(&tokens[1..]) {
                Ok((vx, vy, wz, dur)) => match loco {
                    Some(ref mut client) => {
                        if let Err(e) = client.move_for(vx, vy, wz, dur) {
                            println!("Walk failed: {}", e);
                        }
                    }
                    None => println!("No locomotion service is configured"),
                },
                Err(msg) => println!("{}", msg),
            },
            "stop" => match loco {
                Some(ref mut client) => {
                    if let Err(e) = client.stop() {
                        println!("Stop failed: {}", e);
                    }
                }
                None => println!("No locomotion service is configured"),
            },
            "loco" => {
                // Reuse the wire command's own argument parser
                match LocoCmd::from_iter_safe(tokens.iter().copied()) {
                    Ok(cmd) => match loco {
                        Some(ref mut client) => {
                            let result = match cmd {
                                LocoCmd::Move {
                                    vx_ms,
                                    vy_ms,
                                    wz_rads,
                                } => client.set_velocity(vx_ms, vy_ms, wz_rads),
                                LocoCmd::Stop => client.stop(),
                            };
                            if let Err(e) = result {
                                println!("Locomotion command failed: {}", e);
                            }
                        }
                        None => println!("No locomotion service is configured"),
                    },
                    Err(e) => println!("{}", e.message),
                }
            }
            "exit" | "quit" | "release" => {
                println!("Exiting");
                break;
            }
            other => println!("Unknown command {:?}, type `help` for commands", other),
        }
    }

    if let Err(e) = rl.save_history(&history_path) {
        warn!("Could not save the console history: {}", e);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Fail the console if the command transport has faulted.
///
/// Checked before every prompt and after every line read, so an idle console does not keep
/// accepting commands over a dead control loop.
fn check_transport(ctrl: &ArmCtrl) -> Result<(), MenuError> {
    if ctrl.faulted() {
        println!("The command transport has faulted, shutting down");
        Err(ArmCtrlError::TransportFault.into())
    } else {
        Ok(())
    }
}

/// Run a blocking move from the console, printing the outcome. Only transport faults propagate.
fn do_move(
    ctrl: &ArmCtrl,
    sampler: &Sampler,
    label: &str,
    targets: &HashMap<JointId, f64>,
    duration_s: f64,
    params: &ArmExecParams,
) -> Result<(), MenuError> {
    let max_wait_s = duration_s.max(params.default_max_wait_s);

    let wait_start = Instant::now();
    match ctrl.move_to(targets, duration_s, max_wait_s) {
        Ok(outcome) => {
            sampler.record_move(
                label,
                outcome,
                duration_s,
                wait_start.elapsed().as_secs_f64(),
            );
            println!("{:?}", outcome);
            Ok(())
        }
        Err(ArmCtrlError::TransportFault) => Err(ArmCtrlError::TransportFault.into()),
        Err(e) => {
            println!("Move rejected: {}", e);
            Ok(())
        }
    }
}

fn print_status(ctrl: &ArmCtrl) {
    println!("Phase: {:?}", ctrl.phase());
    println!("Supervisory: {:.3}", ctrl.supervisory());

    match ctrl.measured_positions() {
        Some(positions) => {
            for (joint, q) in positions {
                println!("    {:<20} {:>8.3} rad", joint.name(), q);
            }
        }
        None => println!("No state frame received yet"),
    }
}

/// Parse `<Joint>=<rad>` pairs with an optional trailing `dur=<s>`.
fn parse_move(
    tokens: &[&str],
    default_duration_s: f64,
) -> Result<(HashMap<JointId, f64>, f64), String> {
    let mut targets = HashMap::new();
    let mut duration_s = default_duration_s;

    for token in tokens {
        let (key, value) = match token.split_once('=') {
            Some(pair) => pair,
            None => return Err(format!("Expected <Joint>=<rad>, got {:?}", token)),
        };

        let value: f64 = value
            .parse()
            .map_err(|_| format!("{:?} is not a number", value))?;

        if key.eq_ignore_ascii_case("dur") {
            if value <= 0.0 {
                return Err(format!("Duration must be positive, got {}", value));
            }
            duration_s = value;
            continue;
        }

        let joint = JointId::from_str(key).map_err(|e| format!("{}", e))?;
        targets.insert(joint, value);
    }

    Ok((targets, duration_s))
}

/// Parse an optional single `dur=<s>` token.
fn parse_duration(tokens: &[&str], default_duration_s: f64) -> Result<f64, String> {
    match tokens {
        [] => Ok(default_duration_s),
        [token] => match token.strip_prefix("dur=") {
            Some(value) => {
                let duration_s: f64 = value
                    .parse()
                    .map_err(|_| format!("{:?} is not a number", value))?;
                if duration_s <= 0.0 {
                    return Err(format!("Duration must be positive, got {}", duration_s));
                }
                Ok(duration_s)
            }
            None => Err(format!("Expected dur=<s>, got {:?}", token)),
        },
        _ => Err(String::from("Expected at most one dur=<s> argument")),
    }
}

fn parse_walk(tokens: &[&str]) -> Result<(f64, f64, f64, f64), String> {
    if tokens.len() != 4 {
        return Err(String::from("Usage: walk <vx> <vy> <wz> <dur_s>"));
    }

    let mut values = [0.0; 4];
    for (i, token) in tokens.iter().enumerate() {
        values[i] = token
            .parse()
            .map_err(|_| format!("{:?} is not a number", token))?;
    }

    if values[3] <= 0.0 {
        return Err(format!("Duration must be positive, got {}", values[3]));
    }

    Ok((values[0], values[1], values[2], values[3]))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::test_params;

    #[test]
    fn test_console_ends_on_transport_fault() {
        let ctrl = ArmCtrl::new(test_params());

        // A healthy transport keeps the console running
        assert!(check_transport(&ctrl).is_ok());

        // A faulted one fails the console with the fault, which run() propagates to shutdown
        ctrl.set_fault();
        match check_transport(&ctrl) {
            Err(MenuError::CtrlError(ArmCtrlError::TransportFault)) => (),
            other => panic!("Expected TransportFault, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_move() {
        let (targets, duration_s) =
            parse_move(&["LeftElbow=0.5", "22=-0.1", "dur=2.5"], 3.0).unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[&JointId::LeftElbow], 0.5);
        assert_eq!(targets[&JointId::RightShoulderPitch], -0.1);
        assert_eq!(duration_s, 2.5);

        // Default duration when none is given
        let (_, duration_s) = parse_move(&["WaistYaw=0.2"], 3.0).unwrap();
        assert_eq!(duration_s, 3.0);

        assert!(parse_move(&["LeftElbow"], 3.0).is_err());
        assert!(parse_move(&["LeftElbow=abc"], 3.0).is_err());
        assert!(parse_move(&["Grabber=0.1"], 3.0).is_err());
        assert!(parse_move(&["dur=-1"], 3.0).is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(&[], 3.0).unwrap(), 3.0);
        assert_eq!(parse_duration(&["dur=1.5"], 3.0).unwrap(), 1.5);
        assert!(parse_duration(&["1.5"], 3.0).is_err());
        assert!(parse_duration(&["dur=0"], 3.0).is_err());
    }

    #[test]
    fn test_parse_walk() {
        let (vx, vy, wz, dur) = parse_walk(&["0.2", "0.0", "-0.1", "3"]).unwrap();
        assert_eq!((vx, vy, wz, dur), (0.2, 0.0, -0.1, 3.0));

        assert!(parse_walk(&["0.2"]).is_err());
        assert!(parse_walk(&["a", "b", "c", "d"]).is_err());
        assert!(parse_walk(&["0.2", "0.0", "0.0", "-1"]).is_err());
    }
}
