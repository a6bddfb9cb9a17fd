//! Main upper-body control executable entry point.
//!
//! # Architecture
//!
//! The executable runs three contexts:
//!
//!     - The state reception loop, feeding received state and odometry frames into the
//!       controller's cache and the sampling archive
//!     - The periodic command task, synthesising and publishing one sealed command frame per
//!       control period from shortly after startup until release completes
//!     - The main context, which either plays the routine named on the command line or runs the
//!       operator console, then releases the upper body and shuts down
//!
//! Command publication never stops while the supervisory arbitration is armed: whatever the
//! main context is doing, the command task keeps the firmware fed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{info, warn};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use comms_if::net::NetParams;

// Internal
use arm_lib::{
    arm_ctrl::ArmCtrl,
    cmd_server::CmdServer,
    cmd_writer,
    loco_client::LocoClient,
    menu,
    params::ArmExecParams,
    routine::{self, Routine, RoutineError},
    sampler::Sampler,
    state_client::{self, StateClient},
};
use util::{
    archive::Archiver,
    host,
    logger::{level_from_str, logger_init},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    // Initialise session
    let session =
        Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    // Load exec parameters before the logger so the log level is configurable
    let exec_params: ArmExecParams =
        util::params::load("arm_exec.toml").wrap_err("Could not load exec params")?;
    exec_params.validate().wrap_err("Invalid exec params")?;

    // Initialise logger
    let level = level_from_str(&exec_params.log_level).wrap_err("Invalid log level")?;
    logger_init(level, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution
    info!("Deimos Upper-Body Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let ctrl_params: arm_lib::arm_ctrl::Params =
        util::params::load("arm_ctrl.toml").wrap_err("Could not load controller params")?;
    ctrl_params
        .validate()
        .wrap_err("Invalid controller params")?;

    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    info!("Parameters loaded");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let cmd_server =
        CmdServer::new(&zmq_ctx, &net_params).wrap_err("Failed to initialise the CmdServer")?;
    info!("CmdServer initialised");

    let state_client = StateClient::new(&zmq_ctx, &net_params)
        .wrap_err("Failed to initialise the StateClient")?;
    info!("StateClient initialised");

    let loco_client = match net_params.loco_endpoint {
        Some(ref endpoint) => {
            let c = LocoClient::new(&zmq_ctx, endpoint)
                .wrap_err("Failed to initialise the LocoClient")?;
            info!("LocoClient initialised");
            Some(c)
        }
        None => None,
    };

    info!("Network initialisation complete");

    // ---- INITIALISE CONTROLLER AND ARCHIVES ----

    let ctrl = ArmCtrl::new(ctrl_params);

    let odom_archiver = match (exec_params.sample_odometry, &net_params.odom_endpoint) {
        (true, Some(_)) => Some(
            Archiver::from_path(&session, "odometry.csv")
                .wrap_err("Failed to create the odometry archive")?,
        ),
        _ => None,
    };

    let sampler = Arc::new(
        Sampler::new(
            Archiver::from_path(&session, "joint_states.csv")
                .wrap_err("Failed to create the joint state archive")?,
            odom_archiver,
            Some(
                Archiver::from_path(&session, "moves.csv")
                    .wrap_err("Failed to create the move archive")?,
            ),
            exec_params.sample_decimation,
        )
        .wrap_err("Failed to initialise the sampler")?,
    );

    // ---- START THREADS ----

    let shutdown = Arc::new(AtomicBool::new(false));

    let reception_handle = {
        let ctrl = ctrl.clone();
        let sampler = sampler.clone();
        let shutdown = shutdown.clone();
        thread::spawn(move || state_client::run_reception(state_client, ctrl, sampler, shutdown))
    };

    let writer_handle = {
        let ctrl = ctrl.clone();
        thread::spawn(move || cmd_writer::run(ctrl, cmd_server))
    };

    // Ctrl-C aborts any blocking move, shutdown then proceeds through the normal release path
    {
        let ctrl = ctrl.clone();
        ctrlc::set_handler(move || {
            warn!("Interrupt received, cancelling");
            ctrl.cancel();
        })
        .wrap_err("Failed to set the interrupt handler")?;
    }

    // ---- WAIT FOR FIRST STATE ----

    let wait_start = Instant::now();
    let mut warned = false;

    while !ctrl.has_state() && !ctrl.cancelled() {
        if !warned && wait_start.elapsed().as_secs_f64() > exec_params.first_state_timeout_s {
            warn!(
                "No state frame after {:.1} s, is the firmware publishing?",
                exec_params.first_state_timeout_s
            );
            warned = true;
        }
        thread::sleep(Duration::from_millis(10));
    }

    if ctrl.has_state() {
        info!(
            "First state frame received after {:.2} s",
            wait_start.elapsed().as_secs_f64()
        );
    }

    // ---- RUN ----

    // One argument plays that routine, none runs the operator console
    let args: Vec<String> = env::args().collect();

    let run_result: Result<(), Report> = match args.len() {
        2 => {
            let r = Routine::load(&args[1]).wrap_err("Failed to load the routine")?;
            match routine::play(&ctrl, &r, exec_params.move_grace_s, Some(&sampler)) {
                Ok(()) => Ok(()),
                Err(RoutineError::Cancelled) => {
                    warn!("Routine cancelled, shutting down");
                    Ok(())
                }
                Err(e) => Err(e).wrap_err("Routine playback failed"),
            }
        }
        1 => menu::run(&ctrl, loco_client, &sampler, &session, &exec_params)
            .wrap_err("The operator console failed"),
        _ => Err(eyre!(
            "Expected either zero or one argument, found {}",
            args.len() - 1
        )),
    };

    // ---- SHUTDOWN ----

    info!("Releasing the upper body");
    if let Err(e) = ctrl.release() {
        warn!("Release failed: {}", e);
    }

    sampler.close();

    shutdown.store(true, Ordering::Relaxed);
    reception_handle
        .join()
        .map_err(|_| eyre!("The state reception thread panicked"))?;

    writer_handle
        .join()
        .map_err(|_| eyre!("The command task panicked"))?
        .wrap_err("The command task failed")?;

    info!("Shutdown complete");

    run_result
}
