//! # State frame client
//!
//! Subscribes to the firmware's state publication (and the odometry publication where the
//! deployment carries one) with latest-value semantics: the sockets are conflated so only the
//! most recent frame is ever delivered, no history is kept.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use comms_if::{
    eqpt::low_level::{OdomFrame, StateFrame},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

use crate::arm_ctrl::ArmCtrl;
use crate::sampler::Sampler;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The state and odometry subscription endpoints.
pub struct StateClient {
    state_socket: MonitoredSocket,

    odom_socket: Option<MonitoredSocket>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum StateClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not receive from the socket: {0}")]
    RecvError(zmq::Error),

    #[error("Could not deserialize the received frame: {0}")]
    DeserializeError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl StateClient {
    /// Create a new instance of the state client.
    ///
    /// This function will not block waiting for the publications to appear, connection status
    /// is visible through the monitored sockets.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, StateClientError> {
        let state_socket = Self::sub_socket(ctx, &params.state_endpoint)?;

        let odom_socket = match params.odom_endpoint {
            Some(ref endpoint) => Some(Self::sub_socket(ctx, endpoint)?),
            None => None,
        };

        Ok(Self {
            state_socket,
            odom_socket,
        })
    }

    /// Get the most recent state frame, or `None` if no new frame has arrived.
    pub fn recv_state(&mut self) -> Result<Option<StateFrame>, StateClientError> {
        Self::recv_json(&self.state_socket)
    }

    /// Get the most recent odometry frame, or `None` if no new frame has arrived or the
    /// deployment has no odometry publication.
    pub fn recv_odom(&mut self) -> Result<Option<OdomFrame>, StateClientError> {
        match self.odom_socket {
            Some(ref socket) => Self::recv_json(socket),
            None => Ok(None),
        }
    }

    fn sub_socket(
        ctx: &zmq::Context,
        endpoint: &str,
    ) -> Result<MonitoredSocket, StateClientError> {
        // Conflate keeps only the latest frame, this controller never wants history
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            conflate: true,
            linger: 1,
            ..Default::default()
        };

        MonitoredSocket::new(ctx, zmq::SUB, socket_options, endpoint)
            .map_err(StateClientError::SocketError)
    }

    fn recv_json<T: serde::de::DeserializeOwned>(
        socket: &MonitoredSocket,
    ) -> Result<Option<T>, StateClientError> {
        let msg = match socket.recv_msg(zmq::DONTWAIT) {
            Ok(m) => m,
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(StateClientError::RecvError(e)),
        };

        serde_json::from_str(msg.as_str().unwrap_or(""))
            .map(Some)
            .map_err(StateClientError::DeserializeError)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// State reception loop, run on its own thread.
///
/// Feeds received frames into the controller's cache and the sampling archive until the
/// shutdown flag is raised. Receive errors are logged and tolerated, the subscription
/// reconnects on its own.
pub fn run_reception(
    mut client: StateClient,
    ctrl: ArmCtrl,
    sampler: Arc<Sampler>,
    shutdown: Arc<AtomicBool>,
) {
    debug!("State reception loop started");

    while !shutdown.load(Ordering::Relaxed) {
        let mut idle = true;

        match client.recv_state() {
            Ok(Some(frame)) => {
                sampler.sample_state(&frame);
                ctrl.update_state(frame);
                idle = false;
            }
            Ok(None) => (),
            Err(e) => warn!("State frame reception error: {}", e),
        }

        match client.recv_odom() {
            Ok(Some(frame)) => {
                sampler.sample_odom(&frame);
                idle = false;
            }
            Ok(None) => (),
            Err(e) => warn!("Odometry reception error: {}", e),
        }

        if idle {
            thread::sleep(Duration::from_millis(1));
        }
    }

    debug!("State reception loop stopped");
}
