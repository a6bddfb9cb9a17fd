//! # Locomotion client
//!
//! Request/reply client for the robot's locomotion service. Used by the operator surface only,
//! the motion controller itself never walks the robot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::info;
use std::thread;
use std::time::Duration;

use comms_if::{
    eqpt::loco::{LocoCmd, LocoResponse},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The locomotion command endpoint.
pub struct LocoClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum LocoClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the locomotion service")]
    NotConnected,

    #[error("Could not send the command: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a response: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the command: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The locomotion service rejected the command: {0}")]
    CmdRejected(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LocoClient {
    /// Create a new instance of the locomotion client.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, LocoClientError> {
        let socket_options = SocketOptions {
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 1000,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            block_on_first_connect: false,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)
            .map_err(LocoClientError::SocketError)?;

        Ok(Self { socket })
    }

    /// Command a body-frame walking velocity. The service holds the velocity until replaced or
    /// stopped.
    pub fn set_velocity(
        &mut self,
        vx_ms: f64,
        vy_ms: f64,
        wz_rads: f64,
    ) -> Result<(), LocoClientError> {
        self.request(&LocoCmd::Move {
            vx_ms,
            vy_ms,
            wz_rads,
        })
    }

    /// Stop walking.
    pub fn stop(&mut self) -> Result<(), LocoClientError> {
        self.request(&LocoCmd::Stop)
    }

    /// Walk at the given velocity for a fixed duration, then stop.
    ///
    /// Blocks the calling context for the duration. The stop is always attempted, including
    /// when the initial command failed partway.
    pub fn move_for(
        &mut self,
        vx_ms: f64,
        vy_ms: f64,
        wz_rads: f64,
        duration_s: f64,
    ) -> Result<(), LocoClientError> {
        self.set_velocity(vx_ms, vy_ms, wz_rads)?;
        info!(
            "Walking at ({:.2}, {:.2}) m/s, {:.2} rad/s for {:.1} s",
            vx_ms, vy_ms, wz_rads, duration_s
        );

        thread::sleep(Duration::from_secs_f64(duration_s));

        self.stop()
    }

    fn request(&mut self, cmd: &LocoCmd) -> Result<(), LocoClientError> {
        if !self.socket.connected() {
            return Err(LocoClientError::NotConnected);
        }

        let cmd_str = serde_json::to_string(cmd).map_err(LocoClientError::SerializationError)?;

        self.socket
            .send(&cmd_str, 0)
            .map_err(LocoClientError::SendError)?;

        let msg = self
            .socket
            .recv_msg(0)
            .map_err(LocoClientError::RecvError)?;

        let response: LocoResponse = serde_json::from_str(msg.as_str().unwrap_or(""))
            .map_err(LocoClientError::DeserializeError)?;

        match response {
            LocoResponse::CmdOk => Ok(()),
            LocoResponse::CmdRejected(reason) => Err(LocoClientError::CmdRejected(reason)),
        }
    }
}
