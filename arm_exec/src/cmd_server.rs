//! # Command frame server
//!
//! Publishes sealed command frames to the actuator firmware over a PUB socket. A publish
//! failure here is the fatal transport fault: there is no safe way to keep commanding blind.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::low_level::CommandFrame,
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The command frame publication endpoint.
pub struct CmdServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum CmdServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the command frame: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the command frame: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CmdServer {
    /// Create a new instance of the command server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, CmdServerError> {
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            connect_timeout: 1000,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, &params.cmd_endpoint)
            .map_err(CmdServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Publish a command frame.
    ///
    /// The frame must have been sealed after its last mutation, the firmware rejects frames
    /// with a stale checksum.
    pub fn publish(&mut self, frame: &CommandFrame) -> Result<(), CmdServerError> {
        let frame_str =
            serde_json::to_string(frame).map_err(CmdServerError::SerializationError)?;

        self.socket
            .send(&frame_str, 0)
            .map_err(CmdServerError::SendError)
    }
}
