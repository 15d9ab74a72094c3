use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Every fallible boundary in the client returns this type. Timeout and
/// MalformedPacket are normally handled locally (see `client::handshake` and
/// `client::receiver`/`client::sender`); the rest bubble up to the mode driver.
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("handshake failed after {attempts} attempts, no valid SYN response from {peer}")]
	HandshakeFailed { attempts: u32, peer: SocketAddr },

	#[error("receive timed out")]
	Timeout,

	#[error("malformed packet from {peer}: {reason}")]
	MalformedPacket { peer: SocketAddr, conn_id: Option<u32>, reason: String },

	#[error("same data packet (seq {seq}) retransmitted {attempts} times without progress")]
	StuckTransmission { seq: u16, attempts: u32 },

	#[error("connection reset by peer")]
	ResetByPeer,

	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
