use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use log::debug;
use protocol::{DecodeError, Packet, MAX_DATAGRAM};
use util::{ClientError, Result};

/// Local and remote UDP port the protocol is fixed to run on.
pub const PORT: u16 = 4000;

/// Thin wrapper around a connected UDP socket: encode-and-send, receive-and-decode
/// with an optional deadline. The socket is `connect`ed to the remote endpoint so
/// `send`/`recv` need no address bookkeeping, mirroring how the teacher's own
/// `Wireguard::init` binds then connects its socket before handing it to the tunnel.
pub struct Transport {
	socket: UdpSocket,
	remote: SocketAddr,
}

impl Transport {
	pub fn connect(remote: SocketAddr) -> Result<Self> {
		let socket = UdpSocket::bind(("0.0.0.0", PORT))?;
		socket.connect(remote)?;
		Ok(Self { socket, remote })
	}

	pub fn remote(&self) -> SocketAddr {
		self.remote
	}

	/// Encode and send `packet`. Returns `false` on a non-fatal I/O error (§4.2),
	/// logging the cause instead of propagating it.
	pub fn send(&self, packet: &Packet) -> bool {
		debug!("SEND {packet}");

		match self.socket.send(&packet.encode()) {
			Ok(_) => true,
			Err(err) => {
				log::warn!("failed to send packet to {}: {err}", self.remote);
				false
			}
		}
	}

	/// Block for up to `deadline` (or forever if `None`) for the next datagram.
	pub fn recv(&self, deadline: Option<Duration>) -> Result<Packet> {
		self.socket.set_read_timeout(deadline)?;

		let mut buf = [0u8; MAX_DATAGRAM];
		let n = match self.socket.recv(&mut buf) {
			Ok(n) => n,
			Err(err) if matches!(err.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) => {
				return Err(ClientError::Timeout)
			}
			Err(err) => return Err(err.into()),
		};

		let packet = Packet::decode(&buf[..n]).map_err(|err| self.malformed(err))?;
		debug!("RECV {packet}");
		Ok(packet)
	}

	fn malformed(&self, err: DecodeError) -> ClientError {
		let conn_id = match err {
			DecodeError::BadFlag { conn_id, .. } => Some(conn_id),
			DecodeError::TooShort(_) => None,
		};

		ClientError::MalformedPacket { peer: self.remote, conn_id, reason: err.to_string() }
	}

	/// Two loopback transports already `connect`ed to each other on ephemeral
	/// ports, for exercising the handshake/sender/receiver state machines without
	/// the fixed production port (which a real client process binds via
	/// [`Transport::connect`]).
	pub fn loopback_pair() -> Result<(Self, Self)> {
		let a = UdpSocket::bind(("127.0.0.1", 0))?;
		let b = UdpSocket::bind(("127.0.0.1", 0))?;
		a.connect(b.local_addr()?)?;
		b.connect(a.local_addr()?)?;
		let b_addr = b.local_addr()?;
		let a_addr = a.local_addr()?;
		Ok((Self { socket: a, remote: b_addr }, Self { socket: b, remote: a_addr }))
	}
}
