use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use log::info;
use protocol::{Mode, Packet};
use util::{ClientError, Result};

use crate::transport::Transport;

const RETRY_DEADLINE: Duration = Duration::from_millis(100);
const LISTENER_POLL: Duration = Duration::from_millis(50);
const MAX_ATTEMPTS: u32 = 20;

/// Runs the SYN exchange to completion: `Idle -> Handshaking -> (Established |
/// ResetAborted)`. A listener thread blocks in `recv` so that sends (on this
/// thread) and receives interleave within a single 100 ms retry slot; the
/// listener is cancelled as soon as a connId is adopted.
pub fn run(transport: &Transport, mode: Mode) -> Result<u32> {
	let done = AtomicBool::new(false);
	let (found_tx, found_rx) = mpsc::channel::<u32>();

	thread::scope(|scope| {
		scope.spawn(|| {
			while !done.load(Ordering::Relaxed) {
				match transport.recv(Some(LISTENER_POLL)) {
					Ok(packet) if packet.is_valid_initial_response() => {
						let _ = found_tx.send(packet.conn_id);
						return;
					}
					Ok(_) | Err(ClientError::Timeout) | Err(ClientError::MalformedPacket { .. }) => continue,
					Err(_) => return,
				}
			}
		});

		let syn = Packet::initial(mode);
		let mut attempts = 0;

		let conn_id = loop {
			transport.send(&syn);
			attempts += 1;

			match found_rx.recv_timeout(RETRY_DEADLINE) {
				Ok(conn_id) => break Some(conn_id),
				Err(mpsc::RecvTimeoutError::Timeout) if attempts < MAX_ATTEMPTS => continue,
				Err(_) => break None,
			}
		};

		done.store(true, Ordering::Relaxed);

		match conn_id {
			Some(conn_id) => {
				info!("handshake established, connId={conn_id:#010x}");
				Ok(conn_id)
			}
			None => {
				transport.send(&Packet::rst(0));
				Err(ClientError::HandshakeFailed { attempts, peer: transport.remote() })
			}
		}
	})
}

#[cfg(test)]
mod tests {
	// The socket-bound retry/timeout behavior of `run` is exercised end-to-end in
	// `tests/handshake.rs` against a loopback server stub; the pure decision logic
	// (which response completes a handshake) is covered by
	// `protocol::packet::tests::initial_response_validation`.
}
