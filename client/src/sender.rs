use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use protocol::{lift, lower, Flag, Mode, Packet, CHUNK_SIZE, WINDOW_SIZE};
use util::{ClientError, Result};

use crate::transport::Transport;

/// How long a head-of-window chunk goes unacked before it is resent (§4.6).
const RESEND_TIMEOUT: Duration = Duration::from_millis(100);
/// How often the retransmit thread wakes to check `RESEND_TIMEOUT`.
const TICK: Duration = Duration::from_millis(20);
/// Poll granularity for the ack-receiver loop, so it observes `closed` promptly.
const ACK_POLL: Duration = Duration::from_millis(100);
/// Consecutive resends of an unchanged head seq before giving up (§4.6, §7).
const STUCK_LIMIT: u32 = 20;

/// Everything the two upload threads share, behind one mutex. `requested_seq`
/// is the logical offset of the first byte not yet acked; `chunks` holds that
/// byte and everything already read past it, up to `WINDOW_SIZE` chunks ahead.
struct SendWindow {
	chunks: VecDeque<Vec<u8>>,
	requested_seq: u64,
	last_sent: Instant,
	input: BufReader<File>,
	eof: bool,
	stuck_seq: Option<u16>,
	stuck_count: u32,
}

/// Drives an UPLOAD: reads the source file into a `WINDOW_SIZE`-deep send
/// window, resends the window's head on a timer, and slides it forward on
/// every cumulative ack. Mirrors the teacher's `static EXIT: AtomicBool` used
/// to tear down `rt.rs`'s reactor from another thread, here guarding the
/// handoff between the ack-receiver loop and the retransmit ticker.
pub struct FileSender {
	conn_id: u32,
	transport: Arc<Transport>,
	window: Mutex<SendWindow>,
	closed: AtomicBool,
	ticker_err: Mutex<Option<ClientError>>,
}

impl FileSender {
	pub fn new(conn_id: u32, transport: Arc<Transport>, input_path: &Path) -> Result<Self> {
		let input = BufReader::new(File::open(input_path)?);
		let window = SendWindow {
			chunks: VecDeque::new(),
			requested_seq: 0,
			last_sent: Instant::now(),
			input,
			eof: false,
			stuck_seq: None,
			stuck_count: 0,
		};

		Ok(Self {
			conn_id,
			transport,
			window: Mutex::new(window),
			closed: AtomicBool::new(false),
			ticker_err: Mutex::new(None),
		})
	}

	/// Runs the upload to completion: primes the window, spawns the
	/// retransmit ticker, and drives the ack-receiver loop on the calling
	/// thread until FIN, RST, or an unrecoverable error. A fatal error raised
	/// by the ticker (e.g. `StuckTransmission`) takes precedence over
	/// whatever `ack_loop` observed once `closed` flips, since it's the
	/// reason the transfer was aborted in the first place.
	pub fn run(self: Arc<Self>) -> Result<()> {
		{
			let mut window = self.window.lock().expect("send window poisoned");
			self.refill(&mut window)?;
			self.send_window(&mut window)?;
		}

		let ticker = {
			let sender = Arc::clone(&self);
			thread::spawn(move || sender.ticker_loop())
		};

		let result = self.ack_loop();

		self.closed.store(true, Ordering::Relaxed);
		ticker.join().expect("retransmit ticker thread panicked");

		match self.ticker_err.lock().expect("ticker error poisoned").take() {
			Some(err) => Err(err),
			None => result,
		}
	}

	fn ack_loop(&self) -> Result<()> {
		loop {
			if self.closed.load(Ordering::Relaxed) {
				return Ok(());
			}

			let packet = match self.transport.recv(Some(ACK_POLL)) {
				Ok(packet) => packet,
				Err(ClientError::Timeout) => continue,
				Err(ClientError::MalformedPacket { conn_id, reason, .. }) => {
					warn!("discarding malformed packet during upload: {reason}");
					if let Some(conn_id) = conn_id {
						self.transport.send(&Packet::rst(conn_id));
					}
					continue;
				}
				Err(err) => return Err(err),
			};

			if packet.conn_id != self.conn_id {
				self.transport.send(&Packet::rst(packet.conn_id));
				continue;
			}

			match packet.flag {
				Flag::Rst => return Err(ClientError::ResetByPeer),
				Flag::Fin if packet.is_valid_fin() => {
					info!("UPLOADING FINISHED");
					return Ok(());
				}
				Flag::Fin => {
					warn!("malformed FIN (non-empty payload) from connId={:#010x}", packet.conn_id);
					self.transport.send(&Packet::rst(packet.conn_id));
				}
				Flag::Empty => {
					let mut window = self.window.lock().expect("send window poisoned");
					self.on_ack(&mut window, packet.ack)?;
				}
				Flag::Syn => {
					warn!("unexpected SYN on established connId={:#010x}", self.conn_id);
					self.transport.send(&Packet::rst(self.conn_id));
				}
			}
		}
	}

	fn ticker_loop(&self) {
		while !self.closed.load(Ordering::Relaxed) {
			thread::sleep(TICK);

			if self.closed.load(Ordering::Relaxed) {
				return;
			}

			let mut window = self.window.lock().expect("send window poisoned");
			if window.last_sent.elapsed() < RESEND_TIMEOUT {
				continue;
			}

			if let Err(err) = self.send_window(&mut window) {
				warn!("upload aborting: {err}");
				drop(window);
				*self.ticker_err.lock().expect("ticker error poisoned") = Some(err);
				self.closed.store(true, Ordering::Relaxed);
				return;
			}
		}
	}

	/// Applies a cumulative ack: drops fully-acked chunks from the front of
	/// the window, advances `requested_seq`, tops the window back up, and
	/// resends whatever remains. Stale or duplicate acks are no-ops.
	fn on_ack(&self, window: &mut SendWindow, wire_ack: u16) -> Result<()> {
		let ack_logical = lift(window.requested_seq, wire_ack);
		if ack_logical <= window.requested_seq {
			return Ok(());
		}

		let mut advance = ack_logical - window.requested_seq;
		while advance > 0 {
			let Some(front) = window.chunks.front() else { break };
			let len = front.len() as u64;
			if len > advance {
				break; // acks only ever land on chunk boundaries the sender itself drew
			}
			window.chunks.pop_front();
			advance -= len;
		}

		window.requested_seq = ack_logical;
		window.stuck_seq = None;
		window.stuck_count = 0;

		self.refill(window)?;
		self.send_window(window)
	}

	fn refill(&self, window: &mut SendWindow) -> Result<()> {
		while window.chunks.len() < WINDOW_SIZE && !window.eof {
			let chunk = read_chunk(&mut window.input, CHUNK_SIZE)?;
			if chunk.is_empty() {
				window.eof = true;
				break;
			}
			if chunk.len() < CHUNK_SIZE {
				window.eof = true;
			}
			window.chunks.push_back(chunk);
		}

		Ok(())
	}

	/// (Re)sends every chunk currently in the window, or the closing FIN once
	/// the file is exhausted and fully acked. Bumps the duplicate-send guard
	/// whenever the head-of-window seq is unchanged from the previous send.
	fn send_window(&self, window: &mut SendWindow) -> Result<()> {
		if window.chunks.is_empty() {
			if window.eof {
				self.transport.send(&Packet::fin(self.conn_id, lower(window.requested_seq), Mode::Upload));
			}
			return Ok(());
		}

		let head_seq = lower(window.requested_seq);
		if window.stuck_seq == Some(head_seq) {
			window.stuck_count += 1;
		} else {
			window.stuck_seq = Some(head_seq);
			window.stuck_count = 1;
		}

		if window.stuck_count >= STUCK_LIMIT {
			return Err(ClientError::StuckTransmission { seq: head_seq, attempts: window.stuck_count });
		}

		let mut offset = window.requested_seq;
		for chunk in &window.chunks {
			self.transport.send(&Packet::data(self.conn_id, lower(offset), chunk.clone()));
			offset += chunk.len() as u64;
		}

		window.last_sent = Instant::now();
		Ok(())
	}
}

/// Reads up to `max` bytes, looping past short reads; returns fewer than
/// `max` bytes only at EOF.
fn read_chunk(input: &mut impl Read, max: usize) -> std::io::Result<Vec<u8>> {
	let mut buf = vec![0u8; max];
	let mut total = 0;

	while total < max {
		let n = input.read(&mut buf[total..])?;
		if n == 0 {
			break;
		}
		total += n;
	}

	buf.truncate(total);
	Ok(buf)
}
