use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use log::{info, warn};
use protocol::{lower, window_slot, Flag, Mode, Packet, CHUNK_SIZE, WINDOW_SIZE};
use util::{ClientError, Result};

use crate::transport::Transport;

/// The download-side reorder buffer and output file. `written` is both the
/// cumulative byte count flushed to disk and the logical reference point for
/// lifting incoming wire seq numbers back to slot indices (§4.4/§4.5).
pub struct FileReceiver {
	conn_id: u32,
	slots: VecDeque<Option<Vec<u8>>>,
	written: u64,
	output: File,
}

impl FileReceiver {
	pub fn new(conn_id: u32, output_path: &Path) -> Result<Self> {
		let output = File::create(output_path)?;

		Ok(Self { conn_id, slots: VecDeque::from(vec![None; WINDOW_SIZE]), written: 0, output })
	}

	/// Runs the receive-ack-send loop until a FIN for this connection arrives.
	pub fn run(&mut self, transport: &Transport) -> Result<()> {
		info!("DOWNLOADING STARTED");

		loop {
			let packet = match transport.recv(None) {
				Ok(packet) => packet,
				Err(ClientError::MalformedPacket { reason, .. }) => {
					warn!("discarding malformed packet during download: {reason}");
					continue;
				}
				Err(err) => return Err(err),
			};

			if packet.conn_id != self.conn_id {
				continue;
			}

			match packet.flag {
				Flag::Fin if packet.is_valid_fin() => {
					transport.send(&Packet::fin(self.conn_id, packet.seq, Mode::Download));
					self.output.flush()?;
					info!("DOWNLOADING FINISHED");
					return Ok(());
				}
				Flag::Empty if (1..=CHUNK_SIZE).contains(&packet.data.len()) => {
					self.store(packet.seq, packet.data);
					self.drain()?;
					transport.send(&Packet::ack(self.conn_id, lower(self.written)));
				}
				_ => warn!("ignoring unexpected packet during download: {packet}"),
			}
		}
	}

	fn store(&mut self, wire_seq: u16, data: Vec<u8>) {
		let idx = window_slot(self.written, wire_seq);

		if idx >= WINDOW_SIZE {
			return; // outside the window: already acked or implausibly far ahead
		}

		if self.slots[idx].is_none() {
			self.slots[idx] = Some(data);
		}
		// else: duplicate of an already-buffered chunk, discard
	}

	fn drain(&mut self) -> io::Result<()> {
		while let Some(Some(_)) = self.slots.front() {
			let chunk = self.slots.pop_front().flatten().expect("checked Some above");
			self.output.write_all(&chunk)?;
			self.written += chunk.len() as u64;
			self.slots.push_back(None);
		}

		Ok(())
	}
}
