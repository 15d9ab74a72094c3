use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

/// Size of the fixed packet header: `conn_id`(4) + `seq`(2) + `ack`(2) + `flag`(1).
pub const HEADER_LEN: usize = 9;
/// Largest payload a single chunk may carry.
pub const CHUNK_SIZE: usize = 255;
/// Largest datagram the protocol ever produces (header + one full chunk).
pub const MAX_DATAGRAM: usize = HEADER_LEN + CHUNK_SIZE;
/// Number of in-flight chunks the sliding window holds on either side.
pub const WINDOW_SIZE: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
	#[error("datagram too short: {0} bytes (need at least {HEADER_LEN})")]
	TooShort(usize),
	#[error("unrecognized flag byte 0x{byte:02x} (connId={conn_id:#010x})")]
	BadFlag { conn_id: u32, byte: u8 },
}

/// The single flag bit set on a packet, or none (`Empty`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flag {
	Empty = 0x00,
	Rst = 0x01,
	Fin = 0x02,
	Syn = 0x04,
}

impl Flag {
	fn from_byte(conn_id: u32, b: u8) -> Result<Self, DecodeError> {
		match b {
			0x00 => Ok(Flag::Empty),
			0x01 => Ok(Flag::Rst),
			0x02 => Ok(Flag::Fin),
			0x04 => Ok(Flag::Syn),
			byte => Err(DecodeError::BadFlag { conn_id, byte }),
		}
	}
}

impl fmt::Display for Flag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Flag::Empty => "EMPTY",
			Flag::Rst => "RST",
			Flag::Fin => "FIN",
			Flag::Syn => "SYN",
		})
	}
}

/// The direction requested in a SYN's one-byte payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
	Download = 0x01,
	Upload = 0x02,
}

/// The on-wire packet: a 9-byte header plus 0..=255 bytes of payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
	pub conn_id: u32,
	pub seq: u16,
	pub ack: u16,
	pub flag: Flag,
	pub data: Vec<u8>,
}

impl Packet {
	/// The opening SYN: `conn_id=0`, one-byte mode selector as payload.
	pub fn initial(mode: Mode) -> Self {
		Self { conn_id: 0, seq: 0, ack: 0, flag: Flag::Syn, data: vec![mode as u8] }
	}

	/// A data chunk at logical offset `seq` (wire-truncated by the caller).
	pub fn data(conn_id: u32, seq: u16, payload: Vec<u8>) -> Self {
		Self { conn_id, seq, ack: 0, flag: Flag::Empty, data: payload }
	}

	/// A cumulative ack: bytes-written-so-far, wire-truncated.
	pub fn ack(conn_id: u32, ack: u16) -> Self {
		Self { conn_id, seq: 0, ack, flag: Flag::Empty, data: Vec::new() }
	}

	/// Graceful close. Which field carries the final offset depends on mode:
	/// DOWNLOAD echoes the peer's FIN `seq` back in `ack`; UPLOAD reports its own
	/// final byte offset in `seq`. See SPEC_FULL.md's Open Question on this field.
	pub fn fin(conn_id: u32, last_seq: u16, mode: Mode) -> Self {
		match mode {
			Mode::Download => Self { conn_id, seq: 0, ack: last_seq, flag: Flag::Fin, data: Vec::new() },
			Mode::Upload => Self { conn_id, seq: last_seq, ack: 0, flag: Flag::Fin, data: Vec::new() },
		}
	}

	/// Abort a connection (or reject an unrecognized one, with `conn_id` echoed).
	pub fn rst(conn_id: u32) -> Self {
		Self { conn_id, seq: 0, ack: 0, flag: Flag::Rst, data: Vec::new() }
	}

	/// Whether this packet is a valid response to an `initial` SYN. The mode byte
	/// echoed in `data` is not compared against the one requested (permissive, per
	/// the source's own behavior).
	pub fn is_valid_initial_response(&self) -> bool {
		self.conn_id != 0 && self.flag == Flag::Syn && self.seq == 0 && self.data.len() == 1
	}

	/// A FIN packet must never carry a payload.
	pub fn is_valid_fin(&self) -> bool {
		self.flag == Flag::Fin && self.data.is_empty()
	}

	pub fn encode(&self) -> Vec<u8> {
		let mut buf = vec![0u8; HEADER_LEN + self.data.len()];
		BigEndian::write_u32(&mut buf[0..4], self.conn_id);
		BigEndian::write_u16(&mut buf[4..6], self.seq);
		BigEndian::write_u16(&mut buf[6..8], self.ack);
		buf[8] = self.flag as u8;
		buf[HEADER_LEN..].copy_from_slice(&self.data);
		buf
	}

	pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
		if buf.len() < HEADER_LEN {
			return Err(DecodeError::TooShort(buf.len()));
		}

		let conn_id = BigEndian::read_u32(&buf[0..4]);
		let seq = BigEndian::read_u16(&buf[4..6]);
		let ack = BigEndian::read_u16(&buf[6..8]);
		let flag = Flag::from_byte(conn_id, buf[8])?;
		let data = buf[HEADER_LEN..].to_vec();

		Ok(Self { conn_id, seq, ack, flag, data })
	}
}

impl fmt::Display for Packet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "connId={:#010x} seq={} ack={} flag={} data=", self.conn_id, self.seq, self.ack, self.flag)?;
		for byte in &self.data {
			write!(f, "{byte:02x}")?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_every_packet_shape() {
		let shapes = [
			Packet::initial(Mode::Download),
			Packet::initial(Mode::Upload),
			Packet::data(0x1234_5678, 500, vec![1, 2, 3, 4, 5]),
			Packet::data(1, 0, Vec::new()),
			Packet::ack(7, 65535),
			Packet::fin(7, 2040, Mode::Download),
			Packet::fin(7, 865, Mode::Upload),
			Packet::rst(0),
			Packet::rst(42),
		];

		for p in shapes {
			let encoded = p.encode();
			let decoded = Packet::decode(&encoded).expect("valid packet decodes");
			assert_eq!(decoded, p);
		}
	}

	#[test]
	fn round_trips_max_size_chunk() {
		let p = Packet::data(1, 65000, vec![0xab; CHUNK_SIZE]);
		let encoded = p.encode();
		assert_eq!(encoded.len(), MAX_DATAGRAM);
		assert_eq!(Packet::decode(&encoded).unwrap(), p);
	}

	#[test]
	fn rejects_short_datagrams() {
		for len in 0..HEADER_LEN {
			assert_eq!(Packet::decode(&vec![0u8; len]), Err(DecodeError::TooShort(len)));
		}
	}

	#[test]
	fn rejects_unknown_flag_combinations() {
		let mut buf = vec![0u8; HEADER_LEN];
		buf[8] = 0x03; // RST | FIN, not a singleton
		assert_eq!(Packet::decode(&buf), Err(DecodeError::BadFlag { conn_id: 0, byte: 0x03 }));

		BigEndian::write_u32(&mut buf[0..4], 0x42);
		buf[8] = 0x08;
		assert_eq!(Packet::decode(&buf), Err(DecodeError::BadFlag { conn_id: 0x42, byte: 0x08 }));
	}

	#[test]
	fn initial_response_validation() {
		let mut good = Packet::initial(Mode::Download);
		good.conn_id = 0x1234_5678;
		assert!(good.is_valid_initial_response());

		let mut no_id = Packet::initial(Mode::Download);
		no_id.conn_id = 0;
		assert!(!no_id.is_valid_initial_response());

		let mut wrong_seq = good.clone();
		wrong_seq.seq = 1;
		assert!(!wrong_seq.is_valid_initial_response());

		let mut wrong_len = good.clone();
		wrong_len.data.push(0xff);
		assert!(!wrong_len.is_valid_initial_response());

		// Permissive: the echoed mode byte is never checked against what was sent.
		let mut swapped_mode = good.clone();
		swapped_mode.data = vec![Mode::Upload as u8];
		assert!(swapped_mode.is_valid_initial_response());
	}

	#[test]
	fn fin_must_be_empty() {
		let fin = Packet::fin(1, 10, Mode::Download);
		assert!(fin.is_valid_fin());

		let mut bad = fin;
		bad.data.push(0);
		assert!(!bad.is_valid_fin());
	}
}
