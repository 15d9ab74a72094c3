//! Scenario 6: a 4-chunk window (255/255/255/100 bytes) where the server acks
//! only the first chunk, forcing a go-back-N resend of the remaining three,
//! before the transfer completes with a matching FIN exchange.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use client::sender::FileSender;
use client::transport::Transport;
use protocol::{Flag, Mode, Packet};
use tempfile::NamedTempFile;

#[test]
fn go_back_n_retransmits_unacked_chunks_then_finishes() {
	let mut file = NamedTempFile::new().unwrap();
	file.write_all(&vec![0x7au8; 865]).unwrap();

	let (client_side, server_side) = Transport::loopback_pair().unwrap();
	let sender = Arc::new(FileSender::new(42, Arc::new(client_side), file.path()).unwrap());

	let upload = thread::spawn(move || sender.run());

	let first_round: Vec<u16> =
		(0..4).map(|_| server_side.recv(Some(Duration::from_secs(1))).unwrap().seq).collect();
	assert_eq!(first_round, vec![0, 255, 510, 765]);

	server_side.send(&Packet::ack(42, 255));

	let second_round: Vec<u16> =
		(0..3).map(|_| server_side.recv(Some(Duration::from_millis(500))).unwrap().seq).collect();
	assert_eq!(second_round, vec![255, 510, 765]);

	server_side.send(&Packet::ack(42, 865));

	let fin = server_side.recv(Some(Duration::from_secs(1))).unwrap();
	assert_eq!(fin.flag, Flag::Fin);
	assert_eq!(fin.seq, 865);

	server_side.send(&Packet::fin(42, fin.seq, Mode::Upload));

	upload.join().unwrap().unwrap();
}
