use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;

use protocol::Mode;
use util::{ClientError, Result};

use crate::handshake;
use crate::receiver::FileReceiver;
use crate::sender::FileSender;
use crate::transport::{Transport, PORT};

/// Fixed output path for a DOWNLOAD, overwritten on every run (§6).
pub const DOWNLOAD_OUTPUT: &str = "foto.png";

/// Resolves the host, runs the handshake, and drives a DOWNLOAD to completion:
/// `foto.png` in the working directory, truncated if it already exists.
pub fn run_download(host: &str) -> Result<()> {
	let remote = resolve(host)?;
	let transport = Transport::connect(remote)?;

	let conn_id = handshake::run(&transport, Mode::Download)?;

	let mut receiver = FileReceiver::new(conn_id, Path::new(DOWNLOAD_OUTPUT))?;
	receiver.run(&transport)
}

/// Resolves the host, runs the handshake, and drives an UPLOAD of `file_path`
/// to completion. The transport is shared between the ack-receiver and
/// retransmit-ticker threads spawned by `FileSender::run` (§5, §9).
pub fn run_upload(host: &str, file_path: &Path) -> Result<()> {
	let remote = resolve(host)?;
	let transport = Arc::new(Transport::connect(remote)?);

	let conn_id = handshake::run(&transport, Mode::Upload)?;

	let sender = Arc::new(FileSender::new(conn_id, Arc::clone(&transport), file_path)?);
	sender.run()
}

fn resolve(host: &str) -> Result<SocketAddr> {
	(host, PORT)
		.to_socket_addrs()?
		.next()
		.ok_or_else(|| ClientError::Io(io::Error::new(io::ErrorKind::NotFound, format!("could not resolve {host}"))))
}
