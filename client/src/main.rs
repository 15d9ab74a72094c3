use std::path::PathBuf;
use std::process::ExitCode;

use client::driver;

fn main() -> ExitCode {
	util::install_logger();

	let args: Vec<String> = std::env::args().skip(1).collect();

	let result = match args.as_slice() {
		[host] => driver::run_download(host),
		[host, file] => driver::run_upload(host, &PathBuf::from(file)),
		_ => {
			eprintln!("usage: robot-client <host> [file]");
			return ExitCode::SUCCESS;
		}
	};

	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			log::error!("{err}");
			ExitCode::FAILURE
		}
	}
}
