pub mod driver;
pub mod handshake;
pub mod receiver;
pub mod sender;
pub mod transport;
