mod packet;
mod seq;

pub use packet::{DecodeError, Flag, Mode, Packet, CHUNK_SIZE, HEADER_LEN, MAX_DATAGRAM, WINDOW_SIZE};
pub use seq::{lift, lower, window_slot};
