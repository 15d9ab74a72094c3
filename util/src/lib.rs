mod error;
mod logger;

pub use error::{ClientError, Result};
pub use logger::install as install_logger;
