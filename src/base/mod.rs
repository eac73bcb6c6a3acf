pub mod error;
pub mod frame;
pub mod stream;
mod transceiver;

pub use self::error::{Error, ErrorId, Result};
pub use self::frame::{CommandId, Frame};
pub use self::stream::DataStream;
pub use self::transceiver::Transceiver;
