//! Concrete byte streams to reach a sensor.

mod file;
mod uart;
mod udp;

pub use self::file::FileStream;
pub use self::uart::{is_supported_baud_rate, UartConfig, UartStream, SUPPORTED_BAUD_RATES};
pub use self::udp::{UdpConfig, UdpStream};
