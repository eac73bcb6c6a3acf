use std::time::Duration;

/// Default timeout for waiting for a response from the sensor.
pub const PS_DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout of one relay poll on either stream.
pub const PS_DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Size of the response buffer every command and the relay read into.
pub const PS_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Largest frame the serial read loop accepts.
pub const PS_MAX_UART_FRAME_SIZE: usize = 8 * 1024;

/// Number of empty reads after which the serial read loop gives up when no timeout is set.
pub const PS_UART_MAX_EMPTY_READS: usize = 100;

/// Default UDP port of the sensor.
pub const PS_DEFAULT_SENSOR_PORT: u16 = 1024;

/// Default local UDP port of the client.
pub const PS_DEFAULT_LOCAL_PORT: u16 = 1025;

/// Default baud rate of the serial link.
pub const PS_DEFAULT_BAUD_RATE: u32 = 115_200;

/// Maximum number of raw scans the relay buffers for one averaged scan.
pub const PS_MAX_AVERAGED_SCANS: usize = 10;

/// Default IP address of the sensor.
pub const PS_DEFAULT_SENSOR_ADDRESS: std::net::Ipv4Addr = std::net::Ipv4Addr::new(10, 0, 8, 86);

/// Serial read timeout used between polls when no timeout is configured.
pub const PS_UART_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Highest parameter ID `list_parameters` asks for.
pub const PS_MAX_PARAMETER_ID: i32 = 1024;
