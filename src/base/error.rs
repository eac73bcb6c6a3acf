use std::error;
use std::fmt;
use std::io;

/// Base of the negative error codes shared with the sensor firmware.
pub const ERROR_BASE: i32 = 2000;

/// Number of codes counted down from `-ERROR_BASE`.
const ERROR_ID_COUNT: i32 = 22;

/// Lowest code that is still outside the table (exclusive lower bound).
const LAST_ERROR: i32 = -ERROR_BASE - ERROR_ID_COUNT;

/// Error identification numbers used on the wire and as process exit codes.
///
/// `0` and positive numbers always mean "no error". The negative codes are
/// numbered from the tail: `Io` is `-ERROR_BASE`, every kind above it is one less.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorId {
    /// The function was successful.
    Success,
    /// System not ready.
    SystemNotReady,
    /// Front screen dirty or wet.
    FrontScreenNotClear,
    /// Temperature out of operating range.
    TemperatureOutOfRange,
    /// Angle encoder or motor unit failure.
    ScanUnitFailure,
    /// Measurement unit failure.
    SensorUnitFailure,
    /// Serialization version does not match.
    SerialVersion,
    /// Invalid or defective system configuration.
    ConfigurationError,
    /// Fatal system error.
    FatalSystemError,
    /// Internal buffer overflow.
    BufferOverflow,
    /// Array index is out of range.
    IndexOutOfRange,
    /// Division by zero.
    DivisionByZero,
    /// Invalid handle or bad address.
    InvalidHandle,
    /// Function not supported.
    UnsupportedFunction,
    /// Access or permission denied.
    AccessDenied,
    /// Parameter is out of range.
    InvalidParameter,
    /// Unknown command.
    UnknownCommand,
    /// CRC checksum error.
    Crc,
    /// User break.
    UserBreak,
    /// Timeout expired.
    Timeout,
    /// Cannot write.
    Write,
    /// Cannot read.
    Read,
    /// Physical I/O error.
    Io,
}

/// Table order of the negative codes, starting right above `LAST_ERROR`.
const ERROR_TABLE: [ErrorId; ERROR_ID_COUNT as usize] = [
    ErrorId::SystemNotReady,
    ErrorId::FrontScreenNotClear,
    ErrorId::TemperatureOutOfRange,
    ErrorId::ScanUnitFailure,
    ErrorId::SensorUnitFailure,
    ErrorId::SerialVersion,
    ErrorId::ConfigurationError,
    ErrorId::FatalSystemError,
    ErrorId::BufferOverflow,
    ErrorId::IndexOutOfRange,
    ErrorId::DivisionByZero,
    ErrorId::InvalidHandle,
    ErrorId::UnsupportedFunction,
    ErrorId::AccessDenied,
    ErrorId::InvalidParameter,
    ErrorId::UnknownCommand,
    ErrorId::Crc,
    ErrorId::UserBreak,
    ErrorId::Timeout,
    ErrorId::Write,
    ErrorId::Read,
    ErrorId::Io,
];

impl ErrorId {
    /// Converts an integer received from the sensor into an `ErrorId`.
    ///
    /// Non-negative values map to `Success`, negative values outside the known
    /// range map to `InvalidHandle`.
    pub fn from_code(code: i32) -> ErrorId {
        if code >= 0 {
            ErrorId::Success
        } else if code > LAST_ERROR && code <= -ERROR_BASE {
            ERROR_TABLE[(code - LAST_ERROR - 1) as usize]
        } else {
            ErrorId::InvalidHandle
        }
    }

    /// Returns the wire code of this error kind.
    pub fn code(self) -> i32 {
        match ERROR_TABLE.iter().position(|id| *id == self) {
            Some(index) => LAST_ERROR + 1 + index as i32,
            None => 0,
        }
    }

    /// Returns `true` for `Success`.
    #[inline]
    pub fn is_success(self) -> bool {
        self == ErrorId::Success
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorId::Success => "success",
            ErrorId::SystemNotReady => "system not ready",
            ErrorId::FrontScreenNotClear => "front screen dirty or wet",
            ErrorId::TemperatureOutOfRange => "temperature out of operating range",
            ErrorId::ScanUnitFailure => "angle encoder or motor unit failure",
            ErrorId::SensorUnitFailure => "measurement unit failure",
            ErrorId::SerialVersion => "serialization version mismatch",
            ErrorId::ConfigurationError => "invalid system configuration",
            ErrorId::FatalSystemError => "fatal system error",
            ErrorId::BufferOverflow => "buffer overflow",
            ErrorId::IndexOutOfRange => "index out of range",
            ErrorId::DivisionByZero => "division by zero",
            ErrorId::InvalidHandle => "invalid handle",
            ErrorId::UnsupportedFunction => "function not supported",
            ErrorId::AccessDenied => "access denied",
            ErrorId::InvalidParameter => "invalid parameter",
            ErrorId::UnknownCommand => "unknown command",
            ErrorId::Crc => "CRC checksum error",
            ErrorId::UserBreak => "user break",
            ErrorId::Timeout => "timeout expired",
            ErrorId::Write => "cannot write",
            ErrorId::Read => "cannot read",
            ErrorId::Io => "physical I/O error",
        };
        write!(f, "{} ({})", text, self.code())
    }
}

/// Represents errors that can occur while talking to a PS sensor.
#[derive(Debug)]
pub enum Error {
    /// The sensor answered with an `ERR` frame carrying this error kind.
    Device(ErrorId),

    /// The CRC trailer of a received frame does not match its content.
    CrcMismatch { received: u32, calculated: u32 },

    /// Writing a request to the stream failed.
    WriteFailed(io::Error),

    /// Reading a response from the stream failed.
    ReadFailed(io::Error),

    /// No data arrived before the configured timeout expired.
    Timeout,

    /// A count received from the sensor exceeds the fixed capacity of this client.
    BufferOverflow { description: String },

    /// A word index lies outside the frame.
    IndexOutOfRange(usize),

    /// A caller supplied an argument that cannot be encoded.
    InvalidParameter { description: String },

    /// The received data is invalid according to the PS protocol.
    ProtocolError { description: String },

    /// The stream is not open or cannot be configured.
    InvalidHandle { description: String },

    /// The operation was interrupted by the user.
    UserBreak,

    /// An I/O error occurred outside of a read or write of a frame.
    IoError(io::Error),
}

impl Error {
    /// Maps this error onto the sensor error taxonomy.
    pub fn id(&self) -> ErrorId {
        match self {
            Error::Device(id) => *id,
            Error::CrcMismatch { .. } => ErrorId::Crc,
            Error::WriteFailed(_) => ErrorId::Write,
            Error::ReadFailed(_) => ErrorId::Read,
            Error::Timeout => ErrorId::Timeout,
            Error::BufferOverflow { .. } => ErrorId::BufferOverflow,
            Error::IndexOutOfRange(_) => ErrorId::IndexOutOfRange,
            Error::InvalidParameter { .. } => ErrorId::InvalidParameter,
            Error::ProtocolError { .. } => ErrorId::UnknownCommand,
            Error::InvalidHandle { .. } => ErrorId::InvalidHandle,
            Error::UserBreak => ErrorId::UserBreak,
            Error::IoError(_) => ErrorId::Io,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Device(id) => write!(f, "sensor error: {}", id),
            Error::CrcMismatch {
                received,
                calculated,
            } => write!(
                f,
                "crc mismatch: received {:08X}, calculated {:08X}",
                received, calculated
            ),
            Error::WriteFailed(err) => write!(f, "write failed: {}", err),
            Error::ReadFailed(err) => write!(f, "read failed: {}", err),
            Error::Timeout => write!(f, "operation timeout"),
            Error::BufferOverflow { description } => write!(f, "buffer overflow: {}", description),
            Error::IndexOutOfRange(index) => write!(f, "word index {} out of range", index),
            Error::InvalidParameter { description } => {
                write!(f, "invalid parameter: {}", description)
            }
            Error::ProtocolError { description } => write!(f, "protocol error: {}", description),
            Error::InvalidHandle { description } => write!(f, "invalid handle: {}", description),
            Error::UserBreak => write!(f, "user break"),
            Error::IoError(err) => write!(f, "io error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::WriteFailed(err) | Error::ReadFailed(err) | Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<ErrorId> for Error {
    fn from(id: ErrorId) -> Self {
        Error::Device(id)
    }
}

/// A specialized `Result` type for PS sensor operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_table_order() {
        assert_eq!(ErrorId::Io.code(), -2000);
        assert_eq!(ErrorId::Read.code(), -2001);
        assert_eq!(ErrorId::Crc.code(), -2005);
        assert_eq!(ErrorId::SystemNotReady.code(), -2021);
        assert_eq!(ErrorId::Success.code(), 0);
    }

    #[test]
    fn from_code_round_trips_every_kind() {
        for id in ERROR_TABLE.iter() {
            assert_eq!(ErrorId::from_code(id.code()), *id);
        }
    }

    #[test]
    fn from_code_handles_out_of_range_values() {
        assert_eq!(ErrorId::from_code(0), ErrorId::Success);
        assert_eq!(ErrorId::from_code(42), ErrorId::Success);
        assert_eq!(ErrorId::from_code(-1), ErrorId::InvalidHandle);
        assert_eq!(ErrorId::from_code(-1999), ErrorId::InvalidHandle);
        assert_eq!(ErrorId::from_code(-2022), ErrorId::InvalidHandle);
        assert_eq!(ErrorId::from_code(i32::MIN), ErrorId::InvalidHandle);
    }

    #[test]
    fn errors_map_onto_taxonomy() {
        assert_eq!(Error::Timeout.id(), ErrorId::Timeout);
        assert_eq!(
            Error::CrcMismatch {
                received: 1,
                calculated: 2
            }
            .id(),
            ErrorId::Crc
        );
        assert_eq!(
            Error::Device(ErrorId::AccessDenied).id(),
            ErrorId::AccessDenied
        );
        let write = Error::WriteFailed(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(write.id(), ErrorId::Write);
    }
}
