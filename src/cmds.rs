use crate::base::frame::CommandId;

// Commands without parameters

/// Command ID to request the firmware version string.
pub const PS_CMD_GET_VERSION: CommandId = *b"GVER";

// Commands with parameters

/// Command ID to read one sensor parameter. Request word: parameter ID.
pub const PS_CMD_GET_PARAMETER: CommandId = *b"GPRM";

/// Command ID to write one sensor parameter. Request words: parameter ID, new value.
pub const PS_CMD_SET_PARAMETER: CommandId = *b"SPRM";

/// Command ID to request value, limits and description of a parameter.
/// Request word: parameter ID.
pub const PS_CMD_GET_PARAMETER_INFO: CommandId = *b"GPIN";

/// Command ID to start or stop the measurement. Request word: 1 = start, 0 = stop,
/// other values are passed through to the firmware.
pub const PS_CMD_SCAN: CommandId = *b"SCAN";

/// Command ID to fetch one scan. Request word: scan number, 0 = latest.
pub const PS_CMD_GET_SCAN: CommandId = *b"GSCN";

/// Command ID to fetch an averaged scan. Request words: scan averaging count,
/// point averaging count.
pub const PS_CMD_GET_AVERAGED_SCAN: CommandId = *b"GSC2";

/// Command ID the sensor answers with when a request fails.
pub const PS_ANS_ERROR: CommandId = *b"ERR\0";

/// Request parameter of `SCAN` that starts the measurement.
pub const PS_SCAN_START: i32 = 1;

/// Request parameter of `SCAN` that stops the measurement.
pub const PS_SCAN_STOP: i32 = 0;

/// Scan number requesting the most recent scan.
pub const PS_SCAN_LATEST: i32 = 0;

// Word positions, counted from the command ID (word 0) and the length field (word 1)

/// First payload word of a request.
pub const PS_REQ_WORD_PARAM_1: usize = 2;

/// Second payload word of a request.
pub const PS_REQ_WORD_PARAM_2: usize = 3;

/// Error code of an `ERR` frame.
pub const PS_ANS_WORD_ERROR_CODE: usize = 2;

/// Parameter ID echoed in a `GPRM`/`SPRM` answer.
pub const PS_ANS_WORD_PARAMETER_ID: usize = 2;

/// Parameter value in a `GPRM`/`SPRM` answer.
pub const PS_ANS_WORD_PARAMETER_VALUE: usize = 3;

/// Parameter ID in a `GPIN` answer. Zero means the parameter does not exist.
pub const PS_ANS_WORD_INFO_ID: usize = 2;

/// Current value in a `GPIN` answer.
pub const PS_ANS_WORD_INFO_VALUE: usize = 4;

/// Minimum value in a `GPIN` answer.
pub const PS_ANS_WORD_INFO_MIN: usize = 5;

/// Maximum value in a `GPIN` answer.
pub const PS_ANS_WORD_INFO_MAX: usize = 6;

/// Byte offset of the description string in a `GPIN` answer.
pub const PS_ANS_INFO_TEXT_OFFSET: usize = 32;

/// Maximum length of the `GPIN` description string.
pub const PS_ANS_INFO_TEXT_SIZE: usize = 128;

/// Byte offset of the version string in a `GVER` answer.
pub const PS_ANS_VERSION_OFFSET: usize = 8;

/// Maximum length of the `GVER` version string.
pub const PS_ANS_VERSION_SIZE: usize = 1024;

/// Byte offset of the scan parameter block in a `GSCN` answer.
pub const PS_ANS_SCAN_OFFSET: usize = 8;
