//! One request/response cycle per command.
//!
//! Every command owns a `Transceiver` that borrows the stream for the lifetime of
//! the command. Typed results are cleared before each cycle and only filled when
//! the cycle succeeds.

mod gpin;
mod gprm;
mod gsc2;
mod gscn;
mod gver;
mod scan;
mod sprm;

pub use self::gpin::GpinCommand;
pub use self::gprm::GprmCommand;
pub use self::gsc2::Gsc2Command;
pub use self::gscn::GscnCommand;
pub use self::gver::GverCommand;
pub use self::scan::ScanCommand;
pub use self::sprm::SprmCommand;

#[cfg(test)]
pub(crate) use self::gpin::tests::info_response;

use crate::base::error::{Error, Result};
use crate::base::frame::{read_word, CommandId, Frame, CRC_SIZE, FRAME_HEADER_SIZE};
use log::{trace, warn};
use std::io;

/// Builds a request frame with its parameter words in network byte order and a stamped CRC.
pub(crate) fn build_request(id: CommandId, words: &[i32]) -> Vec<u8> {
    let request = Frame::with_words(id, words).encode();
    trace!("Built request {:?}", request);
    request
}

/// Payload of a validated response: the bytes between header and CRC.
pub(crate) fn response_payload(response: &[u8]) -> &[u8] {
    if response.len() < FRAME_HEADER_SIZE + CRC_SIZE {
        return &[];
    }
    &response[FRAME_HEADER_SIZE..response.len() - CRC_SIZE]
}

/// Reads a NUL-terminated string of at most `max_len` bytes starting at `offset`.
pub(crate) fn read_c_string(bytes: &[u8], offset: usize, max_len: usize) -> String {
    let start = offset.min(bytes.len());
    let end = (start + max_len).min(bytes.len());
    let field = &bytes[start..end];
    let len = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..len]).into_owned()
}

/// Reads the response word at `index` (counting from the command ID) in front of the CRC.
pub(crate) fn response_word(response: &[u8], index: usize) -> Result<i32> {
    let words = &response[..response.len().saturating_sub(CRC_SIZE)];
    read_word(words, index).ok_or_else(|| Error::ProtocolError {
        description: format!(
            "response of {} bytes has no word {}",
            response.len(),
            index
        ),
    })
}

/// Copies a raw response to the data log. Failures are logged and otherwise ignored.
pub(crate) fn write_data_log(log: Option<&mut dyn io::Write>, response: &[u8]) {
    if let Some(log) = log {
        if let Err(e) = log.write_all(response).and_then(|_| log.flush()) {
            warn!("Failed to write data log: {}", e);
        }
    }
}
