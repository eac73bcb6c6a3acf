use crate::base::error::Result;
use crate::base::stream::DataStream;
use crate::base::Transceiver;
use crate::cmds::{PS_ANS_VERSION_OFFSET, PS_ANS_VERSION_SIZE, PS_CMD_GET_VERSION};
use crate::commands::{build_request, read_c_string};
use log::trace;

/// Reads the firmware version string.
#[derive(Debug)]
pub struct GverCommand<'a, S: ?Sized> {
    transceiver: Transceiver<'a, S>,
    version: String,
}

impl<'a, S: DataStream + ?Sized> GverCommand<'a, S> {
    pub fn new(stream: &'a mut S) -> GverCommand<'a, S> {
        GverCommand {
            transceiver: Transceiver::new(stream),
            version: String::new(),
        }
    }

    /// Performs one `GVER` cycle. The version string is cleared on failure.
    pub fn perform(&mut self) -> Result<()> {
        self.version.clear();
        let request = build_request(PS_CMD_GET_VERSION, &[]);
        let response = self.transceiver.send_command(&request)?;
        // the string ends at the first NUL, at the latest in front of the CRC
        let text_end = response.len().saturating_sub(crate::base::frame::CRC_SIZE);
        self.version = read_c_string(
            &response[..text_end],
            PS_ANS_VERSION_OFFSET,
            PS_ANS_VERSION_SIZE,
        );
        trace!("Firmware version: {}", self.version);
        Ok(())
    }

    /// Version string of the last successful cycle.
    pub fn version(&self) -> &str {
        &self.version
    }
}
