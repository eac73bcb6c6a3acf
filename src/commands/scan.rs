use crate::base::error::Result;
use crate::base::stream::DataStream;
use crate::base::Transceiver;
use crate::cmds::{PS_CMD_SCAN, PS_SCAN_START, PS_SCAN_STOP};
use crate::commands::build_request;
use log::trace;

/// Starts or stops the measurement.
#[derive(Debug)]
pub struct ScanCommand<'a, S: ?Sized> {
    transceiver: Transceiver<'a, S>,
    parameter: i32,
}

impl<'a, S: DataStream + ?Sized> ScanCommand<'a, S> {
    /// Creates a `SCAN` command that starts the measurement unless `set_parameter` changes it.
    pub fn new(stream: &'a mut S) -> ScanCommand<'a, S> {
        ScanCommand {
            transceiver: Transceiver::new(stream),
            parameter: PS_SCAN_START,
        }
    }

    /// Sets the request parameter: 1 starts, 0 stops, other values go to the firmware as is.
    pub fn set_parameter(&mut self, parameter: i32) {
        self.parameter = parameter;
    }

    pub fn parameter(&self) -> i32 {
        self.parameter
    }

    /// Performs one `SCAN` cycle with the current parameter.
    pub fn perform(&mut self) -> Result<()> {
        trace!("SCAN with parameter {}", self.parameter);
        let request = build_request(PS_CMD_SCAN, &[self.parameter]);
        self.transceiver.send_command(&request)?;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.set_parameter(PS_SCAN_START);
        self.perform()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.set_parameter(PS_SCAN_STOP);
        self.perform()
    }
}
