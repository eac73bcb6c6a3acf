use crate::base::error::Result;
use crate::base::stream::DataStream;
use crate::base::Transceiver;
use crate::cmds::{PS_ANS_WORD_PARAMETER_VALUE, PS_CMD_GET_PARAMETER};
use crate::commands::{build_request, response_word};
use log::trace;

/// Reads one sensor parameter.
#[derive(Debug)]
pub struct GprmCommand<'a, S: ?Sized> {
    transceiver: Transceiver<'a, S>,
    value: i32,
}

impl<'a, S: DataStream + ?Sized> GprmCommand<'a, S> {
    pub fn new(stream: &'a mut S) -> GprmCommand<'a, S> {
        GprmCommand {
            transceiver: Transceiver::new(stream),
            value: 0,
        }
    }

    /// Performs one `GPRM` cycle and returns the parameter value.
    ///
    /// # Arguments
    ///
    /// * `parameter_id` - ID of the parameter to read.
    pub fn perform(&mut self, parameter_id: i32) -> Result<i32> {
        self.value = 0;
        let request = build_request(PS_CMD_GET_PARAMETER, &[parameter_id]);
        let response = self.transceiver.send_command(&request)?;
        let value = response_word(response, PS_ANS_WORD_PARAMETER_VALUE)?;
        trace!("Parameter {} = {}", parameter_id, value);
        self.value = value;
        Ok(value)
    }

    /// Value of the last successful cycle, 0 otherwise.
    pub fn value(&self) -> i32 {
        self.value
    }
}
