use crate::answers::ParameterInfo;
use crate::base::error::Result;
use crate::base::stream::DataStream;
use crate::base::Transceiver;
use crate::cmds::*;
use crate::commands::{build_request, read_c_string, response_word};
use log::trace;

/// Reads value, limits and description of one sensor parameter.
#[derive(Debug)]
pub struct GpinCommand<'a, S: ?Sized> {
    transceiver: Transceiver<'a, S>,
    info: ParameterInfo,
}

impl<'a, S: DataStream + ?Sized> GpinCommand<'a, S> {
    pub fn new(stream: &'a mut S) -> GpinCommand<'a, S> {
        GpinCommand {
            transceiver: Transceiver::new(stream),
            info: ParameterInfo::default(),
        }
    }

    /// Performs one `GPIN` cycle.
    ///
    /// A sensor that does not know the parameter answers with parameter ID 0; the
    /// cycle then succeeds and the returned info stays empty (`id == 0`).
    ///
    /// # Arguments
    ///
    /// * `parameter_id` - ID of the parameter to describe.
    pub fn perform(&mut self, parameter_id: i32) -> Result<&ParameterInfo> {
        self.info = ParameterInfo::default();
        let request = build_request(PS_CMD_GET_PARAMETER_INFO, &[parameter_id]);
        let response = self.transceiver.send_command(&request)?;

        let id = response_word(response, PS_ANS_WORD_INFO_ID)?;
        if id == 0 {
            trace!("Sensor does not know parameter {}", parameter_id);
            return Ok(&self.info);
        }
        let info = ParameterInfo {
            id,
            value: response_word(response, PS_ANS_WORD_INFO_VALUE)?,
            min: response_word(response, PS_ANS_WORD_INFO_MIN)?,
            max: response_word(response, PS_ANS_WORD_INFO_MAX)?,
            // the text is plain bytes, never byte swapped
            info: read_c_string(
                super::response_payload(response),
                PS_ANS_INFO_TEXT_OFFSET - crate::base::frame::FRAME_HEADER_SIZE,
                PS_ANS_INFO_TEXT_SIZE,
            ),
        };
        trace!("Parameter info: {:?}", info);
        self.info = info;
        Ok(&self.info)
    }

    /// Info of the last cycle, empty when it failed.
    pub fn info(&self) -> &ParameterInfo {
        &self.info
    }
}
