use crate::base::error::Result;
use crate::base::stream::DataStream;
use crate::base::Transceiver;
use crate::cmds::{PS_ANS_WORD_PARAMETER_VALUE, PS_CMD_SET_PARAMETER};
use crate::commands::{build_request, response_word};
use log::{trace, warn};

/// Writes one sensor parameter and reports the value the sensor actually applied.
#[derive(Debug)]
pub struct SprmCommand<'a, S: ?Sized> {
    transceiver: Transceiver<'a, S>,
    value: i32,
}

impl<'a, S: DataStream + ?Sized> SprmCommand<'a, S> {
    pub fn new(stream: &'a mut S) -> SprmCommand<'a, S> {
        SprmCommand {
            transceiver: Transceiver::new(stream),
            value: 0,
        }
    }

    /// Performs one `SPRM` cycle.
    ///
    /// Returns the value set by the sensor, which may differ from `value` when the
    /// sensor limits it.
    ///
    /// # Arguments
    ///
    /// * `parameter_id` - ID of the parameter to write.
    /// * `value` - The requested value.
    pub fn perform(&mut self, parameter_id: i32, value: i32) -> Result<i32> {
        self.value = 0;
        let request = build_request(PS_CMD_SET_PARAMETER, &[parameter_id, value]);
        let response = self.transceiver.send_command(&request)?;
        let actual = response_word(response, PS_ANS_WORD_PARAMETER_VALUE)?;
        if actual != value {
            warn!(
                "Parameter {}: requested {}, sensor set {}",
                parameter_id, value, actual
            );
        } else {
            trace!("Parameter {} set to {}", parameter_id, actual);
        }
        self.value = actual;
        Ok(actual)
    }

    /// Value actually set by the last successful cycle, 0 otherwise.
    pub fn value(&self) -> i32 {
        self.value
    }
}
