use crate::base::error::{Error, ErrorId, Result};
use crate::base::frame::{
    command_id, declared_frame_len, display_id, read_word, verify_crc, FRAME_OVERHEAD,
};
use crate::base::stream::DataStream;
use crate::cmds::{PS_ANS_ERROR, PS_ANS_WORD_ERROR_CODE};
use crate::internals::PS_MAX_FRAME_SIZE;
use log::{error, trace, warn};
use std::io;

/// Transceiver sends one request frame over a borrowed stream and validates the answer.
///
/// Every command owns one transceiver for a single request/response cycle. The
/// transceiver owns the response buffer; the stream stays with the caller.
///
/// # Examples
/// ```ignore
/// let mut transceiver = Transceiver::new(&mut stream);
/// let response = transceiver.send_command(&request)?;
/// ```
#[derive(Debug)]
pub struct Transceiver<'a, S: ?Sized> {
    stream: &'a mut S,
    response: Vec<u8>,
    received: usize,
}

impl<'a, S> Transceiver<'a, S>
where
    S: DataStream + ?Sized,
{
    /// Create a new `Transceiver` with the default response buffer size
    pub fn new(stream: &'a mut S) -> Transceiver<'a, S> {
        Transceiver::with_buffer_size(stream, PS_MAX_FRAME_SIZE)
    }

    /// Create a new `Transceiver` with a non-default response buffer size
    pub fn with_buffer_size(stream: &'a mut S, buffer_size: usize) -> Transceiver<'a, S> {
        trace!("Creating new Transceiver with buffer size {}", buffer_size);
        Transceiver {
            stream,
            response: vec![0; buffer_size],
            received: 0,
        }
    }

    /// Bytes of the last validated response, empty before the first successful cycle.
    pub fn response(&self) -> &[u8] {
        &self.response[..self.received]
    }

    /// Write a complete request frame to the stream
    pub fn write(&mut self, request: &[u8]) -> Result<usize> {
        trace!(
            "Transceiver write called: id={}, len={}",
            display_id(request),
            request.len()
        );
        let written = match self.stream.write(request) {
            Ok(written) => written,
            Err(Error::WriteFailed(e)) | Err(Error::IoError(e)) => {
                error!("Failed to write request: {}", e);
                return Err(Error::WriteFailed(e));
            }
            Err(e) => {
                error!("Failed to write request: {:?}", e);
                return Err(e);
            }
        };
        if written != request.len() {
            error!("Short write: {} of {} bytes", written, request.len());
            return Err(Error::WriteFailed(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("wrote {} of {} bytes", written, request.len()),
            )));
        }
        trace!("Wrote {} bytes", written);
        Ok(written)
    }

    /// Read one response frame from the stream into the response buffer
    ///
    /// A read that returns no data is reported as `Error::Timeout`.
    pub fn read(&mut self) -> Result<usize> {
        self.received = 0;
        trace!("Transceiver read called");
        let received = match self.stream.read(&mut self.response) {
            Ok(0) => {
                warn!("Stream read returned no data");
                return Err(Error::Timeout);
            }
            Ok(received) => received,
            Err(Error::Timeout) => {
                warn!("Timeout waiting for response");
                return Err(Error::Timeout);
            }
            Err(Error::ReadFailed(e)) | Err(Error::IoError(e)) => {
                error!("Failed to read response: {}", e);
                return Err(Error::ReadFailed(e));
            }
            Err(e) => {
                error!("Failed to read response: {:?}", e);
                return Err(e);
            }
        };
        trace!("Read {} bytes", received);
        Ok(received)
    }

    /// Send a request and wait for its response
    ///
    /// The response is checked for a valid CRC and for an error frame from the sensor.
    /// On success the validated response bytes are returned, still in network byte order.
    ///
    /// # Arguments
    ///
    /// * `request` - The complete request frame, CRC already stamped.
    pub fn send_command(&mut self, request: &[u8]) -> Result<&[u8]> {
        trace!(
            "Transceiver send_command called: id={}, len={}",
            display_id(request),
            request.len()
        );
        self.write(request)?;
        let received = self.read()?;
        let response = &self.response[..received];

        if received < FRAME_OVERHEAD {
            error!("Response of {} bytes is shorter than a frame", received);
            return Err(Error::ProtocolError {
                description: format!("response too short: {} bytes", received),
            });
        }
        if let Err(e) = verify_crc(response) {
            error!("Response {} failed CRC check: {}", display_id(response), e);
            return Err(e);
        }
        if declared_frame_len(response) != Some(received) {
            warn!(
                "Response {} declares {:?} bytes, received {}",
                display_id(response),
                declared_frame_len(response),
                received
            );
        }

        if command_id(response) == Some(PS_ANS_ERROR) {
            let code = read_word(response, PS_ANS_WORD_ERROR_CODE).ok_or_else(|| {
                Error::ProtocolError {
                    description: "error frame without error code".to_owned(),
                }
            })?;
            let id = ErrorId::from_code(code);
            if !id.is_success() {
                error!("Sensor answered with error frame: {}", id);
                return Err(Error::Device(id));
            }
            trace!("Error frame carries success code {}", code);
        }

        trace!(
            "Received response: id={}, len={}",
            display_id(response),
            received
        );
        self.received = received;
        Ok(&self.response[..received])
    }
}
