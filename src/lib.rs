//! # PS Demo
//!
//! `psdemo` is a control client for PS/KEM series laser scanners. It talks the
//! sensors' CRC-protected frame protocol over UDP or a serial line and offers
//! firmware version, parameter access, scan control and scan retrieval.
//!
//! Recorded data logs can be read back through `FileStream`.
//!
//! The `relay` module forwards frames between a serially connected sensor and a
//! network client, answering averaging scan requests (`GSC2`) on the sensor's behalf.

extern crate byteorder;
extern crate crc32fast;
extern crate log;
extern crate serialport;

mod answers;
pub mod base;
mod cmds;
pub mod commands;
pub mod crc;
mod internals;
pub mod parsers;
pub mod relay;
pub mod transport;

pub use crate::answers::*;
pub use crate::base::{DataStream, Error, ErrorId, Frame, Result};
pub use crate::cmds::*;
pub use crate::internals::*;
pub use crate::relay::{PulseWidthDivisor, Relay, RelayConfig, RelayStatistics};
pub use crate::transport::{FileStream, UartConfig, UartStream, UdpConfig, UdpStream};

use crate::commands::*;
use log::{error, trace, warn};
use std::io;

/// Control interface of one PS sensor.
///
/// `PsDevice` borrows an open `DataStream`; every method runs one command, i.e. one
/// request/response cycle, and returns its typed result.
///
/// # Example
/// ```ignore
/// # use psdemo::{DataStream, PsDevice, UdpConfig, UdpStream};
/// let mut stream = UdpStream::new(UdpConfig::default());
/// stream.open()?;
/// let mut device = PsDevice::new(&mut stream);
/// println!("{}", device.get_version()?);
/// ```
#[derive(Debug)]
pub struct PsDevice<'a, S: ?Sized> {
    stream: &'a mut S,
}

impl<'a, S> PsDevice<'a, S>
where
    S: DataStream + ?Sized,
{
    /// Constructs a new `PsDevice` on an open stream.
    ///
    /// # Arguments
    ///
    /// * `stream` - The stream connected to the sensor. It stays owned by the caller.
    pub fn new(stream: &'a mut S) -> PsDevice<'a, S> {
        trace!("Creating new PsDevice");
        PsDevice { stream }
    }

    /// Gets the firmware version string.
    pub fn get_version(&mut self) -> Result<String> {
        trace!("Getting firmware version");
        let mut cmd = GverCommand::new(&mut *self.stream);
        match cmd.perform() {
            Ok(()) => {
                trace!("Firmware version: {}", cmd.version());
                Ok(cmd.version().to_owned())
            }
            Err(e) => {
                error!("Error getting firmware version: {}", e);
                Err(e)
            }
        }
    }

    /// Gets the value of one parameter.
    ///
    /// # Arguments
    ///
    /// * `parameter_id` - ID of the parameter.
    pub fn get_parameter(&mut self, parameter_id: i32) -> Result<i32> {
        trace!("Getting parameter {}", parameter_id);
        let result = GprmCommand::new(&mut *self.stream).perform(parameter_id);
        if let Err(e) = &result {
            error!("Error getting parameter {}: {}", parameter_id, e);
        }
        result
    }

    /// Sets one parameter and returns the value the sensor applied.
    ///
    /// # Arguments
    ///
    /// * `parameter_id` - ID of the parameter.
    /// * `value` - The requested value.
    pub fn set_parameter(&mut self, parameter_id: i32, value: i32) -> Result<i32> {
        trace!("Setting parameter {} to {}", parameter_id, value);
        let result = SprmCommand::new(&mut *self.stream).perform(parameter_id, value);
        if let Err(e) = &result {
            error!("Error setting parameter {}: {}", parameter_id, e);
        }
        result
    }

    /// Gets value, limits and description of one parameter.
    ///
    /// An unknown parameter yields an info with `id == 0`.
    pub fn get_parameter_info(&mut self, parameter_id: i32) -> Result<ParameterInfo> {
        trace!("Getting info of parameter {}", parameter_id);
        let mut cmd = GpinCommand::new(&mut *self.stream);
        match cmd.perform(parameter_id) {
            Ok(info) => Ok(info.clone()),
            Err(e) => {
                error!("Error getting info of parameter {}: {}", parameter_id, e);
                Err(e)
            }
        }
    }

    /// Gets the info of all parameters, asking for IDs 1, 2, ... until the sensor
    /// no longer knows the ID or a request fails.
    ///
    /// Fails only if not even parameter 1 could be read.
    pub fn list_parameters(&mut self) -> Result<Vec<ParameterInfo>> {
        trace!("Listing parameters");
        let mut infos = Vec::new();
        for parameter_id in 1..=PS_MAX_PARAMETER_ID {
            match self.get_parameter_info(parameter_id) {
                Ok(info) if info.id != 0 => infos.push(info),
                Ok(_) => break,
                Err(e) if infos.is_empty() => return Err(e),
                Err(e) => {
                    warn!("Parameter list ends at {}: {}", parameter_id, e);
                    break;
                }
            }
        }
        trace!("Sensor has {} parameters", infos.len());
        Ok(infos)
    }

    /// Starts the measurement.
    pub fn start_scan(&mut self) -> Result<()> {
        trace!("Starting scan");
        self.scan_with_parameter(PS_SCAN_START)
    }

    /// Stops the measurement.
    pub fn stop_scan(&mut self) -> Result<()> {
        trace!("Stopping scan");
        self.scan_with_parameter(PS_SCAN_STOP)
    }

    /// Sends `SCAN` with an arbitrary parameter.
    pub fn scan_with_parameter(&mut self, parameter: i32) -> Result<()> {
        let mut cmd = ScanCommand::new(&mut *self.stream);
        cmd.set_parameter(parameter);
        let result = cmd.perform();
        if let Err(e) = &result {
            error!("Error sending SCAN {}: {}", parameter, e);
        }
        result
    }

    /// Gets one scan, `0` for the latest.
    pub fn get_scan(&mut self, scan_number: i32) -> Result<Scan> {
        let mut scan = Scan::new();
        self.get_scan_into(scan_number, &mut scan, None)?;
        Ok(scan)
    }

    /// Gets one scan into `scan`, copying the raw answer to `data_log`.
    pub fn get_scan_into(
        &mut self,
        scan_number: i32,
        scan: &mut Scan,
        data_log: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        trace!("Getting scan {}", scan_number);
        let result = GscnCommand::new(&mut *self.stream).perform_with_log(scan_number, scan, data_log);
        match &result {
            Ok(()) => trace!(
                "Got scan {} with {} points",
                scan.scan_number(),
                scan.number_of_points
            ),
            Err(e) => error!("Error getting scan {}: {}", scan_number, e),
        }
        result
    }

    /// Gets a scan averaged by the sensor over `scan_average` scans and `point_average` points.
    pub fn get_averaged_scan(&mut self, scan_average: i32, point_average: i32) -> Result<Scan> {
        let mut scan = Scan::new();
        self.get_averaged_scan_into(scan_average, point_average, &mut scan, None)?;
        Ok(scan)
    }

    /// Like `get_averaged_scan`, into `scan` and copying the raw answer to `data_log`.
    pub fn get_averaged_scan_into(
        &mut self,
        scan_average: i32,
        point_average: i32,
        scan: &mut Scan,
        data_log: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        trace!(
            "Getting scan averaged over {} scans and {} points",
            scan_average,
            point_average
        );
        let result = Gsc2Command::new(&mut *self.stream).perform_with_log(
            scan_average,
            point_average,
            scan,
            data_log,
        );
        if let Err(e) = &result {
            error!("Error getting averaged scan: {}", e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::frame::read_word;
    use crate::base::stream::mock::MockStream;
    use crate::parsers::scan_parser::tests::{parameters, scan_payload};

    fn version_response(text: &str) -> Vec<u8> {
        let mut payload = text.as_bytes().to_vec();
        payload.resize(16, 0);
        Frame::with_payload(PS_CMD_GET_VERSION, &payload).encode()
    }

    #[test]
    fn get_version_and_parameter() {
        let mut stream = MockStream::with_replies(vec![
            version_response("v1.2.3"),
            Frame::with_words(PS_CMD_GET_PARAMETER, &[5, 42]).encode(),
        ]);
        let mut device = PsDevice::new(&mut stream);
        assert_eq!(device.get_version().unwrap(), "v1.2.3");
        assert_eq!(device.get_parameter(5).unwrap(), 42);
    }

    #[test]
    fn bad_crc_fails_with_crc_error() {
        let mut response = Frame::with_words(PS_CMD_GET_PARAMETER, &[5, 42]).encode();
        response[12] ^= 0xFF;
        let mut stream = MockStream::with_replies(vec![response]);
        let mut device = PsDevice::new(&mut stream);
        assert_eq!(device.get_parameter(5).unwrap_err().id(), ErrorId::Crc);
    }

    #[test]
    fn list_parameters_stops_at_unknown_id() {
        let info = |id: i32, text: &str| {
            crate::commands::info_response(id, id * 10, 0, 100, text)
        };
        let mut stream = MockStream::with_replies(vec![
            info(1, "first"),
            info(2, "second"),
            info(0, ""),
        ]);
        let infos = {
            let mut device = PsDevice::new(&mut stream);
            device.list_parameters().unwrap()
        };
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[1].info, "second");
        assert_eq!(infos[1].value, 20);
        let asked: Vec<Option<i32>> = stream.written.iter().map(|r| read_word(r, 2)).collect();
        assert_eq!(asked, vec![Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn list_parameters_reports_failure_of_first_request() {
        let mut stream = MockStream::new();
        let mut device = PsDevice::new(&mut stream);
        assert_eq!(device.list_parameters().unwrap_err().id(), ErrorId::Timeout);
    }

    #[test]
    fn scan_control_and_retrieval() {
        let ack = Frame::with_words(PS_CMD_SCAN, &[0]).encode();
        let payload = scan_payload(&parameters(1, DataContent::Distances), 2, &[10, 20]);
        let mut stream = MockStream::with_replies(vec![
            ack.clone(),
            Frame::with_payload(PS_CMD_GET_SCAN, &payload).encode(),
            Frame::with_payload(PS_CMD_GET_SCAN, &payload).encode(),
            ack,
        ]);
        {
            let mut device = PsDevice::new(&mut stream);
            device.start_scan().unwrap();
            let scan = device.get_scan(0).unwrap();
            assert_eq!(scan.samples(1).unwrap()[0].distance, 20);
            let scan = device.get_averaged_scan(2, 3).unwrap();
            assert_eq!(scan.number_of_points, 2);
            device.stop_scan().unwrap();
        }
        let ids: Vec<&[u8]> = stream.written.iter().map(|r| &r[..4]).collect();
        assert_eq!(ids, vec![&b"SCAN"[..], &b"GSCN"[..], &b"GSC2"[..], &b"SCAN"[..]]);
        assert_eq!(read_word(&stream.written[3], 2), Some(0));
    }
}
