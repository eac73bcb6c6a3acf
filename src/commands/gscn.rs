use crate::answers::Scan;
use crate::base::error::Result;
use crate::base::stream::DataStream;
use crate::base::Transceiver;
use crate::cmds::{PS_CMD_GET_SCAN, PS_SCAN_LATEST};
use crate::commands::{build_request, response_payload, write_data_log};
use crate::parsers::scan_parser::parse_scan;
use log::trace;
use std::io;

/// Fetches one scan.
#[derive(Debug)]
pub struct GscnCommand<'a, S: ?Sized> {
    transceiver: Transceiver<'a, S>,
}

impl<'a, S: DataStream + ?Sized> GscnCommand<'a, S> {
    pub fn new(stream: &'a mut S) -> GscnCommand<'a, S> {
        GscnCommand {
            transceiver: Transceiver::new(stream),
        }
    }

    /// Performs one `GSCN` cycle and parses the answer into `scan`.
    ///
    /// `scan` is cleared first and stays cleared when the cycle fails.
    ///
    /// # Arguments
    ///
    /// * `scan_number` - Scan to fetch, `0` for the latest one.
    /// * `scan` - Receives the parsed scan.
    pub fn perform(&mut self, scan_number: i32, scan: &mut Scan) -> Result<()> {
        self.perform_with_log(scan_number, scan, None)
    }

    /// Like `perform`, and copies the raw answer to `data_log`.
    pub fn perform_with_log(
        &mut self,
        scan_number: i32,
        scan: &mut Scan,
        data_log: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        scan.clear();
        trace!("GSCN for scan number {}", scan_number);
        let request = build_request(PS_CMD_GET_SCAN, &[scan_number]);
        let response = self.transceiver.send_command(&request)?;
        write_data_log(data_log, response);
        parse_scan(response_payload(response), scan)
    }

    /// Fetches the latest scan.
    pub fn latest(&mut self, scan: &mut Scan) -> Result<()> {
        self.perform(PS_SCAN_LATEST, scan)
    }
}
