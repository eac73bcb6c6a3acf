use crate::answers::Scan;
use crate::base::error::Result;
use crate::base::stream::DataStream;
use crate::base::Transceiver;
use crate::cmds::PS_CMD_GET_AVERAGED_SCAN;
use crate::commands::{build_request, response_payload, write_data_log};
use crate::parsers::scan_parser::parse_scan;
use log::trace;
use std::io;

/// Fetches a scan averaged over several scans and neighbouring points.
#[derive(Debug)]
pub struct Gsc2Command<'a, S: ?Sized> {
    transceiver: Transceiver<'a, S>,
}

impl<'a, S: DataStream + ?Sized> Gsc2Command<'a, S> {
    pub fn new(stream: &'a mut S) -> Gsc2Command<'a, S> {
        Gsc2Command {
            transceiver: Transceiver::new(stream),
        }
    }

    /// Performs one `GSC2` cycle and parses the answer into `scan`.
    ///
    /// # Arguments
    ///
    /// * `scan_average` - Number of scans to average.
    /// * `point_average` - Number of neighbouring points to combine into one.
    /// * `scan` - Receives the parsed scan, cleared on failure.
    pub fn perform(&mut self, scan_average: i32, point_average: i32, scan: &mut Scan) -> Result<()> {
        self.perform_with_log(scan_average, point_average, scan, None)
    }

    /// Like `perform`, and copies the raw answer to `data_log`.
    pub fn perform_with_log(
        &mut self,
        scan_average: i32,
        point_average: i32,
        scan: &mut Scan,
        data_log: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        scan.clear();
        trace!(
            "GSC2 averaging {} scans and {} points",
            scan_average,
            point_average
        );
        let request = build_request(PS_CMD_GET_AVERAGED_SCAN, &[scan_average, point_average]);
        let response = self.transceiver.send_command(&request)?;
        write_data_log(data_log, response);
        parse_scan(response_payload(response), scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::DataContent;
    use crate::base::error::ErrorId;
    use crate::base::frame::{read_word, Frame};
    use crate::base::stream::mock::MockStream;
    use crate::parsers::scan_parser::tests::{parameters, scan_payload};

    #[test]
    fn sends_both_counts() {
        let payload = scan_payload(&parameters(1, DataContent::DistancesPulseWidth), 1, &[7, 8]);
        let response = Frame::with_payload(*b"GSCN", &payload).encode();
        let mut stream = MockStream::with_replies(vec![response]);
        let mut scan = Scan::new();
        {
            let mut cmd = Gsc2Command::new(&mut stream);
            cmd.perform(4, 3, &mut scan).unwrap();
        }
        let request = &stream.written[0];
        assert_eq!(request.len(), 20);
        assert_eq!(&request[..4], b"GSC2");
        assert_eq!(read_word(request, 1), Some(8));
        assert_eq!(read_word(request, 2), Some(4));
        assert_eq!(read_word(request, 3), Some(3));
        assert_eq!(scan.samples(0).unwrap()[0].pulse_width, 8);
    }

    #[test]
    fn overflowing_answer_is_reported() {
        let payload = scan_payload(&parameters(5, DataContent::Distances), 1, &[]);
        let response = Frame::with_payload(*b"GSCN", &payload).encode();
        let mut stream = MockStream::with_replies(vec![response]);
        let mut scan = Scan::new();
        let mut cmd = Gsc2Command::new(&mut stream);
        let err = cmd.perform(2, 2, &mut scan).unwrap_err();
        assert_eq!(err.id(), ErrorId::BufferOverflow);
        assert!(scan.is_empty());
    }
}
