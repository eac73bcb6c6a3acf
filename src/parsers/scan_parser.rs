//! Parser for the payload of `GSCN` and `GSC2` answers.
//!
//! Payload layout, all words big-endian:
//! `numberOfParameter`, the parameters, `numberOfPoints`, then per point and echo a
//! distance and, depending on the data content, a pulse width.

use crate::answers::{
    PointSamples, Scan, ScanSample, MAX_NUMBER_OF_ECHOES, MAX_POINTS_PER_SCAN,
    NUMBER_OF_SCAN_PARAMETER, PARAMETER_NUMBER_OF_ECHOES,
};
use crate::base::error::{Error, Result};
use crate::base::frame::WORD_SIZE;
use byteorder::{BigEndian, ByteOrder};
use log::{error, trace};

/// Reads consecutive big-endian words from a payload.
#[derive(Debug)]
pub(crate) struct WordCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WordCursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> WordCursor<'a> {
        WordCursor { buf, pos: 0 }
    }

    /// Byte offset of the next word.
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn next_word(&mut self) -> Result<i32> {
        match self.buf.get(self.pos..self.pos + WORD_SIZE) {
            Some(word) => {
                self.pos += WORD_SIZE;
                Ok(BigEndian::read_i32(word))
            }
            None => Err(Error::ProtocolError {
                description: format!("scan payload truncated at byte {}", self.pos),
            }),
        }
    }

    pub(crate) fn skip_words(&mut self, count: usize) -> Result<()> {
        let end = self.pos + count * WORD_SIZE;
        if end > self.buf.len() {
            return Err(Error::ProtocolError {
                description: format!(
                    "scan payload truncated: {} words to skip at byte {}",
                    count, self.pos
                ),
            });
        }
        self.pos = end;
        Ok(())
    }
}

/// Reads a count word that must not be negative.
fn next_count(cursor: &mut WordCursor<'_>, what: &str) -> Result<usize> {
    let value = cursor.next_word()?;
    if value < 0 {
        return Err(Error::ProtocolError {
            description: format!("negative {}: {}", what, value),
        });
    }
    Ok(value as usize)
}

/// Number of echoes announced by the parameter block; 0 stands for the master echo only.
fn echoes_of(parameter: &[i32; NUMBER_OF_SCAN_PARAMETER]) -> i64 {
    match parameter[PARAMETER_NUMBER_OF_ECHOES] {
        0 => 1,
        echoes => i64::from(echoes),
    }
}

/// Parses a scan payload (the bytes between frame header and CRC) into `scan`.
///
/// The scan is either fully populated or, on any error, cleared. Counts above
/// `MAX_POINTS_PER_SCAN` or `MAX_NUMBER_OF_ECHOES` fail with `Error::BufferOverflow`.
pub fn parse_scan(payload: &[u8], scan: &mut Scan) -> Result<()> {
    scan.clear();
    let result = parse_into(payload, scan);
    if let Err(e) = &result {
        error!("Failed to parse scan payload: {}", e);
        scan.clear();
    }
    result
}

fn parse_into(payload: &[u8], scan: &mut Scan) -> Result<()> {
    let mut cursor = WordCursor::new(payload);

    let declared_parameters = next_count(&mut cursor, "number of parameters")?;
    let known = declared_parameters.min(NUMBER_OF_SCAN_PARAMETER);
    for slot in scan.parameter.iter_mut().take(known) {
        *slot = cursor.next_word()?;
    }
    cursor.skip_words(declared_parameters - known)?;
    scan.number_of_parameter = known;
    trace!(
        "Scan parameter block: {} declared, {} known",
        declared_parameters,
        known
    );

    let echoes = echoes_of(&scan.parameter);
    let points = i64::from(cursor.next_word()?);
    trace!("Scan has {} points with {} echoes", points, echoes);
    if echoes > MAX_NUMBER_OF_ECHOES as i64 || points > MAX_POINTS_PER_SCAN as i64 {
        return Err(Error::BufferOverflow {
            description: format!("{} points with {} echoes", points, echoes),
        });
    }
    if echoes < 0 || points < 0 {
        return Err(Error::ProtocolError {
            description: format!("negative counts: {} points, {} echoes", points, echoes),
        });
    }
    scan.number_of_echoes = echoes as usize;
    scan.number_of_points = points as usize;

    let content = scan.data_content();
    let words_per_sample = content.words_per_sample();
    if words_per_sample == 0 {
        trace!("Scan carries no data block");
        return Ok(());
    }

    scan.data.reserve(scan.number_of_points);
    for _ in 0..scan.number_of_points {
        let mut samples: PointSamples = [ScanSample::default(); MAX_NUMBER_OF_ECHOES];
        for sample in samples.iter_mut().take(scan.number_of_echoes) {
            sample.distance = cursor.next_word()?;
            if words_per_sample == 2 {
                sample.pulse_width = cursor.next_word()?;
            }
        }
        scan.data.push(samples);
    }
    trace!(
        "Parsed {} samples, {} of {} payload bytes used",
        scan.number_of_points * scan.number_of_echoes,
        cursor.position(),
        payload.len()
    );
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::answers::{
        DataContent, DISTANCE_NO_ECHO, PARAMETER_DATA_CONTENT, PARAMETER_SCAN_NUMBER,
    };
    use crate::base::error::ErrorId;

    /// Builds a scan payload from its parts.
    pub(crate) fn scan_payload(parameter: &[i32], points: i32, data: &[i32]) -> Vec<u8> {
        let mut words = vec![parameter.len() as i32];
        words.extend_from_slice(parameter);
        words.push(points);
        words.extend_from_slice(data);
        let mut payload = vec![0u8; words.len() * 4];
        BigEndian::write_i32_into(&words, &mut payload);
        payload
    }

    pub(crate) fn parameters(echoes: i32, content: DataContent) -> Vec<i32> {
        let mut parameter = vec![0; NUMBER_OF_SCAN_PARAMETER];
        parameter[PARAMETER_SCAN_NUMBER] = 7;
        parameter[PARAMETER_NUMBER_OF_ECHOES] = echoes;
        parameter[PARAMETER_DATA_CONTENT] = content.code();
        parameter
    }

    #[test]
    fn parses_distances_and_pulse_widths() {
        let payload = scan_payload(
            &parameters(2, DataContent::DistancesPulseWidth),
            2,
            &[100, 1, 200, 2, DISTANCE_NO_ECHO, 0, 400, 4],
        );
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        assert_eq!(scan.number_of_parameter, 10);
        assert_eq!(scan.scan_number(), 7);
        assert_eq!(scan.number_of_points, 2);
        assert_eq!(scan.number_of_echoes, 2);
        assert_eq!(
            scan.samples(0).unwrap(),
            &[ScanSample::new(100, 1), ScanSample::new(200, 2)]
        );
        assert!(scan.samples(1).unwrap()[0].is_no_echo());
        assert_eq!(scan.samples(1).unwrap()[1], ScanSample::new(400, 4));
    }

    #[test]
    fn parses_distances_only() {
        let payload = scan_payload(&parameters(1, DataContent::Distances), 3, &[10, 20, 30]);
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        let distances: Vec<i32> = (0..3).map(|p| scan.samples(p).unwrap()[0].distance).collect();
        assert_eq!(distances, vec![10, 20, 30]);
        assert_eq!(scan.samples(2).unwrap()[0].pulse_width, 0);
    }

    #[test]
    fn no_data_block_yields_no_samples() {
        let payload = scan_payload(&parameters(1, DataContent::NoDataBlock), 5, &[]);
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        assert_eq!(scan.number_of_points, 5);
        assert!(scan.data.is_empty());
    }

    #[test]
    fn unknown_content_reads_pairs() {
        let payload = scan_payload(&parameters(1, DataContent::Other(3)), 1, &[55, 66]);
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        assert_eq!(scan.samples(0).unwrap()[0], ScanSample::new(55, 66));
    }

    #[test]
    fn scan_without_parameters_is_not_empty() {
        let payload = scan_payload(&[], 0, &[]);
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        assert_eq!(scan.number_of_parameter, 0);
        assert_eq!(scan.number_of_echoes, 1);
        assert!(!scan.is_empty());
    }

    #[test]
    fn zero_echoes_means_master_echo() {
        let payload = scan_payload(&parameters(0, DataContent::Distances), 2, &[1, 2]);
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        assert_eq!(scan.number_of_echoes, 1);
        assert_eq!(scan.samples(1).unwrap(), &[ScanSample::new(2, 0)]);
    }

    #[test]
    fn extra_parameters_are_skipped() {
        let mut parameter = parameters(1, DataContent::Distances);
        parameter.extend_from_slice(&[-1, -2]);
        let payload = scan_payload(&parameter, 1, &[999]);
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        assert_eq!(scan.number_of_parameter, NUMBER_OF_SCAN_PARAMETER);
        assert_eq!(scan.samples(0).unwrap()[0].distance, 999);
    }

    #[test]
    fn accepts_maximum_counts() {
        let data: Vec<i32> = (0..(4000 * 4)).collect();
        let payload = scan_payload(&parameters(4, DataContent::Distances), 4000, &data);
        let mut scan = Scan::new();
        parse_scan(&payload, &mut scan).unwrap();
        assert_eq!(scan.number_of_points, 4000);
        assert_eq!(scan.number_of_echoes, 4);
        assert_eq!(scan.samples(3999).unwrap()[3].distance, 15999);
    }

    #[test]
    fn rejects_too_many_points_or_echoes() {
        let mut scan = Scan::new();
        let payload = scan_payload(&parameters(1, DataContent::Distances), 4001, &[]);
        let err = parse_scan(&payload, &mut scan).unwrap_err();
        assert_eq!(err.id(), ErrorId::BufferOverflow);
        assert_eq!(scan, Scan::new());

        let payload = scan_payload(&parameters(5, DataContent::Distances), 1, &[1, 2, 3, 4, 5]);
        let err = parse_scan(&payload, &mut scan).unwrap_err();
        assert_eq!(err.id(), ErrorId::BufferOverflow);
        assert_eq!(scan, Scan::new());
    }

    #[test]
    fn truncated_payload_clears_scan() {
        let payload = scan_payload(&parameters(1, DataContent::DistancesPulseWidth), 2, &[1, 2, 3]);
        let mut scan = Scan::new();
        match parse_scan(&payload, &mut scan) {
            Err(Error::ProtocolError { .. }) => {}
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(scan.is_empty());
        assert!(scan.data.is_empty());
    }
}
