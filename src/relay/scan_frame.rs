use crate::answers::{
    DataContent, ScanSample, MAX_NUMBER_OF_ECHOES, MAX_POINTS_PER_SCAN, PARAMETER_DATA_CONTENT,
    PARAMETER_NUMBER_OF_ECHOES,
};
use crate::base::error::{Error, Result};
use crate::base::frame::{display_id, CommandId, Frame};
use crate::cmds::PS_CMD_GET_SCAN;
use crate::parsers::scan_parser::WordCursor;
use log::trace;

/// A scan answer as it travels through the relay.
///
/// Unlike `Scan`, every parameter word is kept, including the ones this client
/// does not know, so the frame can be written out again unchanged apart from
/// the samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScanFrame {
    pub id: CommandId,
    pub parameter: Vec<i32>,
    pub number_of_points: usize,
    pub number_of_echoes: usize,
    pub words_per_sample: usize,
    /// Samples in wire order: all echoes of point 0, then point 1, ...
    pub samples: Vec<ScanSample>,
}

impl RawScanFrame {
    /// Decodes a complete scan answer frame, checking length and CRC.
    pub fn decode(bytes: &[u8]) -> Result<RawScanFrame> {
        let frame = Frame::decode(bytes)?;
        let mut cursor = WordCursor::new(&frame.payload);

        let declared = cursor.next_word()?;
        if declared < 0 {
            return Err(Error::ProtocolError {
                description: format!("negative number of parameters: {}", declared),
            });
        }
        let mut parameter = Vec::new();
        for _ in 0..declared {
            parameter.push(cursor.next_word()?);
        }
        let word = |index: usize| parameter.get(index).copied().unwrap_or(0);

        let echoes = match word(PARAMETER_NUMBER_OF_ECHOES) {
            0 => 1,
            echoes => i64::from(echoes),
        };
        let points = i64::from(cursor.next_word()?);
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
        let words_per_sample =
            DataContent::from_code(word(PARAMETER_DATA_CONTENT)).words_per_sample();

        let count = if words_per_sample == 0 {
            0
        } else {
            points as usize * echoes as usize
        };
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            let distance = cursor.next_word()?;
            let pulse_width = if words_per_sample == 2 {
                cursor.next_word()?
            } else {
                0
            };
            samples.push(ScanSample::new(distance, pulse_width));
        }

        trace!(
            "Decoded {} frame: {} parameters, {} points, {} echoes",
            display_id(&frame.id),
            parameter.len(),
            points,
            echoes
        );
        Ok(RawScanFrame {
            id: frame.id,
            parameter,
            number_of_points: points as usize,
            number_of_echoes: echoes as usize,
            words_per_sample,
            samples,
        })
    }

    /// Returns `true` if both frames carry samples in the same arrangement.
    pub fn same_layout(&self, other: &RawScanFrame) -> bool {
        self.number_of_points == other.number_of_points
            && self.number_of_echoes == other.number_of_echoes
            && self.words_per_sample == other.words_per_sample
            && self.samples.len() == other.samples.len()
    }

    /// Encodes the frame as a `GSCN` answer with fresh length and CRC.
    pub fn encode(&self) -> Vec<u8> {
        let mut words = Vec::with_capacity(
            2 + self.parameter.len() + self.samples.len() * self.words_per_sample,
        );
        words.push(self.parameter.len() as i32);
        words.extend_from_slice(&self.parameter);
        words.push(self.number_of_points as i32);
        for sample in &self.samples {
            words.push(sample.distance);
            if self.words_per_sample == 2 {
                words.push(sample.pulse_width);
            }
        }
        Frame::with_words(PS_CMD_GET_SCAN, &words).encode()
    }
}
