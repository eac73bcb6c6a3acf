//! Scan and point averaging for the relay.
//!
//! Distances are averaged over valid samples only. When every sample of a position
//! is a sentinel, the more frequent sentinel is the result, no-echo winning ties.

use crate::answers::{ScanSample, DISTANCE_NO_ECHO, DISTANCE_NOISE};
use crate::base::error::{Error, Result};
use crate::base::frame::{command_id, display_id, verify_crc};
use crate::cmds::PS_CMD_GET_SCAN;
use crate::internals::PS_MAX_AVERAGED_SCANS;
use crate::relay::scan_frame::RawScanFrame;
use log::{trace, warn};
use std::fmt;
use std::str::FromStr;

/// Divisor of the summed pulse widths of one averaged position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PulseWidthDivisor {
    /// Divide by the number of combined samples, sentinels included.
    #[default]
    RepeatCount,
    /// Divide by the number of valid samples only.
    ValidSamples,
}

impl FromStr for PulseWidthDivisor {
    type Err = Error;

    fn from_str(s: &str) -> Result<PulseWidthDivisor> {
        match s {
            "repeat" | "repeat-count" => Ok(PulseWidthDivisor::RepeatCount),
            "valid" | "valid-samples" => Ok(PulseWidthDivisor::ValidSamples),
            other => Err(Error::InvalidParameter {
                description: format!("unknown pulse width divisor '{}'", other),
            }),
        }
    }
}

impl fmt::Display for PulseWidthDivisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PulseWidthDivisor::RepeatCount => write!(f, "repeat"),
            PulseWidthDivisor::ValidSamples => write!(f, "valid"),
        }
    }
}

/// Running sums of the samples combined into one output sample.
#[derive(Debug, Default, Clone, Copy)]
struct SampleSum {
    distance: i64,
    pulse_width: i64,
    valid: usize,
    no_echo: usize,
    noise: usize,
}

impl SampleSum {
    fn add(&mut self, sample: ScanSample) {
        if sample.is_no_echo() {
            self.no_echo += 1;
        } else if sample.is_noise() {
            self.noise += 1;
        } else {
            self.valid += 1;
            self.distance += i64::from(sample.distance);
            self.pulse_width += i64::from(sample.pulse_width);
        }
    }

    /// Averaged sample; `count` is the number of samples added.
    fn average(&self, count: usize, divisor: PulseWidthDivisor) -> ScanSample {
        if self.valid == 0 {
            let distance = if self.no_echo >= self.noise {
                DISTANCE_NO_ECHO
            } else {
                DISTANCE_NOISE
            };
            return ScanSample::new(distance, 0);
        }
        let pulse_divisor = match divisor {
            PulseWidthDivisor::RepeatCount => count.max(1),
            PulseWidthDivisor::ValidSamples => self.valid,
        };
        ScanSample::new(
            (self.distance / self.valid as i64) as i32,
            (self.pulse_width / pulse_divisor as i64) as i32,
        )
    }
}

/// Combines samples of one position with the sentinel rule.
pub fn average_samples<I>(samples: I, divisor: PulseWidthDivisor) -> ScanSample
where
    I: IntoIterator<Item = ScanSample>,
{
    let mut sum = SampleSum::default();
    let mut count = 0;
    for sample in samples {
        sum.add(sample);
        count += 1;
    }
    sum.average(count, divisor)
}

/// Averages scans of identical layout position by position.
///
/// The result carries the parameter block of the last scan.
pub fn average_scans(frames: &[RawScanFrame], divisor: PulseWidthDivisor) -> Result<RawScanFrame> {
    let last = frames.last().ok_or_else(|| Error::InvalidParameter {
        description: "no scans to average".to_owned(),
    })?;
    if let Some(index) = frames.iter().position(|frame| !frame.same_layout(last)) {
        return Err(Error::ProtocolError {
            description: format!(
                "scan {} has {} points x {} echoes, expected {} x {}",
                index,
                frames[index].number_of_points,
                frames[index].number_of_echoes,
                last.number_of_points,
                last.number_of_echoes
            ),
        });
    }

    let mut averaged = last.clone();
    for (position, slot) in averaged.samples.iter_mut().enumerate() {
        *slot = average_samples(frames.iter().map(|frame| frame.samples[position]), divisor);
    }
    trace!(
        "Averaged {} scans of {} samples",
        frames.len(),
        averaged.samples.len()
    );
    Ok(averaged)
}

/// Combines every `group` consecutive points into one, echo by echo.
///
/// A trailing group with fewer points is averaged over the points it has.
pub fn average_points(
    frame: &RawScanFrame,
    group: usize,
    divisor: PulseWidthDivisor,
) -> RawScanFrame {
    if group <= 1 {
        return frame.clone();
    }
    if frame.samples.is_empty() || frame.number_of_echoes == 0 {
        // no data block: only the point count shrinks
        let mut averaged = frame.clone();
        averaged.number_of_points = (frame.number_of_points + group - 1) / group;
        return averaged;
    }
    let echoes = frame.number_of_echoes;
    let mut samples = Vec::with_capacity(frame.samples.len() / group + echoes);
    for chunk in frame.samples.chunks(group * echoes) {
        let points = chunk.len() / echoes;
        for echo in 0..echoes {
            samples.push(average_samples(
                (0..points).map(|point| chunk[point * echoes + echo]),
                divisor,
            ));
        }
    }
    let mut averaged = frame.clone();
    averaged.number_of_points = samples.len() / echoes;
    averaged.samples = samples;
    trace!(
        "Combined {} points in groups of {} into {}",
        frame.number_of_points,
        group,
        averaged.number_of_points
    );
    averaged
}

/// Collects the raw scans of one `GSC2` request until they can be averaged.
#[derive(Debug, Clone)]
pub struct AveragingAccumulator {
    scan_average: usize,
    point_average: usize,
    frames: Vec<Vec<u8>>,
}

impl AveragingAccumulator {
    /// Returns `true` if a request with these counts goes to the sensor unchanged.
    ///
    /// The relay averages only when both counts are above 1.
    pub fn is_pass_through(scan_average: i32, point_average: i32) -> bool {
        scan_average <= 1 || point_average <= 1
    }

    /// Creates an accumulator for the counts of a `GSC2` request.
    ///
    /// Counts below 1 mean 1. More than `PS_MAX_AVERAGED_SCANS` scans are limited to it.
    pub fn new(scan_average: i32, point_average: i32) -> AveragingAccumulator {
        let mut scans = scan_average.max(1) as usize;
        if scans > PS_MAX_AVERAGED_SCANS {
            warn!(
                "Limiting scan averaging from {} to {} scans",
                scans, PS_MAX_AVERAGED_SCANS
            );
            scans = PS_MAX_AVERAGED_SCANS;
        }
        AveragingAccumulator {
            scan_average: scans,
            point_average: point_average.max(1) as usize,
            frames: Vec::with_capacity(scans),
        }
    }

    pub fn scan_average(&self) -> usize {
        self.scan_average
    }

    pub fn point_average(&self) -> usize {
        self.point_average
    }

    /// Number of scans collected so far.
    pub fn collected(&self) -> usize {
        self.frames.len()
    }

    pub fn is_complete(&self) -> bool {
        self.frames.len() >= self.scan_average
    }

    /// Drops all collected scans.
    pub fn reset(&mut self) {
        self.frames.clear();
    }

    /// Stores a copy of a raw scan answer after checking its CRC and command ID.
    pub fn push(&mut self, raw: &[u8]) -> Result<()> {
        verify_crc(raw)?;
        if command_id(raw) != Some(PS_CMD_GET_SCAN) {
            return Err(Error::ProtocolError {
                description: format!("expected a GSCN answer, got {}", display_id(raw)),
            });
        }
        if self.is_complete() {
            return Err(Error::BufferOverflow {
                description: format!("{} scans already collected", self.frames.len()),
            });
        }
        self.frames.push(raw.to_vec());
        trace!(
            "Collected scan {} of {}",
            self.frames.len(),
            self.scan_average
        );
        Ok(())
    }

    /// Averages the collected scans, then their points, and encodes one `GSCN` answer.
    ///
    /// The collected scans are consumed whether or not this succeeds.
    pub fn finish(&mut self, divisor: PulseWidthDivisor) -> Result<Vec<u8>> {
        let raw = std::mem::take(&mut self.frames);
        let frames = raw
            .iter()
            .map(|bytes| RawScanFrame::decode(bytes))
            .collect::<Result<Vec<_>>>()?;
        let scans = average_scans(&frames, divisor)?;
        let points = average_points(&scans, self.point_average, divisor);
        Ok(points.encode())
    }
}
