//! Relay between a sensor stream and a client stream.
//!
//! Frames are forwarded unchanged in both directions, except for `GSC2`
//! requests: those are answered by the relay itself. It requests plain scans
//! with `GSCN`, collects as many as the request asks for, averages them and
//! sends a single `GSCN` answer back to the client.

pub mod averaging;
pub mod scan_frame;

pub use self::averaging::{AveragingAccumulator, PulseWidthDivisor};
pub use self::scan_frame::RawScanFrame;

use crate::base::error::{Error, Result};
use crate::base::frame::{command_id, display_id, read_word, verify_crc};
use crate::base::stream::DataStream;
use crate::cmds::*;
use crate::commands::build_request;
use crate::internals::{PS_DEFAULT_POLL_TIMEOUT, PS_MAX_FRAME_SIZE};
use log::{debug, error, info, trace, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Relay settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Read timeout of both streams; bounds the latency of one poll.
    pub poll_timeout: Duration,
    pub pulse_width_divisor: PulseWidthDivisor,
}

impl Default for RelayConfig {
    fn default() -> RelayConfig {
        RelayConfig {
            poll_timeout: PS_DEFAULT_POLL_TIMEOUT,
            pulse_width_divisor: PulseWidthDivisor::default(),
        }
    }
}

/// Counters of one relay session.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RelayStatistics {
    /// Frames forwarded from the client to the sensor, rewritten requests included.
    pub to_device: usize,
    /// Frames forwarded from the sensor to the client, averaged answers included.
    pub to_client: usize,
    /// Averaged answers produced.
    pub averaged: usize,
    /// Sensor frames dropped during averaging.
    pub discarded: usize,
    /// Requests sent again to the sensor during averaging.
    pub replayed: usize,
}

/// Which stream a poll looks at.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound,
}

/// Forwards frames between a sensor (`device`) and a client, averaging `GSC2` requests.
///
/// Both streams are borrowed; opening and closing them is up to the caller.
#[derive(Debug)]
pub struct Relay<'a, D: ?Sized, C: ?Sized> {
    device: &'a mut D,
    client: &'a mut C,
    config: RelayConfig,
    buffer: Vec<u8>,
    accumulator: Option<AveragingAccumulator>,
    last_request: Option<Vec<u8>>,
    stats: RelayStatistics,
}

impl<'a, D, C> Relay<'a, D, C>
where
    D: DataStream + ?Sized,
    C: DataStream + ?Sized,
{
    pub fn new(device: &'a mut D, client: &'a mut C, config: RelayConfig) -> Relay<'a, D, C> {
        trace!("Creating new Relay with {:?}", config);
        Relay {
            device,
            client,
            config,
            buffer: vec![0; PS_MAX_FRAME_SIZE],
            accumulator: None,
            last_request: None,
            stats: RelayStatistics::default(),
        }
    }

    pub fn statistics(&self) -> RelayStatistics {
        self.stats
    }

    /// Returns `true` while a `GSC2` request is being answered.
    pub fn is_averaging(&self) -> bool {
        self.accumulator.is_some()
    }

    /// Runs until `stop` is raised. The flag is checked once per poll.
    ///
    /// Both streams get the configured poll timeout first, so that a silent
    /// side never blocks the other one for long.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<RelayStatistics> {
        self.device.set_timeout(Some(self.config.poll_timeout))?;
        self.client.set_timeout(Some(self.config.poll_timeout))?;
        info!("Relay started, polling every {:?}", self.config.poll_timeout);
        while !stop.load(Ordering::Relaxed) {
            self.poll()?;
        }
        info!("Relay stopped: {:?}", self.stats);
        Ok(self.stats)
    }

    /// Polls the client once, then the sensor once, handling at most one frame from each.
    pub fn poll(&mut self) -> Result<()> {
        self.poll_direction(Direction::Outbound)?;
        self.poll_direction(Direction::Inbound)
    }

    fn poll_direction(&mut self, direction: Direction) -> Result<()> {
        let result = match direction {
            Direction::Outbound => self.client.read(&mut self.buffer),
            Direction::Inbound => self.device.read(&mut self.buffer),
        };
        let received = match result {
            Ok(received) => received,
            Err(Error::Timeout) => 0,
            Err(e @ Error::BufferOverflow { .. })
            | Err(e @ Error::ProtocolError { .. })
            | Err(e @ Error::CrcMismatch { .. }) => {
                warn!("Dropping unreadable frame ({:?}): {}", direction, e);
                self.stats.discarded += 1;
                if direction == Direction::Inbound && self.is_averaging() {
                    return self.replay();
                }
                return Ok(());
            }
            Err(e) => {
                error!("Relay read failed ({:?}): {}", direction, e);
                return Err(e);
            }
        };
        if received == 0 {
            return Ok(());
        }
        let frame = self.buffer[..received].to_vec();
        match direction {
            Direction::Outbound => self.handle_outbound(&frame),
            Direction::Inbound => self.handle_inbound(&frame),
        }
    }

    fn send_to_device(&mut self, frame: &[u8]) -> Result<()> {
        write_all(&mut *self.device, frame)?;
        self.stats.to_device += 1;
        Ok(())
    }

    fn send_to_client(&mut self, frame: &[u8]) -> Result<()> {
        write_all(&mut *self.client, frame)?;
        self.stats.to_client += 1;
        Ok(())
    }

    /// Sends the last rewritten request to the sensor again.
    fn replay(&mut self) -> Result<()> {
        if let Some(request) = self.last_request.clone() {
            trace!("Replaying {}", display_id(&request));
            self.send_to_device(&request)?;
            self.stats.replayed += 1;
        }
        Ok(())
    }

    fn handle_outbound(&mut self, frame: &[u8]) -> Result<()> {
        let id = command_id(frame);
        trace!("Client -> sensor: {} ({} bytes)", display_id(frame), frame.len());

        if id != Some(PS_CMD_GET_AVERAGED_SCAN) {
            if let Some(acc) = self.accumulator.take() {
                warn!(
                    "{} interrupts averaging after {} of {} scans",
                    display_id(frame),
                    acc.collected(),
                    acc.scan_average()
                );
                self.last_request = None;
            }
            return self.send_to_device(frame);
        }

        let counts = verify_crc(frame).ok().and_then(|_| {
            Some((
                read_word(frame, PS_REQ_WORD_PARAM_1)?,
                read_word(frame, PS_REQ_WORD_PARAM_2)?,
            ))
        });
        let (scan_average, point_average) = match counts {
            Some(counts) => counts,
            None => {
                warn!("Forwarding malformed GSC2 request unchanged");
                self.accumulator = None;
                self.last_request = None;
                return self.send_to_device(frame);
            }
        };

        if let Some(acc) = &self.accumulator {
            warn!(
                "New GSC2 request resets averaging after {} of {} scans",
                acc.collected(),
                acc.scan_average()
            );
        }
        if AveragingAccumulator::is_pass_through(scan_average, point_average) {
            debug!(
                "GSC2 {}/{} needs no averaging, forwarding unchanged",
                scan_average, point_average
            );
            self.accumulator = None;
            self.last_request = None;
            return self.send_to_device(frame);
        }

        let acc = AveragingAccumulator::new(scan_average, point_average);
        debug!(
            "Averaging {} scans and {} points",
            acc.scan_average(),
            acc.point_average()
        );
        self.accumulator = Some(acc);
        let request = build_request(PS_CMD_GET_SCAN, &[PS_SCAN_LATEST]);
        self.last_request = Some(request.clone());
        self.send_to_device(&request)
    }

    fn handle_inbound(&mut self, frame: &[u8]) -> Result<()> {
        trace!("Sensor -> client: {} ({} bytes)", display_id(frame), frame.len());
        let acc = match self.accumulator.as_mut() {
            Some(acc) => acc,
            None => return self.send_to_client(frame),
        };

        if command_id(frame) == Some(PS_ANS_ERROR) && verify_crc(frame).is_ok() {
            warn!("Sensor error frame ends averaging");
            self.accumulator = None;
            self.last_request = None;
            return self.send_to_client(frame);
        }

        if let Err(e) = acc.push(frame) {
            warn!("Discarding sensor frame during averaging: {}", e);
            self.stats.discarded += 1;
            return self.replay();
        }
        if !acc.is_complete() {
            return self.replay();
        }

        match acc.finish(self.config.pulse_width_divisor) {
            Ok(averaged) => {
                debug!("Sending averaged scan of {} bytes", averaged.len());
                self.accumulator = None;
                self.last_request = None;
                self.stats.averaged += 1;
                self.send_to_client(&averaged)
            }
            Err(e) => {
                warn!("Discarding averaging cycle: {}", e);
                self.stats.discarded += 1;
                self.replay()
            }
        }
    }
}

/// Writes one frame, treating a short write as a failure.
fn write_all<S: DataStream + ?Sized>(stream: &mut S, frame: &[u8]) -> Result<()> {
    let written = stream.write(frame)?;
    if written != frame.len() {
        return Err(Error::WriteFailed(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            format!("wrote {} of {} bytes", written, frame.len()),
        )));
    }
    Ok(())
}
