use crate::base::error::{Error, ErrorId, Result};
use crate::base::frame::{declared_frame_len, COMMAND_ID_SIZE, FRAME_HEADER_SIZE, FRAME_OVERHEAD};
use crate::base::stream::DataStream;
use crate::internals::*;
use log::{debug, trace, warn};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

/// Baud rates the serial link can be configured with.
pub const SUPPORTED_BAUD_RATES: [u32; 19] = [
    50, 75, 110, 134, 150, 200, 300, 600, 1200, 1800, 2400, 4800, 9600, 19200, 38400, 57600,
    115_200, 230_400, 460_800,
];

pub fn is_supported_baud_rate(baud_rate: u32) -> bool {
    SUPPORTED_BAUD_RATES.contains(&baud_rate)
}

/// Device and line settings of a serial connection to a sensor. The line is always 8N1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UartConfig {
    /// Serial device, e.g. `/dev/ttyUSB0` or `COM3`.
    pub path: String,
    pub baud_rate: u32,
    /// Read timeout, `None` polls and gives up after a number of empty reads.
    pub timeout: Option<Duration>,
}

impl Default for UartConfig {
    fn default() -> UartConfig {
        UartConfig {
            path: String::from("/dev/ttyUSB0"),
            baud_rate: PS_DEFAULT_BAUD_RATE,
            timeout: Some(PS_DEFAULT_TIMEOUT),
        }
    }
}

/// Frame-oriented stream over a serial port.
///
/// A serial line has no datagram boundaries, so `read` collects the frame header
/// first and then exactly as many bytes as the header announces.
pub struct UartStream {
    config: UartConfig,
    port: Option<Box<dyn SerialPort>>,
}

impl fmt::Debug for UartStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UartStream")
            .field("config", &self.config)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl UartStream {
    pub fn new(config: UartConfig) -> UartStream {
        UartStream { config, port: None }
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or_else(|| Error::InvalidHandle {
            description: "serial port is not open".to_owned(),
        })
    }
}

impl DataStream for UartStream {
    fn open(&mut self) -> Result<()> {
        self.close()?;
        if !is_supported_baud_rate(self.config.baud_rate) {
            return Err(Error::Device(ErrorId::ConfigurationError));
        }
        debug!(
            "Opening serial port {} at {} baud",
            self.config.path, self.config.baud_rate
        );
        let timeout = self
            .config
            .timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(PS_UART_POLL_INTERVAL);
        let port = serialport::new(self.config.path.as_str(), self.config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| Error::IoError(io::Error::from(e)))?;
        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!("Closed serial port {}", self.config.path);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let has_timeout = self.config.timeout.map_or(false, |t| !t.is_zero());
        let port = self.port()?;
        let result = read_frame(port, buf, PS_MAX_UART_FRAME_SIZE, has_timeout);
        if let Err(Error::BufferOverflow { .. }) = &result {
            warn!("Dropping pending serial input");
            if let Err(e) = port.clear(ClearBuffer::Input) {
                warn!("Failed to clear serial input: {}", e);
            }
        }
        result
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let port = self.port()?;
        port.write_all(buf).map_err(Error::WriteFailed)?;
        port.flush().map_err(Error::WriteFailed)?;
        trace!("Wrote {} bytes to serial port", buf.len());
        Ok(buf.len())
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.config.timeout = timeout;
        let port_timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or(PS_UART_POLL_INTERVAL);
        if let Some(port) = self.port.as_mut() {
            port.set_timeout(port_timeout)
                .map_err(|e| Error::IoError(io::Error::from(e)))?;
        }
        Ok(())
    }
}

/// Returns `true` if `id` can start a frame: upper-case letters or digits, padded with NULs.
fn plausible_id(id: &[u8]) -> bool {
    let text = id.iter().take_while(|b| **b != 0).count();
    text > 0
        && id[..text]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        && id[text..].iter().all(|b| *b == 0)
}

/// Reads one frame from a byte stream without datagram boundaries.
///
/// Collects the 8-byte header, then the announced payload and CRC. Never reads
/// past the end of the frame. A header with an implausible command ID, or a length
/// above `max_frame_len` or the size of `buf`, is shifted byte by byte until a
/// plausible one turns up; after `max_frame_len` skipped bytes the read fails with
/// `Error::BufferOverflow`. With `has_timeout`, the first empty read ends the frame
/// with `Error::Timeout`; otherwise up to `PS_UART_MAX_EMPTY_READS` empty reads are
/// tolerated once the frame has started.
pub(crate) fn read_frame<R>(
    reader: &mut R,
    buf: &mut [u8],
    max_frame_len: usize,
    has_timeout: bool,
) -> Result<usize>
where
    R: io::Read + ?Sized,
{
    if buf.len() < FRAME_OVERHEAD {
        return Err(Error::InvalidParameter {
            description: format!("read buffer of {} bytes cannot hold a frame", buf.len()),
        });
    }
    let mut total = 0;
    let mut expected: Option<usize> = None;
    let mut empty_reads = 0;
    let mut skipped = 0;

    loop {
        let target = expected.unwrap_or(FRAME_HEADER_SIZE);
        let received = match reader.read(&mut buf[total..target]) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
            {
                0
            }
            Err(e) => return Err(Error::ReadFailed(e)),
        };

        if received > 0 {
            empty_reads = 0;
            total += received;
        } else if total == 0 {
            return Err(Error::Timeout);
        } else {
            // empty read in the middle of a frame
            if has_timeout {
                warn!("Serial read timed out after {} bytes", total);
                return Err(Error::Timeout);
            }
            empty_reads += 1;
            if empty_reads > PS_UART_MAX_EMPTY_READS {
                warn!("Serial read gave up after {} empty reads", empty_reads);
                return Err(Error::Timeout);
            }
        }
        if total < target {
            continue;
        }

        match expected {
            Some(frame_len) => {
                trace!("Read {} byte frame from serial port", frame_len);
                return Ok(frame_len);
            }
            None => {
                let frame_len = declared_frame_len(&buf[..total]).unwrap_or(FRAME_OVERHEAD);
                let fits = frame_len <= max_frame_len && frame_len <= buf.len();
                if !fits || !plausible_id(&buf[..COMMAND_ID_SIZE]) {
                    if skipped == 0 {
                        warn!(
                            "Bad serial frame header {:02X?}, resynchronising",
                            &buf[..total]
                        );
                    }
                    skipped += 1;
                    if skipped > max_frame_len {
                        return Err(Error::BufferOverflow {
                            description: format!("no frame header in {} serial bytes", skipped),
                        });
                    }
                    buf.copy_within(1..total, 0);
                    total -= 1;
                    continue;
                }
                if skipped > 0 {
                    debug!("Skipped {} bytes in front of a serial frame", skipped);
                }
                expected = Some(frame_len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::frame::Frame;
    use std::collections::VecDeque;

    const MAX: usize = PS_MAX_UART_FRAME_SIZE;

    /// Serves scripted chunks; `None` is an empty (timed out) read.
    struct ChunkReader {
        chunks: VecDeque<Option<Vec<u8>>>,
    }

    impl ChunkReader {
        fn new(chunks: Vec<Option<Vec<u8>>>) -> ChunkReader {
            ChunkReader {
                chunks: chunks.into(),
            }
        }
    }

    impl io::Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Some(mut chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    if n < chunk.len() {
                        self.chunks.push_front(Some(chunk.split_off(n)));
                    }
                    Ok(n)
                }
                Some(None) | None => Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            }
        }
    }

    #[test]
    fn reassembles_frame_from_chunks_and_stops_at_frame_end() {
        let frame = Frame::with_words(*b"GPRM", &[5, 42]).encode();
        let mut bytes = frame.clone();
        bytes.extend_from_slice(b"NEXT");
        let mut reader = ChunkReader::new(vec![
            Some(bytes[..3].to_vec()),
            Some(bytes[3..11].to_vec()),
            Some(bytes[11..].to_vec()),
        ]);
        let mut buf = [0u8; 64];
        let n = read_frame(&mut reader, &mut buf, MAX, true).unwrap();
        assert_eq!(&buf[..n], &frame[..]);
        // the next frame stays in the reader
        assert_eq!(reader.chunks.front(), Some(&Some(b"NEXT".to_vec())));
    }

    #[test]
    fn timeouts() {
        let mut buf = [0u8; 64];
        let mut reader = ChunkReader::new(vec![]);
        let result = read_frame(&mut reader, &mut buf, MAX, true);
        assert!(matches!(result, Err(Error::Timeout)));

        let frame = Frame::with_words(*b"GPRM", &[5, 42]).encode();
        let mut reader = ChunkReader::new(vec![Some(frame[..10].to_vec()), None]);
        let result = read_frame(&mut reader, &mut buf, MAX, true);
        assert!(matches!(result, Err(Error::Timeout)));
    }

    #[test]
    fn polling_tolerates_gaps_up_to_the_cap() {
        let frame = Frame::with_words(*b"GPRM", &[5, 42]).encode();
        let mut chunks = vec![Some(frame[..10].to_vec())];
        chunks.extend(std::iter::repeat(None).take(PS_UART_MAX_EMPTY_READS));
        chunks.push(Some(frame[10..].to_vec()));
        let mut buf = [0u8; 64];
        let mut reader = ChunkReader::new(chunks);
        let n = read_frame(&mut reader, &mut buf, MAX, false).unwrap();
        assert_eq!(&buf[..n], &frame[..]);

        let mut chunks = vec![Some(frame[..10].to_vec())];
        chunks.extend(std::iter::repeat(None).take(PS_UART_MAX_EMPTY_READS + 1));
        chunks.push(Some(frame[10..].to_vec()));
        assert!(matches!(
            read_frame(&mut ChunkReader::new(chunks), &mut buf, MAX, false),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn skips_garbage_in_front_of_a_frame() {
        let frame = Frame::with_words(*b"GSCN", &[1, 0, 0]).encode();
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&frame);
        let mut buf = [0u8; 64];
        let mut reader = ChunkReader::new(vec![Some(bytes)]);
        let n = read_frame(&mut reader, &mut buf, MAX, true).unwrap();
        assert_eq!(&buf[..n], &frame[..]);

        // a lost first byte leaves a plausible ID with an absurd length
        let mut bytes = frame[1..].to_vec();
        bytes.extend_from_slice(&frame);
        let mut reader = ChunkReader::new(vec![Some(bytes)]);
        let n = read_frame(&mut reader, &mut buf, MAX, true).unwrap();
        assert_eq!(&buf[..n], &frame[..]);
    }

    #[test]
    fn oversized_frames_are_skipped() {
        let mut bytes = b"GSCN".to_vec();
        bytes.extend_from_slice(&(PS_MAX_UART_FRAME_SIZE as u32).to_be_bytes());
        let frame = Frame::with_words(*b"GPRM", &[5, 42]).encode();
        bytes.extend_from_slice(&frame);
        let mut buf = [0u8; 64];
        let mut reader = ChunkReader::new(vec![Some(bytes)]);
        let n = read_frame(&mut reader, &mut buf, MAX, true).unwrap();
        assert_eq!(&buf[..n], &frame[..]);
    }

    #[test]
    fn endless_garbage_is_a_buffer_overflow() {
        let garbage = vec![0xFFu8; PS_MAX_UART_FRAME_SIZE + 64];
        let mut buf = [0u8; 64];
        let mut reader = io::Cursor::new(garbage);
        let err = read_frame(&mut reader, &mut buf, MAX, true).unwrap_err();
        assert_eq!(err.id(), ErrorId::BufferOverflow);
    }

    #[test]
    fn command_ids() {
        assert!(plausible_id(b"GSCN"));
        assert!(plausible_id(b"ERR\0"));
        assert!(!plausible_id(b"\0GSC"));
        assert!(!plausible_id(b"E\0R\0"));
        assert!(!plausible_id(&[0xFF, 0x00, 0x00, 0x00]));
    }

    #[test]
    fn baud_rates() {
        assert!(is_supported_baud_rate(115_200));
        assert!(is_supported_baud_rate(50));
        assert!(!is_supported_baud_rate(921_600));
        let mut stream = UartStream::new(UartConfig {
            baud_rate: 12_345,
            ..UartConfig::default()
        });
        assert_eq!(stream.open().unwrap_err().id(), ErrorId::ConfigurationError);
        assert!(!stream.is_open());
    }
}
