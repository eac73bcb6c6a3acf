use crate::base::error::{Error, Result};
use crate::crc::Crc32;
use byteorder::{BigEndian, ByteOrder, NativeEndian};
use log::{error, trace};

/// Four ASCII bytes identifying a command, e.g. `*b"GVER"`.
pub type CommandId = [u8; 4];

/// Size of the ASCII command ID at the start of every frame.
pub const COMMAND_ID_SIZE: usize = 4;

/// Size of the command ID plus the length field.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Size of the CRC trailer.
pub const CRC_SIZE: usize = 4;

/// Bytes every frame carries besides its payload.
pub const FRAME_OVERHEAD: usize = FRAME_HEADER_SIZE + CRC_SIZE;

/// Size of one payload word.
pub const WORD_SIZE: usize = 4;

/// Renders a command ID for log output, replacing non-printable bytes.
pub fn display_id(id: &[u8]) -> String {
    id.iter()
        .take(COMMAND_ID_SIZE)
        .map(|b| {
            if b.is_ascii_graphic() {
                *b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Returns the command ID at the start of `buf`, if there are at least four bytes.
pub fn command_id(buf: &[u8]) -> Option<CommandId> {
    if buf.len() < COMMAND_ID_SIZE {
        return None;
    }
    let mut id = [0u8; COMMAND_ID_SIZE];
    id.copy_from_slice(&buf[..COMMAND_ID_SIZE]);
    Some(id)
}

/// Returns the total frame size (header + payload + CRC) declared by the header in `buf`.
pub fn declared_frame_len(buf: &[u8]) -> Option<usize> {
    if buf.len() < FRAME_HEADER_SIZE {
        return None;
    }
    let payload_len = BigEndian::read_u32(&buf[COMMAND_ID_SIZE..FRAME_HEADER_SIZE]) as usize;
    Some(payload_len + FRAME_OVERHEAD)
}

/// Reads the 32-bit word at `index` (counting from the command ID) in network byte order.
#[inline]
pub fn read_word(buf: &[u8], index: usize) -> Option<i32> {
    let start = index * WORD_SIZE;
    buf.get(start..start + WORD_SIZE).map(BigEndian::read_i32)
}

/// Writes a 32-bit word at `index` (counting from the command ID) in network byte order.
#[inline]
pub fn write_word(buf: &mut [u8], index: usize, value: i32) -> Result<()> {
    let start = index * WORD_SIZE;
    match buf.get_mut(start..start + WORD_SIZE) {
        Some(word) => {
            BigEndian::write_i32(word, value);
            Ok(())
        }
        None => Err(Error::IndexOutOfRange(index)),
    }
}

/// Calculates the CRC of a frame and stores it, big-endian, in its last four bytes.
///
/// The CRC covers every byte in front of the trailer. After this the buffer is ready
/// to be sent.
pub fn stamp_crc(buf: &mut [u8]) -> Result<()> {
    if buf.len() <= CRC_SIZE {
        error!("Cannot stamp CRC on a {} byte buffer", buf.len());
        return Err(Error::InvalidParameter {
            description: format!("frame of {} bytes has no room for a CRC", buf.len()),
        });
    }
    let crc_pos = buf.len() - CRC_SIZE;
    let crc = Crc32::compute(&buf[..crc_pos]);
    BigEndian::write_u32(&mut buf[crc_pos..], crc);
    trace!("Stamped CRC {:08X} on {} byte frame", crc, buf.len());
    Ok(())
}

/// Recomputes the CRC over all but the last four bytes and compares it with the trailer.
pub fn verify_crc(buf: &[u8]) -> Result<()> {
    if buf.len() <= CRC_SIZE {
        error!("Cannot verify CRC of a {} byte buffer", buf.len());
        return Err(Error::InvalidParameter {
            description: format!("frame of {} bytes has no CRC", buf.len()),
        });
    }
    let crc_pos = buf.len() - CRC_SIZE;
    let received = BigEndian::read_u32(&buf[crc_pos..]);
    let calculated = Crc32::compute(&buf[..crc_pos]);
    trace!(
        "CRC check: received {:08X}, calculated {:08X}",
        received,
        calculated
    );
    if received != calculated {
        return Err(Error::CrcMismatch {
            received,
            calculated,
        });
    }
    Ok(())
}

/// Byte range holding the integer words of a frame: behind the command ID, in front of the CRC.
fn word_region(len: usize) -> std::ops::Range<usize> {
    let words = len.saturating_sub(COMMAND_ID_SIZE) / WORD_SIZE;
    let end = COMMAND_ID_SIZE + words.saturating_sub(1) * WORD_SIZE;
    COMMAND_ID_SIZE..end.max(COMMAND_ID_SIZE)
}

/// Converts the integer words of a frame from host to network byte order, in place.
///
/// The command ID and the CRC trailer are left untouched. `buf.len()` should be
/// a multiple of four.
pub fn host_to_network(buf: &mut [u8]) {
    let region = word_region(buf.len());
    for word in buf[region].chunks_exact_mut(WORD_SIZE) {
        let value = NativeEndian::read_u32(word);
        BigEndian::write_u32(word, value);
    }
}

/// Converts the integer words of a frame from network to host byte order, in place.
///
/// The command ID and the CRC trailer are left untouched. `buf.len()` should be
/// a multiple of four.
pub fn network_to_host(buf: &mut [u8]) {
    let region = word_region(buf.len());
    for word in buf[region].chunks_exact_mut(WORD_SIZE) {
        let value = BigEndian::read_u32(word);
        NativeEndian::write_u32(word, value);
    }
}

/// One protocol frame: command ID plus payload. Length and CRC are derived on encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// The command ID.
    pub id: CommandId,

    /// Payload bytes in network byte order.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame without payload.
    ///
    /// # Arguments
    ///
    /// * `id` - The command ID of the frame.
    pub fn new(id: CommandId) -> Frame {
        Frame::with_payload(id, &[])
    }

    /// Creates a frame with raw payload bytes.
    #[inline]
    pub fn with_payload(id: CommandId, payload: &[u8]) -> Frame {
        Frame {
            id,
            payload: payload.to_vec(),
        }
    }

    /// Creates a frame whose payload is a list of 32-bit words in network byte order.
    pub fn with_words(id: CommandId, words: &[i32]) -> Frame {
        let mut payload = vec![0u8; words.len() * WORD_SIZE];
        BigEndian::write_i32_into(words, &mut payload);
        Frame { id, payload }
    }

    /// Payload word at `index` (0 is the first word after the length field).
    #[inline]
    pub fn word(&self, index: usize) -> Option<i32> {
        read_word(&self.payload, index)
    }

    /// Number of bytes `encode` produces.
    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.payload.len() + FRAME_OVERHEAD
    }

    /// Encodes the frame into `bytes`, returning the number of bytes used.
    pub fn encode_into(&self, bytes: &mut [u8]) -> Result<usize> {
        let total = self.encoded_len();
        if bytes.len() < total {
            error!(
                "Buffer too small: required {}, available {}",
                total,
                bytes.len()
            );
            return Err(Error::BufferOverflow {
                description: format!("{} bytes needed, {} available", total, bytes.len()),
            });
        }
        self.fill(&mut bytes[..total]);
        trace!(
            "Encoded frame {} with {} payload bytes",
            display_id(&self.id),
            self.payload.len()
        );
        Ok(total)
    }

    /// Encodes the frame into a new buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.encoded_len()];
        self.fill(&mut bytes);
        bytes
    }

    /// Writes header, payload and CRC into `bytes`, which must be exactly `encoded_len()` long.
    fn fill(&self, bytes: &mut [u8]) {
        bytes[..COMMAND_ID_SIZE].copy_from_slice(&self.id);
        BigEndian::write_u32(
            &mut bytes[COMMAND_ID_SIZE..FRAME_HEADER_SIZE],
            self.payload.len() as u32,
        );
        bytes[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + self.payload.len()]
            .copy_from_slice(&self.payload);
        let crc_pos = bytes.len() - CRC_SIZE;
        let crc = Crc32::compute(&bytes[..crc_pos]);
        BigEndian::write_u32(&mut bytes[crc_pos..], crc);
    }

    /// Decodes one complete frame, checking its declared length and CRC.
    pub fn decode(bytes: &[u8]) -> Result<Frame> {
        let total = declared_frame_len(bytes).ok_or_else(|| Error::ProtocolError {
            description: format!("frame too short: {} bytes", bytes.len()),
        })?;
        if bytes.len() < total {
            return Err(Error::ProtocolError {
                description: format!(
                    "frame truncated: header declares {} bytes, got {}",
                    total,
                    bytes.len()
                ),
            });
        }
        verify_crc(&bytes[..total])?;
        let mut id = [0u8; COMMAND_ID_SIZE];
        id.copy_from_slice(&bytes[..COMMAND_ID_SIZE]);
        Ok(Frame {
            id,
            payload: bytes[FRAME_HEADER_SIZE..total - CRC_SIZE].to_vec(),
        })
    }
}
