use crc32fast::Hasher;
use std::fmt;

/// Running CRC-32 (IEEE 802.3, reflected polynomial 0x04C11DB7) over PS frames.
///
/// Initial remainder and final XOR are both `0xFFFFFFFF`. The lookup tables are
/// compile-time constants of `crc32fast`, so no instance ever initializes shared state.
#[derive(Clone, Default)]
pub struct Crc32 {
    hasher: Hasher,
    length: usize,
}

impl Crc32 {
    /// Creates a new `Crc32` in its initial state.
    #[inline]
    pub fn new() -> Crc32 {
        Crc32 {
            hasher: Hasher::new(),
            length: 0,
        }
    }

    /// Resets the checksum to its initial state.
    #[inline]
    pub fn reset(&mut self) {
        self.hasher.reset();
        self.length = 0;
    }

    /// Adds more bytes and returns the CRC of everything added so far.
    ///
    /// # Arguments
    ///
    /// * `data` - The bytes to include in the checksum.
    pub fn update(&mut self, data: &[u8]) -> u32 {
        self.hasher.update(data);
        self.length += data.len();
        self.finalize()
    }

    /// Returns the CRC of the bytes added since the last reset without resetting.
    #[inline]
    pub fn finalize(&self) -> u32 {
        if self.length == 0 {
            return 0;
        }
        self.hasher.clone().finalize()
    }

    /// Number of bytes added since the last reset.
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if nothing was added since the last reset.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Computes the CRC of a complete buffer. An empty buffer yields 0.
    #[inline]
    pub fn compute(data: &[u8]) -> u32 {
        if data.is_empty() {
            return 0;
        }
        crc32fast::hash(data)
    }
}

impl fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crc32")
            .field("length", &self.length)
            .field("crc", &format_args!("{:08X}", self.finalize()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Crc32;

    #[test]
    fn matches_reference_vector() {
        assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(Crc32::compute(&[]), 0);
        assert_eq!(Crc32::new().finalize(), 0);
    }

    #[test]
    fn incremental_update_matches_compute() {
        let mut crc = Crc32::new();
        crc.update(b"1234");
        let running = crc.update(b"56789");
        assert_eq!(running, 0xCBF43926);
        assert_eq!(crc.finalize(), 0xCBF43926);
        assert_eq!(crc.len(), 9);

        crc.reset();
        assert!(crc.is_empty());
        assert_eq!(crc.update(b"123456789"), 0xCBF43926);
    }
}
