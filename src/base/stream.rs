use crate::base::error::Result;
use std::time::Duration;

/// Low-level byte stream a PS sensor is reached through (UDP socket, serial port, ...).
///
/// The application that opens a stream also closes it; protocol components only
/// borrow it for the duration of a request/response cycle.
pub trait DataStream {
    /// Opens and resets the stream.
    fn open(&mut self) -> Result<()>;

    /// Closes the stream and releases any system resources associated with it.
    fn close(&mut self) -> Result<()>;

    /// Returns `true` if the stream is ready to be used.
    fn is_open(&self) -> bool;

    /// Reads up to `buf.len()` bytes of one frame into `buf`.
    ///
    /// Returns the number of bytes received. A read that sees no data before the
    /// configured timeout returns `Error::Timeout`, not `Ok(0)`.
    ///
    /// # Arguments
    ///
    /// * `buf` - The buffer to fill.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Writes the bytes of `buf` to the stream and returns the number of bytes written.
    ///
    /// # Arguments
    ///
    /// * `buf` - The bytes to send.
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Changes the read timeout of an open stream, `None` for the stream's polling mode.
    ///
    /// Streams without a notion of timeout ignore this.
    fn set_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }
}

impl<S: DataStream + ?Sized> DataStream for Box<S> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        (**self).set_timeout(timeout)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::DataStream;
    use crate::base::error::{Error, Result};
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    /// One scripted answer of a `MockStream` read.
    #[derive(Debug)]
    pub enum Reply {
        Bytes(Vec<u8>),
        Timeout,
        Fail,
        Error(Error),
    }

    /// In-memory stream: reads pop scripted replies, writes are recorded.
    #[derive(Debug, Default)]
    pub struct MockStream {
        pub replies: VecDeque<Reply>,
        pub written: Vec<Vec<u8>>,
        pub fail_writes: bool,
        pub open: bool,
        pub timeout: Option<Duration>,
    }

    impl MockStream {
        pub fn new() -> MockStream {
            MockStream {
                open: true,
                ..MockStream::default()
            }
        }

        pub fn with_replies(replies: Vec<Vec<u8>>) -> MockStream {
            let mut stream = MockStream::new();
            for reply in replies {
                stream.push(reply);
            }
            stream
        }

        pub fn push(&mut self, bytes: Vec<u8>) {
            self.replies.push_back(Reply::Bytes(bytes));
        }
    }

    impl DataStream for MockStream {
        fn open(&mut self) -> Result<()> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.open = false;
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
            match self.replies.pop_front() {
                Some(Reply::Bytes(bytes)) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Some(Reply::Fail) => Err(Error::ReadFailed(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "scripted read failure",
                ))),
                Some(Reply::Error(e)) => Err(e),
                Some(Reply::Timeout) | None => Err(Error::Timeout),
            }
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize> {
            if self.fail_writes {
                return Err(Error::WriteFailed(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "scripted write failure",
                )));
            }
            self.written.push(buf.to_vec());
            Ok(buf.len())
        }

        fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
            self.timeout = timeout;
            Ok(())
        }
    }
}
