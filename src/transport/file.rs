use super::uart::read_frame;
use crate::base::error::{Error, Result};
use crate::base::stream::DataStream;
use crate::internals::PS_MAX_FRAME_SIZE;
use log::{debug, trace};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Replays frames recorded in a data log, one frame per `read`.
///
/// Requests written to the stream are dropped, so a `PsDevice` on a `FileStream`
/// parses a recorded session offline. The end of the file reads as `Error::Timeout`.
#[derive(Debug)]
pub struct FileStream {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl FileStream {
    pub fn new<P: AsRef<Path>>(path: P) -> FileStream {
        FileStream {
            path: path.as_ref().to_path_buf(),
            reader: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataStream for FileStream {
    /// Opens the file and rewinds to the first frame.
    fn open(&mut self) -> Result<()> {
        self.close()?;
        let file = File::open(&self.path).map_err(|e| Error::InvalidParameter {
            description: format!("cannot open {}: {}", self.path.display(), e),
        })?;
        debug!("Replaying frames from {}", self.path.display());
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.reader.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let reader = self.reader.as_mut().ok_or_else(|| Error::InvalidHandle {
            description: "frame file is not open".to_owned(),
        })?;
        read_frame(reader, buf, PS_MAX_FRAME_SIZE, true)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if !self.is_open() {
            return Err(Error::InvalidHandle {
                description: "frame file is not open".to_owned(),
            });
        }
        trace!("Dropping {} byte request", buf.len());
        Ok(buf.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::{DataContent, Scan};
    use crate::base::error::ErrorId;
    use crate::base::frame::Frame;
    use crate::base::stream::mock::MockStream;
    use crate::commands::GscnCommand;
    use crate::parsers::scan_parser::tests::{parameters, scan_payload};
    use crate::PsDevice;
    use std::fs;
    use std::io;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("psdemo-{}-{}.log", name, std::process::id()))
    }

    #[test]
    fn replays_a_recorded_data_log() {
        let path = temp_path("replay");
        let params = parameters(1, DataContent::Distances);
        let mut sensor = MockStream::with_replies(vec![
            Frame::with_payload(*b"GSCN", &scan_payload(&params, 2, &[1500, 1600])).encode(),
            Frame::with_payload(*b"GSCN", &scan_payload(&params, 2, &[1700, 1800])).encode(),
        ]);
        {
            let mut log = fs::File::create(&path).unwrap();
            let mut cmd = GscnCommand::new(&mut sensor);
            let mut scan = Scan::new();
            for _ in 0..2 {
                cmd.perform_with_log(0, &mut scan, Some(&mut log as &mut dyn io::Write))
                    .unwrap();
            }
        }

        let mut stream = FileStream::new(&path);
        stream.open().unwrap();
        {
            let mut device = PsDevice::new(&mut stream);
            let first = device.get_scan(0).unwrap();
            let second = device.get_scan(0).unwrap();
            assert_eq!(first.samples(1).unwrap()[0].distance, 1600);
            assert_eq!(second.samples(0).unwrap()[0].distance, 1700);
            assert_eq!(device.get_scan(0).unwrap_err().id(), ErrorId::Timeout);
        }
        stream.close().unwrap();
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_and_closed_stream() {
        let mut stream = FileStream::new(temp_path("missing"));
        assert_eq!(stream.open().unwrap_err().id(), ErrorId::InvalidParameter);
        assert!(!stream.is_open());
        let mut buf = [0u8; 16];
        assert!(matches!(stream.read(&mut buf), Err(Error::InvalidHandle { .. })));
        assert!(matches!(stream.write(b"GVER"), Err(Error::InvalidHandle { .. })));
    }
}
