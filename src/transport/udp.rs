use crate::base::error::{Error, Result};
use crate::base::stream::DataStream;
use crate::internals::*;
use log::{debug, trace, warn};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Addresses and timeout of a UDP connection to a sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Local address the socket binds to.
    pub local: SocketAddr,
    /// Address of the sensor.
    pub remote: SocketAddr,
    /// Receive timeout, `None` blocks until a datagram arrives.
    pub timeout: Option<Duration>,
}

impl Default for UdpConfig {
    fn default() -> UdpConfig {
        UdpConfig {
            local: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), PS_DEFAULT_LOCAL_PORT),
            remote: SocketAddr::new(IpAddr::V4(PS_DEFAULT_SENSOR_ADDRESS), PS_DEFAULT_SENSOR_PORT),
            timeout: Some(PS_DEFAULT_TIMEOUT),
        }
    }
}

/// One frame per datagram over a connected UDP socket.
#[derive(Debug)]
pub struct UdpStream {
    config: UdpConfig,
    socket: Option<UdpSocket>,
}

impl UdpStream {
    pub fn new(config: UdpConfig) -> UdpStream {
        UdpStream {
            config,
            socket: None,
        }
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// Local address of the open socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket()?.local_addr()?)
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(|| Error::InvalidHandle {
            description: "UDP socket is not open".to_owned(),
        })
    }
}

impl DataStream for UdpStream {
    fn open(&mut self) -> Result<()> {
        self.close()?;
        debug!(
            "Opening UDP socket {} -> {}",
            self.config.local, self.config.remote
        );
        let socket = UdpSocket::bind(self.config.local)?;
        socket.connect(self.config.remote)?;
        let timeout = self.config.timeout.filter(|t| !t.is_zero());
        socket.set_read_timeout(timeout)?;
        self.socket = Some(socket);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.socket.take().is_some() {
            debug!("Closed UDP socket to {}", self.config.remote);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.socket()?.recv(buf) {
            Ok(0) => Err(Error::Timeout),
            Ok(received) => {
                trace!("Received datagram of {} bytes", received);
                Ok(received)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => {
                Err(Error::Timeout)
            }
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                // an earlier datagram was rejected by the peer
                warn!("{} refused a datagram", self.config.remote);
                Err(Error::Timeout)
            }
            Err(e) => Err(Error::ReadFailed(e)),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let sent = self.socket()?.send(buf).map_err(Error::WriteFailed)?;
        trace!("Sent datagram of {} bytes", sent);
        Ok(sent)
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.config.timeout = timeout;
        if let Some(socket) = &self.socket {
            socket.set_read_timeout(timeout.filter(|t| !t.is_zero()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn exchanges_datagrams_with_peer() {
        let peer = UdpSocket::bind(loopback()).unwrap();
        let mut stream = UdpStream::new(UdpConfig {
            local: loopback(),
            remote: peer.local_addr().unwrap(),
            timeout: Some(Duration::from_secs(2)),
        });
        assert!(!stream.is_open());
        stream.open().unwrap();
        assert!(stream.is_open());

        assert_eq!(stream.write(b"GVER\0\0\0\0abcd").unwrap(), 12);
        let mut buf = [0u8; 64];
        let (n, from) = peer.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"GVER\0\0\0\0abcd");
        assert_eq!(from, stream.local_addr().unwrap());

        peer.send_to(b"answer", from).unwrap();
        let n = stream.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"answer");

        stream.close().unwrap();
        assert!(!stream.is_open());
    }

    #[test]
    fn read_times_out_without_data() {
        let peer = UdpSocket::bind(loopback()).unwrap();
        let mut stream = UdpStream::new(UdpConfig {
            local: loopback(),
            remote: peer.local_addr().unwrap(),
            timeout: Some(Duration::from_millis(20)),
        });
        stream.open().unwrap();
        let mut buf = [0u8; 16];
        match stream.read(&mut buf) {
            Err(Error::Timeout) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn timeout_can_be_changed_while_open() {
        let peer = UdpSocket::bind(loopback()).unwrap();
        let mut stream = UdpStream::new(UdpConfig {
            local: loopback(),
            remote: peer.local_addr().unwrap(),
            timeout: None,
        });
        stream.open().unwrap();
        stream.set_timeout(Some(Duration::from_millis(10))).unwrap();
        assert_eq!(stream.config().timeout, Some(Duration::from_millis(10)));
        let mut buf = [0u8; 16];
        assert!(matches!(stream.read(&mut buf), Err(Error::Timeout)));
    }

    #[test]
    fn closed_stream_is_an_invalid_handle() {
        let mut stream = UdpStream::new(UdpConfig::default());
        let mut buf = [0u8; 4];
        assert!(matches!(stream.read(&mut buf), Err(Error::InvalidHandle { .. })));
        assert!(matches!(stream.write(b"GVER"), Err(Error::InvalidHandle { .. })));
    }
}
