use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::CameraStream;

/// Port cameras listen on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 80;

/// TCP transport to a camera.
///
/// Resolves `host:port` and tries each resolved address in turn, each one
/// bounded by the connect timeout. The last failure is reported if none of
/// them accepts the connection.
pub struct TcpTransport;

impl TcpTransport {
    /// Connect to a camera (blocking, bounded by `timeout`).
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<CameraStream> {
        let addrs = resolve(host, port)?;

        let mut last_err = None;
        for addr in addrs {
            debug!(%addr, ?timeout, "connecting to camera");
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    info!(%addr, "connected to camera");
                    return Ok(CameraStream::from_tcp(stream, addr));
                }
                Err(source) => {
                    debug!(%addr, error = %source, "connect attempt failed");
                    last_err = Some(TransportError::Connect {
                        addr: addr.to_string(),
                        source,
                    });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::NoAddress {
            host: host.to_string(),
        }))
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "tcp"
    }
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::NoAddress {
            host: host.to_string(),
        });
    }
    Ok(addrs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{ErrorKind, Read, Write};
    use std::net::TcpListener;

    #[test]
    fn test_connect_and_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = std::thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            server.read_exact(&mut buf).unwrap();
            server.write_all(&buf).unwrap();
        });

        let mut client = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        client.write_all(b"hello").unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hello");
        assert_eq!(client.peer_addr().port(), port);

        handle.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = TcpTransport::connect("127.0.0.1", port, Duration::from_millis(500));
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_unresolvable_host() {
        let result = TcpTransport::connect("host.invalid.", 80, Duration::from_millis(500));
        assert!(matches!(
            result,
            Err(TransportError::Resolve { .. }) | Err(TransportError::NoAddress { .. })
        ));
    }

    #[test]
    fn test_read_timeout_applies() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();
        let (_server, _) = listener.accept().unwrap();

        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let mut buf = [0u8; 1];
        let err = client.peek(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
    }

    #[test]
    fn test_zero_timeout_means_blocking() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = TcpTransport::connect("127.0.0.1", port, Duration::from_secs(2)).unwrap();

        assert!(client.set_read_timeout(Some(Duration::ZERO)).is_ok());
        assert!(client.set_write_timeout(Some(Duration::ZERO)).is_ok());
    }

    #[test]
    fn test_timeout_classification() {
        let err = TransportError::Io(std::io::Error::from(ErrorKind::TimedOut));
        assert!(err.is_timeout());
        let err = TransportError::NoAddress {
            host: "x".to_string(),
        };
        assert!(!err.is_timeout());
    }
}
