//! Connection endpoints used by the delivery state machine.
//!
//! The state machine drives a [`Connection`] through connect, send, receive
//! and close, one call per scheduler cycle, and treats would-block results as
//! "try again next cycle". [`TcpTransport`] is the production implementation.

use crate::error::{AppResult, GatewayError};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use tracing::{debug, trace};

/// Factory for connection endpoints.
pub trait Transport {
    /// Endpoint type produced by [`Transport::open`].
    type Connection: Connection;

    /// Create a new, not yet connected endpoint.
    fn open(&mut self) -> io::Result<Self::Connection>;
}

/// One stream connection to the collector.
///
/// All methods must return promptly. `WouldBlock` and `Interrupted` errors are
/// retried by the caller on a later cycle.
pub trait Connection {
    /// Establish the connection. Calling it again once connected is a no-op.
    fn connect(&mut self) -> io::Result<()>;

    /// Send as much of `buf` as possible, returning how many bytes went out.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Receive into `buf`. `Ok(0)` means the peer closed the connection.
    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the endpoint. Closing an endpoint that never connected reports
    /// `NotConnected`.
    fn close(&mut self) -> io::Result<()>;
}

/// True for errors that only mean "not yet".
pub(crate) fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// True when a non-blocking connect was accepted but has not completed.
fn connect_in_progress(err: &io::Error) -> bool {
    is_einprogress(err) || is_transient(err)
}

#[cfg(unix)]
fn is_einprogress(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINPROGRESS)
}

#[cfg(not(unix))]
fn is_einprogress(_err: &io::Error) -> bool {
    false
}

/// TCP transport to a collector address resolved once at start-up.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    addr: SocketAddr,
}

impl TcpTransport {
    /// Resolve `host:port`, preferring an IPv4 address.
    pub fn resolve(host: &str, port: u16) -> AppResult<Self> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| GatewayError::UnknownHost(format!("{host}: {e}")))?
            .collect();

        let addr = addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| GatewayError::UnknownHost(host.to_string()))?;

        Ok(Self::new(addr))
    }

    /// Use an already known address.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Collector address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;

    fn open(&mut self) -> io::Result<TcpConnection> {
        let socket = Socket::new(
            Domain::for_address(self.addr),
            Type::STREAM,
            Some(Protocol::TCP),
        )?;
        socket.set_nonblocking(true)?;
        socket.set_nodelay(true)?;
        Ok(TcpConnection {
            addr: self.addr,
            socket,
            state: ConnectState::Fresh,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectState {
    Fresh,
    Pending,
    Connected,
    Closed,
}

/// Non-blocking TCP socket.
///
/// The connect is started on the first [`Connection::connect`] call and polled
/// on later calls until the socket reports a peer or an error.
#[derive(Debug)]
pub struct TcpConnection {
    addr: SocketAddr,
    socket: Socket,
    state: ConnectState,
}

impl TcpConnection {
    fn connected(&mut self) -> io::Result<&mut Socket> {
        match self.state {
            ConnectState::Connected => Ok(&mut self.socket),
            _ => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    fn poll_pending(&mut self) -> io::Result<()> {
        if let Some(e) = self.socket.take_error()? {
            return Err(e);
        }
        match self.socket.peer_addr() {
            Ok(_) => {
                self.state = ConnectState::Connected;
                debug!(addr = %self.addr, "tcp connected");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {
                Err(io::ErrorKind::WouldBlock.into())
            }
            Err(e) => Err(e),
        }
    }
}

impl Connection for TcpConnection {
    fn connect(&mut self) -> io::Result<()> {
        match self.state {
            ConnectState::Connected => Ok(()),
            ConnectState::Pending => self.poll_pending(),
            ConnectState::Closed => Err(io::ErrorKind::NotConnected.into()),
            ConnectState::Fresh => match self.socket.connect(&SockAddr::from(self.addr)) {
                Ok(()) => {
                    self.state = ConnectState::Connected;
                    debug!(addr = %self.addr, "tcp connected");
                    Ok(())
                }
                Err(e) if connect_in_progress(&e) => {
                    trace!(addr = %self.addr, "tcp connect in progress");
                    self.state = ConnectState::Pending;
                    Err(io::ErrorKind::WouldBlock.into())
                }
                Err(e) => Err(e),
            },
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.connected()?.write(buf)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connected()?.read(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        match std::mem::replace(&mut self.state, ConnectState::Closed) {
            ConnectState::Fresh | ConnectState::Closed => Err(io::ErrorKind::NotConnected.into()),
            ConnectState::Pending | ConnectState::Connected => {
                match self.socket.shutdown(Shutdown::Both) {
                    Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
                    _ => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    /// Call `connect` until it stops reporting "not yet".
    fn connect_polled(conn: &mut TcpConnection) -> io::Result<()> {
        for _ in 0..200 {
            match conn.connect() {
                Err(e) if is_transient(&e) => thread::sleep(Duration::from_millis(5)),
                other => return other,
            }
        }
        Err(io::ErrorKind::TimedOut.into())
    }

    #[test]
    fn test_resolve_localhost() {
        let transport = TcpTransport::resolve("127.0.0.1", 5760).unwrap();
        assert_eq!(transport.addr().port(), 5760);
        assert!(transport.addr().is_ipv4());
    }

    #[test]
    fn test_resolve_unknown_host_fails() {
        let err = TcpTransport::resolve("no-such-host.invalid", 80);
        assert!(matches!(err, Err(GatewayError::UnknownHost(_))));
    }

    #[test]
    fn test_close_without_connect_reports_not_connected() {
        let mut transport = TcpTransport::new(([127, 0, 0, 1], 9).into());
        let mut conn = transport.open().unwrap();
        let err = conn.close().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_send_before_connect_reports_not_connected() {
        let mut transport = TcpTransport::new(([127, 0, 0, 1], 9).into());
        let mut conn = transport.open().unwrap();
        let err = conn.send(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_connect_send_receive() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut transport = TcpTransport::new(addr);
        let mut conn = transport.open().unwrap();
        connect_polled(&mut conn).unwrap();
        // Further calls are no-ops
        conn.connect().unwrap();

        let (mut server, _) = listener.accept().unwrap();
        assert_eq!(conn.send(b"ping").unwrap(), 4);

        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        // Nothing sent back yet: non-blocking read would block
        let err = conn.receive(&mut buf).unwrap_err();
        assert!(is_transient(&err));

        conn.close().unwrap();
    }

    #[test]
    fn test_connect_to_closed_port_is_refused() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let mut transport = TcpTransport::new(addr);
        let mut conn = transport.open().unwrap();

        let err = connect_polled(&mut conn).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn test_connect_does_not_wait_for_the_peer() {
        // Unroutable address: the handshake never completes, the call returns anyway
        let mut transport = TcpTransport::new(([10, 255, 255, 1], 80).into());
        let mut conn = transport.open().unwrap();

        let started = std::time::Instant::now();
        let _ = conn.connect();
        assert!(started.elapsed() < Duration::from_millis(250));
    }
}
