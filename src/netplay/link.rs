// TCP peer link
//
// Wire format:
// - hello, 6 bytes each way: "NRNP", protocol version (u8), role (u8)
// - then one 8-byte InputRecord per frame in each direction

use super::{InputRecord, PeerError, PeerLink, Role};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};

const MAGIC: [u8; 4] = *b"NRNP";

/// Wire protocol version; peers must match exactly
pub const PROTOCOL_VERSION: u8 = 1;

const HELLO_SIZE: usize = 6;

/// Poll interval while waiting for the guest
const ACCEPT_POLL: Duration = Duration::from_millis(10);

/// Blocking TCP connection to the peer
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    role: Role,
    peer: SocketAddr,
}

impl TcpLink {
    /// Listen on `addr` and wait up to `timeout` for a guest
    pub fn host<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self, PeerError> {
        let listener = TcpListener::bind(addr)?;
        tracing::info!("netplay: waiting for guest on {}", listener.local_addr()?);
        Self::accept(&listener, timeout)
    }

    /// Wait up to `timeout` for a guest on an already bound listener
    pub fn accept(listener: &TcpListener, timeout: Duration) -> Result<Self, PeerError> {
        listener.set_nonblocking(true)?;
        let deadline = Instant::now() + timeout;

        let stream = loop {
            match listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(PeerError::Timeout);
                    }
                    thread::sleep(ACCEPT_POLL);
                }
                Err(e) => return Err(e.into()),
            }
        };
        stream.set_nonblocking(false)?;
        Self::handshake(stream, Role::Host, timeout)
    }

    /// Connect to a host at `addr`
    pub fn join<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self, PeerError> {
        let mut last_error = PeerError::Handshake("address did not resolve".to_string());
        for candidate in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => return Self::handshake(stream, Role::Guest, timeout),
                Err(e) => last_error = e.into(),
            }
        }
        Err(last_error)
    }

    fn handshake(mut stream: TcpStream, role: Role, timeout: Duration) -> Result<Self, PeerError> {
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        let peer = stream.peer_addr()?;

        let mut hello = [0u8; HELLO_SIZE];
        hello[..4].copy_from_slice(&MAGIC);
        hello[4] = PROTOCOL_VERSION;
        hello[5] = encode_role(role);
        stream.write_all(&hello)?;

        let mut reply = [0u8; HELLO_SIZE];
        stream.read_exact(&mut reply)?;

        if reply[..4] != MAGIC {
            return Err(PeerError::Handshake("not a netplay peer".to_string()));
        }
        if reply[4] != PROTOCOL_VERSION {
            return Err(PeerError::Handshake(format!(
                "protocol version {} (expected {})",
                reply[4], PROTOCOL_VERSION
            )));
        }
        match decode_role(reply[5]) {
            Some(peer_role) if peer_role != role => {}
            Some(peer_role) => {
                return Err(PeerError::Handshake(format!(
                    "both sides are {:?}",
                    peer_role
                )))
            }
            None => return Err(PeerError::Handshake(format!("bad role byte {}", reply[5]))),
        }

        tracing::info!("netplay: connected to {} as {:?}", peer, role);
        Ok(Self { stream, role, peer })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl PeerLink for TcpLink {
    fn exchange(&mut self, local: &InputRecord) -> Result<InputRecord, PeerError> {
        self.stream.write_all(&local.to_bytes())?;
        let mut bytes = [0u8; InputRecord::SIZE];
        self.stream.read_exact(&mut bytes)?;
        Ok(InputRecord::from_bytes(bytes))
    }
}

fn encode_role(role: Role) -> u8 {
    match role {
        Role::Host => 0,
        Role::Guest => 1,
    }
}

fn decode_role(byte: u8) -> Option<Role> {
    match byte {
        0 => Some(Role::Host),
        1 => Some(Role::Guest),
        _ => None,
    }
}
