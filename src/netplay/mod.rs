// Netplay module - peer-synchronized controller input
//
// Two instances exchange one input record per frame. The host plays on
// controller port 1 and the guest on port 2; the port bindings are derived
// from (status, role) and recomputed on every status change.

mod link;

pub use link::{TcpLink, PROTOCOL_VERSION};

use crate::input::{GamepadState, Port};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Errors raised by a peer link; all of them end the session
#[derive(Debug, Error)]
pub enum PeerError {
    /// The peer did not answer within the link timeout
    #[error("peer timed out")]
    Timeout,

    /// The connection was closed or reset
    #[error("peer disconnected")]
    Disconnected,

    /// The peer is not a compatible partner
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The peer sent a record for another frame
    #[error("out of sync: expected frame {expected}, peer sent {found}")]
    OutOfSync { expected: u32, found: u32 },

    /// Other socket error
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for PeerError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => PeerError::Timeout,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => PeerError::Disconnected,
            _ => PeerError::Io(e),
        }
    }
}

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetplayStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Side of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Listens for the peer; plays on port 1
    #[default]
    Host,
    /// Connects to the host; plays on port 2
    Guest,
}

/// Notification from the netplay layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetplayEvent {
    StatusChanged(NetplayStatus),
    RoleChanged(Role),
}

/// Effect of a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Entered Connected
    Gained,
    /// Left Connected
    Lost,
    Unchanged,
}

/// One frame of controller input as sent over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputRecord {
    pub frame: u32,
    pub buttons: u32,
}

impl InputRecord {
    /// Encoded size in bytes
    pub const SIZE: usize = 8;

    /// Little-endian frame number followed by little-endian button bits
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..4].copy_from_slice(&self.frame.to_le_bytes());
        bytes[4..].copy_from_slice(&self.buttons.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self {
            frame: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            buttons: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Transport carrying input records to and from the peer
pub trait PeerLink {
    /// Send the local record and wait for the peer's record of the same frame
    fn exchange(&mut self, local: &InputRecord) -> Result<InputRecord, PeerError>;
}

/// Netplay session state
pub struct Netplay {
    status: NetplayStatus,
    role: Role,
    link: Option<Box<dyn PeerLink>>,
    frame: u32,
    local_port: Port,
}

impl Netplay {
    /// Disconnected session for `role`
    pub fn new(role: Role) -> Self {
        Self {
            status: NetplayStatus::Disconnected,
            role,
            link: None,
            frame: 0,
            local_port: Port::One,
        }
    }

    pub fn status(&self) -> NetplayStatus {
        self.status
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_connected(&self) -> bool {
        self.status == NetplayStatus::Connected
    }

    /// Port driven by the local player
    pub fn local_port(&self) -> Port {
        self.local_port
    }

    /// Port driven by the peer
    pub fn remote_port(&self) -> Port {
        self.local_port.other()
    }

    /// Install a connected link; the session becomes Connected
    pub fn attach(&mut self, link: Box<dyn PeerLink>) -> Transition {
        self.link = Some(link);
        self.frame = 0;
        self.set_status(NetplayStatus::Connected)
    }

    /// Change the status and rebind ports
    ///
    /// Leaving Connected drops the link. Connected without an attached
    /// link is held at Connecting until [`Netplay::attach`] supplies one.
    pub fn set_status(&mut self, status: NetplayStatus) -> Transition {
        let was_connected = self.is_connected();
        self.status = match status {
            NetplayStatus::Connected if self.link.is_none() => NetplayStatus::Connecting,
            other => other,
        };
        if self.status != NetplayStatus::Connected {
            self.link = None;
        }
        self.rebind();

        match (was_connected, self.is_connected()) {
            (false, true) => Transition::Gained,
            (true, false) => Transition::Lost,
            _ => Transition::Unchanged,
        }
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.rebind();
    }

    fn rebind(&mut self) {
        self.local_port = match (self.status, self.role) {
            (NetplayStatus::Connected, Role::Guest) => Port::Two,
            _ => Port::One,
        };
    }

    /// Trade this frame's local buttons for the peer's
    pub fn exchange(&mut self, local: GamepadState) -> Result<GamepadState, PeerError> {
        if !self.is_connected() {
            return Err(PeerError::Disconnected);
        }
        let link = self.link.as_mut().ok_or(PeerError::Disconnected)?;

        let record = InputRecord {
            frame: self.frame,
            buttons: local.bits(),
        };
        let remote = link.exchange(&record)?;
        if remote.frame != self.frame {
            return Err(PeerError::OutOfSync {
                expected: self.frame,
                found: remote.frame,
            });
        }

        self.frame = self.frame.wrapping_add(1);
        Ok(GamepadState::from_bits_truncate(remote.buttons))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Link replaying scripted replies
    struct ScriptedLink {
        replies: VecDeque<Result<InputRecord, PeerError>>,
    }

    impl PeerLink for ScriptedLink {
        fn exchange(&mut self, _local: &InputRecord) -> Result<InputRecord, PeerError> {
            self.replies.pop_front().unwrap_or(Err(PeerError::Disconnected))
        }
    }

    fn link(replies: Vec<Result<InputRecord, PeerError>>) -> Box<dyn PeerLink> {
        Box::new(ScriptedLink {
            replies: replies.into(),
        })
    }

    #[test]
    fn test_record_encoding() {
        let record = InputRecord {
            frame: 0x0102_0304,
            buttons: 0x41,
        };
        assert_eq!(record.to_bytes(), [4, 3, 2, 1, 0x41, 0, 0, 0]);
        assert_eq!(InputRecord::from_bytes(record.to_bytes()), record);
    }

    #[test]
    fn test_transitions() {
        let mut session = Netplay::new(Role::Host);
        assert_eq!(
            session.set_status(NetplayStatus::Connecting),
            Transition::Unchanged
        );
        assert_eq!(session.attach(link(vec![])), Transition::Gained);
        assert_eq!(
            session.set_status(NetplayStatus::Connected),
            Transition::Unchanged
        );
        assert_eq!(
            session.set_status(NetplayStatus::Disconnected),
            Transition::Lost
        );
    }

    #[test]
    fn test_guest_binds_port_two_only_while_connected() {
        let mut session = Netplay::new(Role::Guest);
        assert_eq!(session.local_port(), Port::One);

        session.attach(link(vec![]));
        assert_eq!(session.local_port(), Port::Two);
        assert_eq!(session.remote_port(), Port::One);

        session.set_status(NetplayStatus::Disconnected);
        assert_eq!(session.local_port(), Port::One);

        session.attach(link(vec![]));
        assert_eq!(session.local_port(), Port::Two);
    }

    #[test]
    fn test_connected_without_link_waits_for_attach() {
        let mut session = Netplay::new(Role::Guest);
        assert_eq!(
            session.set_status(NetplayStatus::Connected),
            Transition::Unchanged
        );
        assert_eq!(session.status(), NetplayStatus::Connecting);
        assert!(!session.is_connected());
        assert_eq!(session.local_port(), Port::One);

        assert_eq!(session.attach(link(vec![])), Transition::Gained);
        assert_eq!(session.status(), NetplayStatus::Connected);
    }

    #[test]
    fn test_host_always_binds_port_one() {
        let mut session = Netplay::new(Role::Host);
        session.attach(link(vec![]));
        assert_eq!(session.local_port(), Port::One);
        session.set_role(Role::Guest);
        assert_eq!(session.local_port(), Port::Two);
    }

    #[test]
    fn test_exchange() {
        let mut session = Netplay::new(Role::Host);
        session.attach(link(vec![
            Ok(InputRecord {
                frame: 0,
                buttons: GamepadState::A.bits(),
            }),
            Ok(InputRecord {
                frame: 5,
                buttons: 0,
            }),
        ]));

        assert_eq!(session.exchange(GamepadState::B).unwrap(), GamepadState::A);
        assert!(matches!(
            session.exchange(GamepadState::empty()),
            Err(PeerError::OutOfSync {
                expected: 1,
                found: 5
            })
        ));
    }

    #[test]
    fn test_exchange_requires_connection() {
        let mut session = Netplay::new(Role::Host);
        assert!(matches!(
            session.exchange(GamepadState::empty()),
            Err(PeerError::Disconnected)
        ));
    }

    #[test]
    fn test_io_error_classification() {
        let timeout: PeerError = io::Error::new(io::ErrorKind::TimedOut, "t").into();
        assert!(matches!(timeout, PeerError::Timeout));
        let eof: PeerError = io::Error::new(io::ErrorKind::UnexpectedEof, "e").into();
        assert!(matches!(eof, PeerError::Disconnected));
    }
}
