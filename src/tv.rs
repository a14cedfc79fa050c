pub mod noop;

use crate::endpoint::Endpoint;
use crate::identity::IdentityError;
use crate::pin::Pin;
use num_enum::TryFromPrimitive;
use std::io;

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("Connection timeout")]
    Timeout,
    #[error("Connection refused")]
    Refused,
    #[error("Cannot resolve address {0}")]
    Resolution(String),
    #[error("Network unreachable")]
    Unreachable,
    #[error("{0}")]
    Io(io::Error),
    #[error("Device did not accept our certificate: {0}")]
    Auth(String),
}

impl ConnectError {
    pub fn hint(&self, endpoint: &Endpoint) -> String {
        match self {
            Self::Timeout => format!("Is the device at {endpoint} powered on?"),
            Self::Refused => {
                "The device may not have the Android TV Remote service enabled.".to_string()
            }
            Self::Resolution(_) => "Please check the IP address is correct.".to_string(),
            Self::Unreachable => format!("Cannot reach {endpoint}. Check network connectivity."),
            Self::Io(_) => "Troubleshooting:\n\
                 - Verify the device IP address is correct\n\
                 - Ensure the device is powered on\n\
                 - Check network connectivity"
                .to_string(),
            Self::Auth(_) => "The device no longer trusts this client. Run again with --repair."
                .to_string(),
        }
    }
}

impl From<io::Error> for ConnectError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::ConnectionRefused => Self::Refused,
            io::ErrorKind::NetworkUnreachable | io::ErrorKind::HostUnreachable => {
                Self::Unreachable
            }
            _ => Self::Io(err),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PairingError {
    #[error("Invalid PIN")]
    InvalidPin,
    #[error("Pairing rejected on the device")]
    Rejected,
    #[error("Cannot initiate pairing: {0}")]
    Connect(#[from] ConnectError),
    #[error("Pairing protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

#[derive(thiserror::Error, Debug)]
#[error("{0}")]
pub struct SendError(#[from] pub io::Error);

/// Android key codes understood by the remote service.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive)]
pub enum KeyCode {
    MediaPlayPause = 85,
}

/// An open, authenticated session with one device.
pub trait Channel {
    fn send_key(&mut self, key: KeyCode) -> Result<(), SendError>;
    fn close(&mut self);
}

/// A started pairing handshake, waiting for the PIN shown on screen.
pub trait PairingSession {
    fn finish(&mut self, pin: &Pin) -> Result<(), PairingError>;
}

pub trait Transport {
    type Channel: Channel;
    type Pairing: PairingSession;

    /// Whether a usable local identity is already on disk.
    fn identity_present(&self) -> bool;
    /// Creates the local identity if missing. Never replaces an existing one.
    fn ensure_identity(&mut self) -> Result<(), IdentityError>;
    fn start_pairing(&mut self, endpoint: &Endpoint) -> Result<Self::Pairing, PairingError>;
    fn connect(&mut self, endpoint: &Endpoint) -> Result<Self::Channel, ConnectError>;
}
