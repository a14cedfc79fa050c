use crate::config::StoreError;
use crate::endpoint::{Endpoint, InvalidAddress};
use crate::identity::IdentityError;
use crate::tv::{ConnectError, SendError};
use std::io;

/// Every way a run can end without the key being delivered.
#[derive(thiserror::Error, Debug)]
pub enum Failure {
    #[error(transparent)]
    Config(#[from] InvalidAddress),
    #[error("Pairing was rejected on the device")]
    PairingRejected,
    #[error("Pairing failed: {0}")]
    PairingProtocol(String),
    #[error("Cannot connect to {endpoint}: {source}")]
    Connect {
        endpoint: Endpoint,
        source: ConnectError,
    },
    #[error("Failed to send play/pause: {0}")]
    Send(#[from] SendError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Cannot read input: {0}")]
    Input(#[from] io::Error),
    #[error("Aborted")]
    Aborted,
}

impl Failure {
    /// What the user can do about it.
    pub fn hint(&self) -> String {
        match self {
            Self::Config(_) => "Expected four numbers 0-255 separated by dots, e.g. 192.168.1.20."
                .to_string(),
            Self::PairingRejected => {
                "Accept the pairing request on the TV screen and try again.".to_string()
            }
            Self::PairingProtocol(_) => {
                "Make sure the TV shows the pairing screen, then run again with --repair."
                    .to_string()
            }
            Self::Connect { endpoint, source } => source.hint(endpoint),
            Self::Send(_) => "The connection dropped. Try again.".to_string(),
            Self::Identity(_) => {
                "Check the certificate files in the config directory are readable.".to_string()
            }
            Self::Store(_) => "Check the config file is readable and writable.".to_string(),
            Self::Input(_) | Self::Aborted => "Nothing was sent.".to_string(),
        }
    }
}
