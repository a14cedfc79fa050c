use crate::endpoint::Endpoint;
use crate::identity::IdentityError;
use crate::pin::Pin;
use crate::tv::{Channel, ConnectError, KeyCode, PairingError, PairingSession, SendError, Transport};
use log::info;

/// Transport that talks to nothing and logs what it would have done.
#[derive(Default)]
pub struct LogOnlyTransport {
    identity: bool,
}

pub struct LogOnlyPairing;

pub struct LogOnlyChannel {
    endpoint: Endpoint,
}

impl Transport for LogOnlyTransport {
    type Channel = LogOnlyChannel;
    type Pairing = LogOnlyPairing;

    fn identity_present(&self) -> bool {
        self.identity
    }
    fn ensure_identity(&mut self) -> Result<(), IdentityError> {
        info!("faking identity generation");
        self.identity = true;
        Ok(())
    }
    fn start_pairing(&mut self, endpoint: &Endpoint) -> Result<LogOnlyPairing, PairingError> {
        info!("faking pairing start with {}", endpoint);
        Ok(LogOnlyPairing)
    }
    fn connect(&mut self, endpoint: &Endpoint) -> Result<LogOnlyChannel, ConnectError> {
        info!("faking connection to {}", endpoint);
        Ok(LogOnlyChannel {
            endpoint: *endpoint,
        })
    }
}

impl PairingSession for LogOnlyPairing {
    fn finish(&mut self, pin: &Pin) -> Result<(), PairingError> {
        info!("accepting fake pin {:?}", pin);
        Ok(())
    }
}

impl Channel for LogOnlyChannel {
    fn send_key(&mut self, key: KeyCode) -> Result<(), SendError> {
        info!("faking key {:?} to {}", key, self.endpoint);
        Ok(())
    }
    fn close(&mut self) {
        info!("faking disconnect from {}", self.endpoint);
    }
}
