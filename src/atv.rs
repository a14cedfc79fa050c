// Android TV Remote v2 transport.
//
// Two TLS services on the device: pairing on 6467, remote control on 6466.
// Both authenticate us with the same self-signed client certificate.

pub mod pairing;
pub mod remote;
pub mod tls;
pub mod wire;

use crate::endpoint::Endpoint;
use crate::identity::{Identity, IdentityError};
use crate::tv::{ConnectError, PairingError, Transport};
use std::time::Duration;

pub const CONTROL_PORT: u16 = 6466;
pub const PAIRING_PORT: u16 = 6467;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct AtvTransport {
    identity: Identity,
    client_name: String,
    timeout: Duration,
}

impl AtvTransport {
    pub fn new(identity: Identity, client_name: &str, timeout: Duration) -> Self {
        Self {
            identity,
            client_name: client_name.to_string(),
            timeout,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Transport for AtvTransport {
    type Channel = remote::AtvChannel;
    type Pairing = pairing::AtvPairing;

    fn identity_present(&self) -> bool {
        self.identity.is_present()
    }

    fn ensure_identity(&mut self) -> Result<(), IdentityError> {
        self.identity.ensure()?;
        Ok(())
    }

    fn start_pairing(&mut self, endpoint: &Endpoint) -> Result<pairing::AtvPairing, PairingError> {
        let (cert, key) = self.identity.load()?;
        let connector = tls::connector(&cert, &key).map_err(IdentityError::from)?;
        let stream = tls::connect(endpoint, PAIRING_PORT, &connector, self.timeout)?;
        pairing::AtvPairing::start(stream, &self.client_name, cert)
    }

    fn connect(&mut self, endpoint: &Endpoint) -> Result<remote::AtvChannel, ConnectError> {
        let (cert, key) = self
            .identity
            .load()
            .map_err(|e| ConnectError::Auth(e.to_string()))?;
        let connector = tls::connector(&cert, &key).map_err(|e| ConnectError::Auth(e.to_string()))?;
        let stream = tls::connect(endpoint, CONTROL_PORT, &connector, self.timeout)?;
        remote::AtvChannel::open(stream, &self.client_name)
    }
}
