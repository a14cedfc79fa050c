//! The connection state machine: decide whether to pair, make sure an
//! identity exists, pair if needed, connect, send, close.
//!
//! ```text
//! Start -> NeedsPairing | HasCredential -> CertReady -> [Pairing -> Paired]
//!       -> Connecting -> Connected -> Done
//! ```
//!
//! Any error moves to `Failed`, which is final. Nothing is retried.

use crate::config::{Config, CredentialStore, CERT_KEY};
use crate::dispatch;
use crate::endpoint::Endpoint;
use crate::error::Failure;
use crate::pairing;
use crate::prompt::Prompt;
use crate::tv::{Channel, Transport};
use log::debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Start,
    NeedsPairing,
    HasCredential,
    CertReady,
    Pairing,
    Paired,
    Connecting,
    Connected,
    Done,
    Failed,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Settings {
    /// Pair even if a credential for the host is stored.
    pub force_repair: bool,
    pub max_pin_attempts: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            force_repair: false,
            max_pin_attempts: pairing::DEFAULT_MAX_PIN_ATTEMPTS,
        }
    }
}

pub struct Orchestrator<'a, T: Transport> {
    settings: Settings,
    config: Config,
    store: &'a mut dyn CredentialStore,
    transport: T,
    prompt: &'a mut dyn Prompt,
    trail: Vec<State>,
}

impl<'a, T: Transport> Orchestrator<'a, T> {
    pub fn new(
        settings: Settings,
        config: Config,
        store: &'a mut dyn CredentialStore,
        transport: T,
        prompt: &'a mut dyn Prompt,
    ) -> Self {
        Self {
            settings,
            config,
            store,
            transport,
            prompt,
            trail: vec![],
        }
    }

    /// States visited so far, in order.
    pub fn states(&self) -> &[State] {
        &self.trail
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&mut self, endpoint: &Endpoint) -> Result<(), Failure> {
        self.enter(State::Start);
        let needs_pairing = self.needs_pairing(endpoint);
        self.enter(if needs_pairing {
            State::NeedsPairing
        } else {
            State::HasCredential
        });
        match self.proceed(endpoint, needs_pairing) {
            Ok(()) => {
                self.enter(State::Done);
                Ok(())
            }
            Err(e) => {
                debug!("Run failed: {}", e);
                self.enter(State::Failed);
                Err(e)
            }
        }
    }

    fn needs_pairing(&self, endpoint: &Endpoint) -> bool {
        if self.settings.force_repair {
            debug!("Re-pairing requested");
            return true;
        }
        match &self.config.marker {
            None => {
                debug!("No stored credential");
                true
            }
            Some(marker) if !marker.is_for(endpoint) => {
                debug!("Stored credential is not for {}", endpoint);
                true
            }
            Some(_) if !self.transport.identity_present() => {
                debug!("Stored credential without identity files, treating as stale");
                true
            }
            Some(_) => false,
        }
    }

    fn proceed(&mut self, endpoint: &Endpoint, needs_pairing: bool) -> Result<(), Failure> {
        self.transport.ensure_identity()?;
        self.enter(State::CertReady);

        if needs_pairing {
            self.enter(State::Pairing);
            let marker = pairing::negotiate(
                &mut self.transport,
                endpoint,
                &mut *self.prompt,
                self.settings.max_pin_attempts,
            )?;
            self.store.set(CERT_KEY, marker.as_str())?;
            self.prompt
                .say(&format!("Credentials saved to {}", self.store.location()));
            self.config.marker = Some(marker);
            self.enter(State::Paired);
        }

        self.enter(State::Connecting);
        self.prompt.say(&format!("Connecting to {endpoint}..."));
        let mut channel = self
            .transport
            .connect(endpoint)
            .map_err(|source| Failure::Connect {
                endpoint: *endpoint,
                source,
            })?;
        self.enter(State::Connected);

        let result = dispatch::play_pause(&mut channel, &mut *self.prompt);
        channel.close();
        result
    }

    fn enter(&mut self, state: State) {
        debug!("State {:?}", state);
        self.trail.push(state);
    }
}
