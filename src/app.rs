//! One invocation: work out which device to talk to, then hand over to the
//! orchestrator.

use crate::config::{Config, CredentialStore, HOST_KEY};
use crate::endpoint::Endpoint;
use crate::error::Failure;
use crate::orchestrator::{Orchestrator, Settings};
use crate::prompt::Prompt;
use crate::tv::Transport;
use log::{debug, warn};

const HOST_QUESTION: &str = "Enter the Android TV IP address: ";

#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Overrides the stored host for this run only.
    pub host: Option<String>,
    pub settings: Settings,
}

/// Picks the device: the flag if given (no prompting, not saved), else the
/// stored host, else asks until a valid address is entered and saves it.
pub fn resolve_endpoint(
    flag: Option<&str>,
    config: &Config,
    store: &mut dyn CredentialStore,
    prompt: &mut dyn Prompt,
) -> Result<Endpoint, Failure> {
    if let Some(host) = flag {
        return Ok(host.trim().parse()?);
    }
    if let Some(host) = &config.host {
        match host.trim().parse::<Endpoint>() {
            Ok(endpoint) => {
                debug!("Using stored host {}", endpoint);
                return Ok(endpoint);
            }
            Err(e) => {
                warn!("Ignoring stored host: {}", e);
                prompt.say(&format!("Stored host is not valid ({e})."));
            }
        }
    }
    loop {
        let Some(line) = prompt.ask(HOST_QUESTION)? else {
            return Err(Failure::Aborted);
        };
        match line.trim().parse::<Endpoint>() {
            Ok(endpoint) => {
                store.set(HOST_KEY, &endpoint.to_string())?;
                prompt.say(&format!("Saved IP address to {}", store.location()));
                return Ok(endpoint);
            }
            Err(e) => prompt.say(&format!("{e}. Please try again.")),
        }
    }
}

pub fn run<T: Transport>(
    options: &Options,
    store: &mut dyn CredentialStore,
    transport: T,
    prompt: &mut dyn Prompt,
) -> Result<(), Failure> {
    let config = Config::load(&*store);
    let endpoint = resolve_endpoint(options.host.as_deref(), &config, store, prompt)?;
    Orchestrator::new(options.settings, config, store, transport, prompt).run(&endpoint)
}

pub fn exit_code(result: &Result<(), Failure>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(_) => 1,
    }
}
