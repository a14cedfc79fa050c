//! Interactive PIN exchange.

use crate::config::CredentialMarker;
use crate::endpoint::Endpoint;
use crate::error::Failure;
use crate::pin::{Pin, PIN_LENGTH};
use crate::prompt::Prompt;
use crate::tv::{PairingError, PairingSession, Transport};
use log::{debug, info, warn};

pub const DEFAULT_MAX_PIN_ATTEMPTS: u32 = 5;

const PIN_QUESTION: &str = "Enter the PIN shown on the TV: ";

/// Pairs with `endpoint`, asking for the on-screen PIN until the device
/// accepts one or `max_attempts` wrong PINs were entered. Malformed input
/// is re-asked without counting as an attempt.
pub fn negotiate<T: Transport>(
    transport: &mut T,
    endpoint: &Endpoint,
    prompt: &mut dyn Prompt,
    max_attempts: u32,
) -> Result<CredentialMarker, Failure> {
    prompt.say("Initiating pairing...");
    let mut session = transport
        .start_pairing(endpoint)
        .map_err(|e| into_failure(endpoint, e))?;
    prompt.say("A PIN code should appear on your TV.");

    let mut attempts = 0;
    loop {
        let pin = read_pin(prompt)?;
        match session.finish(&pin) {
            Ok(()) => {
                info!("Paired with {}", endpoint);
                prompt.say("Pairing successful!");
                return Ok(CredentialMarker::for_endpoint(endpoint));
            }
            Err(PairingError::InvalidPin) => {
                attempts += 1;
                warn!("Invalid PIN, attempt {}/{}", attempts, max_attempts);
                if attempts >= max_attempts {
                    return Err(Failure::PairingProtocol(
                        "too many invalid PIN attempts".to_string(),
                    ));
                }
                prompt.say("Invalid PIN, please try again.");
            }
            Err(e) => return Err(into_failure(endpoint, e)),
        }
    }
}

fn read_pin(prompt: &mut dyn Prompt) -> Result<Pin, Failure> {
    loop {
        let Some(line) = prompt.ask(PIN_QUESTION)? else {
            return Err(Failure::Aborted);
        };
        match line.parse::<Pin>() {
            Ok(pin) => return Ok(pin),
            Err(e) => {
                debug!("Rejected malformed PIN input of length {}", line.trim().len());
                prompt.say(&format!("{e} (0-9, A-F, {PIN_LENGTH} characters)."));
            }
        }
    }
}

fn into_failure(endpoint: &Endpoint, err: PairingError) -> Failure {
    match err {
        PairingError::Rejected => Failure::PairingRejected,
        PairingError::Connect(source) => Failure::Connect {
            endpoint: *endpoint,
            source,
        },
        PairingError::Identity(e) => Failure::Identity(e),
        PairingError::Protocol(reason) => Failure::PairingProtocol(reason),
        PairingError::InvalidPin => Failure::PairingProtocol("invalid PIN".to_string()),
    }
}
