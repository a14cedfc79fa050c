use crate::error::Failure;
use crate::prompt::Prompt;
use crate::tv::{Channel, KeyCode};
use log::info;

/// Sends a single play/pause press. Not retried: a second press would undo
/// the first if that one did arrive.
pub fn play_pause<C: Channel>(channel: &mut C, prompt: &mut dyn Prompt) -> Result<(), Failure> {
    channel.send_key(KeyCode::MediaPlayPause)?;
    info!("Sent {:?}", KeyCode::MediaPlayPause);
    prompt.say("Sent play/pause command.");
    Ok(())
}
