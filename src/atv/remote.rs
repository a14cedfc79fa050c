// Remote control session on the control port.
//
// The device speaks first: it sends RemoteConfigure, we answer with our own
// device info, then it sends RemoteSetActive which we acknowledge. Pings may
// arrive at any point and must be answered or the device drops the session.

use crate::atv::tls::{classify_stream_error, Stream};
use crate::atv::wire;
use crate::tv::{Channel, ConnectError, KeyCode, SendError};
use log::{debug, info, warn};
use num_enum::TryFromPrimitive;
use std::io;
use std::io::{Read, Write};

const CONFIGURE_CODE: u64 = 622;
const PACKAGE_NAME: &str = "atvremote";
const APP_VERSION: &str = "1.0.0";
// Messages to read before giving up on the device becoming ready.
const MAX_SETUP_MESSAGES: usize = 32;

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive)]
pub enum Field {
    Configure = 1,
    SetActive = 2,
    Error = 3,
    PingRequest = 8,
    PingResponse = 9,
    KeyInject = 10,
    Start = 40,
}

#[repr(u64)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Direction {
    Short = 3,
}

fn message(field: Field, inner: &[u8]) -> Vec<u8> {
    let mut msg = vec![];
    wire::write_bytes_field(&mut msg, field as u32, inner);
    msg
}

pub fn configure(client_name: &str) -> Vec<u8> {
    let mut info = vec![];
    wire::write_string_field(&mut info, 1, client_name);
    wire::write_string_field(&mut info, 2, client_name);
    wire::write_varint_field(&mut info, 3, 1);
    wire::write_string_field(&mut info, 4, "1");
    wire::write_string_field(&mut info, 5, PACKAGE_NAME);
    wire::write_string_field(&mut info, 6, APP_VERSION);

    let mut inner = vec![];
    wire::write_varint_field(&mut inner, 1, CONFIGURE_CODE);
    wire::write_bytes_field(&mut inner, 2, &info);
    message(Field::Configure, &inner)
}

pub fn set_active() -> Vec<u8> {
    let mut inner = vec![];
    wire::write_varint_field(&mut inner, 1, CONFIGURE_CODE);
    message(Field::SetActive, &inner)
}

pub fn ping_response(val1: u64) -> Vec<u8> {
    let mut inner = vec![];
    wire::write_varint_field(&mut inner, 1, val1);
    message(Field::PingResponse, &inner)
}

pub fn key_inject(key: KeyCode) -> Vec<u8> {
    let mut inner = vec![];
    wire::write_varint_field(&mut inner, 1, key as u64);
    wire::write_varint_field(&mut inner, 2, Direction::Short as u64);
    message(Field::KeyInject, &inner)
}

/// What the device asked for, and the answer it expects.
#[derive(Debug, PartialEq)]
pub enum Step {
    Reply(Vec<u8>),
    ReplyAndReady(Vec<u8>),
    Ready,
    Failed(String),
    Ignore,
}

pub fn respond(bytes: &[u8], client_name: &str) -> Result<Step, wire::WireError> {
    let fields = wire::fields(bytes)?;
    let Some((number, value)) = fields.first() else {
        return Ok(Step::Ignore);
    };
    let step = match Field::try_from(*number) {
        Ok(Field::Configure) => Step::Reply(configure(client_name)),
        Ok(Field::SetActive) => Step::ReplyAndReady(set_active()),
        Ok(Field::PingRequest) => {
            let val1 = value
                .as_bytes()
                .map(wire::fields)
                .transpose()?
                .and_then(|inner| {
                    inner
                        .iter()
                        .find(|(n, _)| *n == 1)
                        .and_then(|(_, v)| v.as_varint())
                })
                .unwrap_or_default();
            Step::Reply(ping_response(val1))
        }
        Ok(Field::Start) => Step::Ready,
        Ok(Field::Error) => Step::Failed("device reported a remote error".to_string()),
        _ => Step::Ignore,
    };
    Ok(step)
}

pub struct AtvChannel {
    stream: Stream,
}

impl AtvChannel {
    /// Completes the session setup; the channel is usable once this returns.
    pub fn open(mut stream: Stream, client_name: &str) -> Result<Self, ConnectError> {
        setup(&mut stream, client_name)?;
        info!("Remote session ready");
        Ok(Self { stream })
    }
}

/// Answers the device until it activates the session. Gives up after
/// `MAX_SETUP_MESSAGES` messages without activation.
pub fn setup(stream: &mut (impl Read + Write), client_name: &str) -> Result<(), ConnectError> {
    for _ in 0..MAX_SETUP_MESSAGES {
        let bytes = wire::read_frame(stream).map_err(classify_stream_error)?;
        let step = respond(&bytes, client_name).map_err(|e| ConnectError::Io(e.into()))?;
        debug!("Setup step {:?}", step);
        match step {
            Step::Reply(msg) => wire::write_frame(stream, &msg).map_err(classify_stream_error)?,
            Step::ReplyAndReady(msg) => {
                wire::write_frame(stream, &msg).map_err(classify_stream_error)?;
                return Ok(());
            }
            Step::Ready => return Ok(()),
            Step::Failed(reason) => {
                return Err(ConnectError::Io(io::Error::new(io::ErrorKind::Other, reason)))
            }
            Step::Ignore => {}
        }
    }
    Err(ConnectError::Io(io::Error::new(
        io::ErrorKind::TimedOut,
        "device never activated the remote session",
    )))
}

impl Channel for AtvChannel {
    fn send_key(&mut self, key: KeyCode) -> Result<(), SendError> {
        debug!("Sending {:?}", key);
        wire::write_frame(&mut self.stream, &key_inject(key))?;
        Ok(())
    }

    fn close(&mut self) {
        if let Err(e) = self.stream.shutdown() {
            warn!("Error closing session: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::atv::remote::*;

    #[test]
    fn test_key_inject_bytes() {
        assert_eq!(
            key_inject(KeyCode::MediaPlayPause),
            [0x52, 0x04, 0x08, 0x55, 0x10, 0x03]
        );
    }

    #[test]
    fn test_set_active_bytes() {
        assert_eq!(set_active(), [0x12, 0x03, 0x08, 0xee, 0x04]);
    }

    #[test]
    fn test_respond_to_configure() {
        let mut inner = vec![];
        wire::write_varint_field(&mut inner, 1, 1);
        let request = message(Field::Configure, &inner);
        assert_eq!(
            respond(&request, "atvpause").unwrap(),
            Step::Reply(configure("atvpause"))
        );
    }

    #[test]
    fn test_respond_to_set_active() {
        let request = message(Field::SetActive, &[0x08, 0x01]);
        assert_eq!(
            respond(&request, "atvpause").unwrap(),
            Step::ReplyAndReady(set_active())
        );
    }

    #[test]
    fn test_respond_to_ping() {
        let request = message(Field::PingRequest, &[0x08, 0x07, 0x10, 0x02]);
        assert_eq!(
            respond(&request, "atvpause").unwrap(),
            Step::Reply(vec![0x4a, 0x02, 0x08, 0x07])
        );
    }

    #[test]
    fn test_respond_other() {
        assert_eq!(
            respond(&message(Field::Start, &[0x08, 0x01]), "x").unwrap(),
            Step::Ready
        );
        assert!(matches!(
            respond(&message(Field::Error, &[]), "x").unwrap(),
            Step::Failed(_)
        ));
        assert_eq!(respond(&[0xa2, 0x06, 0x00], "x").unwrap(), Step::Ignore);
        assert_eq!(respond(&[], "x").unwrap(), Step::Ignore);
        assert!(respond(&[0x0a, 0x05], "x").is_err());
    }

    /// Reads device frames from a buffer and collects what we write back.
    struct Device {
        incoming: io::Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Device {
        fn sending(messages: &[Vec<u8>]) -> Self {
            let mut incoming = vec![];
            for msg in messages {
                wire::write_frame(&mut incoming, msg).unwrap();
            }
            Device {
                incoming: io::Cursor::new(incoming),
                written: vec![],
            }
        }

        fn replies(&self) -> Vec<Vec<u8>> {
            let mut r = io::Cursor::new(self.written.clone());
            let mut out = vec![];
            while (r.position() as usize) < self.written.len() {
                out.push(wire::read_frame(&mut r).unwrap());
            }
            out
        }
    }

    impl Read for Device {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.incoming.read(buf)
        }
    }

    impl Write for Device {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_setup_until_active() {
        let mut device = Device::sending(&[
            message(Field::Configure, &[0x08, 0x01]),
            message(Field::PingRequest, &[0x08, 0x05]),
            message(Field::SetActive, &[0x08, 0x01]),
        ]);
        setup(&mut device, "atvpause").unwrap();
        assert_eq!(
            device.replies(),
            vec![configure("atvpause"), ping_response(5), set_active()]
        );
    }

    #[test]
    fn test_setup_without_activation_fails() {
        let unknown = vec![0xa2, 0x01, 0x00];
        let mut device = Device::sending(&vec![unknown; MAX_SETUP_MESSAGES]);
        match setup(&mut device, "atvpause") {
            Err(ConnectError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("unexpected {:?}", other),
        }
        assert!(device.replies().is_empty());
    }

    #[test]
    fn test_setup_remote_error_fails() {
        let mut device = Device::sending(&[message(Field::Error, &[])]);
        assert!(matches!(
            setup(&mut device, "atvpause"),
            Err(ConnectError::Io(_))
        ));
    }

    #[test]
    fn test_setup_closed_stream_fails() {
        let mut device = Device::sending(&[message(Field::Configure, &[0x08, 0x01])]);
        assert!(setup(&mut device, "atvpause").is_err());
    }
}
