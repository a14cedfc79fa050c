// Pairing handshake on the pairing port.
//
// Client                                  Device
//   PairingRequest        ->
//                         <-  PairingRequestAck
//   Options               ->
//                         <-  Options
//   Configuration         ->
//                         <-  ConfigurationAck     (PIN appears on screen)
//   Secret                ->
//                         <-  SecretAck
//
// Every message is wrapped in an outer message carrying the protocol version
// and a status code.

use crate::atv::tls::Stream;
use crate::atv::wire;
use crate::pin::Pin;
use crate::tv::{PairingError, PairingSession};
use log::{debug, info, warn};
use num_enum::TryFromPrimitive;
use openssl::x509::X509;
use sha2::{Digest, Sha256};

const PROTOCOL_VERSION: u64 = 2;
const SERVICE_NAME: &str = "atvremote";
const ENCODING_HEXADECIMAL: u64 = 3;
const ROLE_INPUT: u64 = 1;
const SYMBOL_LENGTH: u64 = 6;

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive)]
pub enum Status {
    Unknown = 0,
    Ok = 200,
    Error = 400,
    BadConfiguration = 401,
    BadSecret = 402,
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, TryFromPrimitive)]
pub enum Field {
    ProtocolVersion = 1,
    Status = 2,
    PairingRequest = 10,
    PairingRequestAck = 11,
    Options = 20,
    Configuration = 30,
    ConfigurationAck = 31,
    Secret = 40,
    SecretAck = 41,
}

#[derive(Debug, PartialEq)]
pub struct Reply {
    pub status: Status,
    pub payload: Option<Field>,
}

fn outer(field: Field, inner: &[u8]) -> Vec<u8> {
    let mut msg = vec![];
    wire::write_varint_field(&mut msg, Field::ProtocolVersion as u32, PROTOCOL_VERSION);
    wire::write_varint_field(&mut msg, Field::Status as u32, Status::Ok as u64);
    wire::write_bytes_field(&mut msg, field as u32, inner);
    msg
}

fn encoding() -> Vec<u8> {
    let mut msg = vec![];
    wire::write_varint_field(&mut msg, 1, ENCODING_HEXADECIMAL);
    wire::write_varint_field(&mut msg, 2, SYMBOL_LENGTH);
    msg
}

pub fn pairing_request(client_name: &str) -> Vec<u8> {
    let mut inner = vec![];
    wire::write_string_field(&mut inner, 1, SERVICE_NAME);
    wire::write_string_field(&mut inner, 2, client_name);
    outer(Field::PairingRequest, &inner)
}

pub fn options() -> Vec<u8> {
    let mut inner = vec![];
    wire::write_bytes_field(&mut inner, 1, &encoding());
    wire::write_varint_field(&mut inner, 3, ROLE_INPUT);
    outer(Field::Options, &inner)
}

pub fn configuration() -> Vec<u8> {
    let mut inner = vec![];
    wire::write_bytes_field(&mut inner, 1, &encoding());
    wire::write_varint_field(&mut inner, 2, ROLE_INPUT);
    outer(Field::Configuration, &inner)
}

pub fn secret(hash: &[u8]) -> Vec<u8> {
    let mut inner = vec![];
    wire::write_bytes_field(&mut inner, 1, hash);
    outer(Field::Secret, &inner)
}

pub fn parse_reply(bytes: &[u8]) -> Result<Reply, PairingError> {
    let fields = wire::fields(bytes).map_err(|e| PairingError::Protocol(e.to_string()))?;
    let mut status = Status::Unknown;
    let mut payload = None;
    for (number, value) in fields {
        match Field::try_from(number) {
            Ok(Field::Status) => {
                let code = value.as_varint().unwrap_or_default();
                status = u32::try_from(code)
                    .ok()
                    .and_then(|c| Status::try_from(c).ok())
                    .unwrap_or(Status::Unknown);
            }
            Ok(Field::ProtocolVersion) | Err(_) => {}
            Ok(field) => payload = Some(field),
        }
    }
    Ok(Reply { status, payload })
}

fn rsa_parts(cert: &X509) -> Result<(Vec<u8>, Vec<u8>), PairingError> {
    let rsa = cert
        .public_key()
        .and_then(|key| key.rsa())
        .map_err(|e| PairingError::Protocol(format!("certificate has no RSA key: {e}")))?;
    Ok((rsa.n().to_vec(), rsa.e().to_vec()))
}

/// SHA-256 over both public keys and the last four PIN digits. The device
/// checks it against the first PIN byte, so a wrong PIN can be spotted
/// before anything is sent.
pub fn secret_hash(client: &X509, server: &X509, pin: &Pin) -> Result<[u8; 32], PairingError> {
    let (client_n, client_e) = rsa_parts(client)?;
    let (server_n, server_e) = rsa_parts(server)?;
    let mut hasher = Sha256::new();
    hasher.update(client_n);
    hasher.update(client_e);
    hasher.update(server_n);
    hasher.update(server_e);
    hasher.update([pin.byte(1), pin.byte(2)]);
    Ok(hasher.finalize().into())
}

pub struct AtvPairing {
    stream: Stream,
    client_cert: X509,
    server_cert: X509,
}

impl AtvPairing {
    /// Runs the handshake up to the point where the device shows a PIN.
    pub fn start(
        mut stream: Stream,
        client_name: &str,
        client_cert: X509,
    ) -> Result<Self, PairingError> {
        let server_cert = stream.ssl().peer_certificate().ok_or_else(|| {
            PairingError::Protocol("device did not present a certificate".to_string())
        })?;
        exchange(&mut stream, &pairing_request(client_name), Field::PairingRequestAck)?;
        exchange(&mut stream, &options(), Field::Options)?;
        exchange(&mut stream, &configuration(), Field::ConfigurationAck)?;
        info!("Pairing started, waiting for PIN");
        Ok(Self {
            stream,
            client_cert,
            server_cert,
        })
    }
}

impl PairingSession for AtvPairing {
    fn finish(&mut self, pin: &Pin) -> Result<(), PairingError> {
        let hash = secret_hash(&self.client_cert, &self.server_cert, pin)?;
        if hash[0] != pin.byte(0) {
            debug!("PIN checksum mismatch, not sending secret");
            return Err(PairingError::InvalidPin);
        }
        exchange(&mut self.stream, &secret(&hash), Field::SecretAck)?;
        if let Err(e) = self.stream.shutdown() {
            warn!("Error closing pairing session: {}", e);
        }
        Ok(())
    }
}

fn exchange(stream: &mut Stream, msg: &[u8], expected: Field) -> Result<(), PairingError> {
    let io_err = |e: std::io::Error| PairingError::Protocol(e.to_string());
    wire::write_frame(stream, msg).map_err(io_err)?;
    let reply = parse_reply(&wire::read_frame(stream).map_err(io_err)?)?;
    debug!("Pairing reply {:?}", reply);
    match reply.status {
        Status::Ok if reply.payload == Some(expected) => Ok(()),
        Status::Ok => Err(PairingError::Protocol(format!(
            "expected {:?}, got {:?}",
            expected, reply.payload
        ))),
        Status::BadSecret => Err(PairingError::InvalidPin),
        Status::Error => Err(PairingError::Rejected),
        status => Err(PairingError::Protocol(format!(
            "device answered with status {:?}",
            status
        ))),
    }
}
