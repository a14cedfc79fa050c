use crate::endpoint::Endpoint;
use crate::tv::ConnectError;
use log::debug;
use openssl::error::ErrorStack;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{ErrorCode, HandshakeError, SslConnector, SslMethod, SslStream, SslVerifyMode};
use openssl::x509::X509;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

pub type Stream = SslStream<TcpStream>;

/// Client-side TLS config presenting our certificate. Devices use
/// self-signed certificates, so the peer is not verified.
pub fn connector(cert: &X509, key: &PKey<Private>) -> Result<SslConnector, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;
    builder.set_verify(SslVerifyMode::NONE);
    builder.set_certificate(cert)?;
    builder.set_private_key(key)?;
    builder.check_private_key()?;
    Ok(builder.build())
}

pub fn connect(
    endpoint: &Endpoint,
    port: u16,
    connector: &SslConnector,
    timeout: Duration,
) -> Result<Stream, ConnectError> {
    let host = endpoint.to_string();
    let addr = (host.as_str(), port)
        .to_socket_addrs()
        .map_err(|_| ConnectError::Resolution(host.clone()))?
        .next()
        .ok_or_else(|| ConnectError::Resolution(host.clone()))?;

    debug!("Connecting to {}", addr);
    let tcp = TcpStream::connect_timeout(&addr, timeout)?;
    tcp.set_read_timeout(Some(timeout))?;
    tcp.set_write_timeout(Some(timeout))?;
    tcp.set_nodelay(true)?;

    let mut config = connector
        .configure()
        .map_err(|e| ConnectError::Auth(e.to_string()))?;
    config.set_use_server_name_indication(false);
    config.set_verify_hostname(false);
    let stream = config.connect(&host, tcp).map_err(classify_handshake)?;
    debug!("TLS session established with {}", addr);
    Ok(stream)
}

fn classify_handshake(err: HandshakeError<TcpStream>) -> ConnectError {
    match err {
        HandshakeError::SetupFailure(stack) => ConnectError::Auth(stack.to_string()),
        HandshakeError::Failure(mid) | HandshakeError::WouldBlock(mid) => {
            match mid.into_error().into_io_error() {
                Ok(io_err) => io_err.into(),
                Err(ssl_err) => ConnectError::Auth(ssl_err.to_string()),
            }
        }
    }
}

/// Errors read from an established session: TLS alerts mean the device
/// refused our certificate, anything else is a plain I/O failure.
pub fn classify_stream_error(err: io::Error) -> ConnectError {
    let tls_alert = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<openssl::ssl::Error>())
        .map_or(false, |e| e.code() == ErrorCode::SSL);
    if tls_alert {
        ConnectError::Auth(err.to_string())
    } else {
        err.into()
    }
}
