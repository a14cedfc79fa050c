//! Local TLS identity: a self-signed RSA certificate and its private key,
//! stored as PEM files at fixed paths.
//!
//! The device remembers the certificate it was paired with, so the files are
//! generated once and must never be regenerated while a pairing is in use.

use log::{debug, info};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Name, X509};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CERT_FILE_NAME: &str = ".shield_cert.pem";
pub const KEY_FILE_NAME: &str = ".shield_key.pem";

const RSA_BITS: u32 = 2048;
const CERT_VALIDITY_DAYS: u32 = 10 * 365;
const CERT_COUNTRY: &str = "US";
const CERT_ORG: &str = "atvremote";

#[derive(thiserror::Error, Debug)]
pub enum IdentityError {
    #[error("Cannot access identity files: {0}")]
    Io(#[from] io::Error),
    #[error("Cannot build or parse certificate: {0}")]
    Certificate(#[from] openssl::error::ErrorStack),
}

#[derive(Clone, Debug)]
pub struct Identity {
    cert_path: PathBuf,
    key_path: PathBuf,
    common_name: String,
}

impl Identity {
    pub fn new(cert_path: PathBuf, key_path: PathBuf, common_name: &str) -> Self {
        Self {
            cert_path,
            key_path,
            common_name: common_name.to_string(),
        }
    }

    /// Identity stored in `dir` under the default file names.
    pub fn in_dir(dir: &Path, common_name: &str) -> Self {
        Self::new(dir.join(CERT_FILE_NAME), dir.join(KEY_FILE_NAME), common_name)
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Both files exist and are non-empty.
    pub fn is_present(&self) -> bool {
        non_empty(&self.cert_path) && non_empty(&self.key_path)
    }

    /// Generates the certificate and key unless both are already present.
    /// Returns whether new files were written.
    pub fn ensure(&self) -> Result<bool, IdentityError> {
        if self.is_present() {
            debug!("Reusing identity at {:?}", self.cert_path);
            return Ok(false);
        }
        let (cert, key) = generate(&self.common_name)?;
        write_pem(&self.key_path, &key.private_key_to_pem_pkcs8()?)?;
        write_pem(&self.cert_path, &cert.to_pem()?)?;
        info!(
            "Generated new identity at {:?} and {:?}",
            self.cert_path, self.key_path
        );
        Ok(true)
    }

    pub fn load(&self) -> Result<(X509, PKey<Private>), IdentityError> {
        let cert = X509::from_pem(&fs::read(&self.cert_path)?)?;
        let key = PKey::private_key_from_pem(&fs::read(&self.key_path)?)?;
        Ok((cert, key))
    }
}

fn non_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

fn write_pem(path: &Path, pem: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    io::Write::write_all(&mut file, pem)?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn generate(common_name: &str) -> Result<(X509, PKey<Private>), openssl::error::ErrorStack> {
    let key = PKey::from_rsa(Rsa::generate(RSA_BITS)?)?;

    let mut name = X509Name::builder()?;
    name.append_entry_by_text("C", CERT_COUNTRY)?;
    name.append_entry_by_text("O", CERT_ORG)?;
    name.append_entry_by_text("CN", common_name)?;
    let name = name.build();

    let mut serial = BigNum::new()?;
    serial.rand(159, MsbOption::MAYBE_ZERO, false)?;

    let serial = serial.to_asn1_integer()?;
    let not_before = Asn1Time::days_from_now(0)?;
    let not_after = Asn1Time::days_from_now(CERT_VALIDITY_DAYS)?;

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;
    builder.set_pubkey(&key)?;
    builder.append_extension(BasicConstraints::new().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .digital_signature()
            .key_encipherment()
            .build()?,
    )?;
    builder.sign(&key, MessageDigest::sha256())?;

    Ok((builder.build(), key))
}
