use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("Invalid IP address format: {0}")]
pub struct InvalidAddress(pub String);

/// Address of the device being controlled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    addr: Ipv4Addr,
}

impl Endpoint {
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }
}

/// Accepts four dot-separated groups of one to three digits, each in [0,255].
/// Leading zeros are allowed ("010.0.0.1").
pub fn validate_ip(s: &str) -> bool {
    parse_octets(s).is_some()
}

fn parse_octets(s: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut groups = s.split('.');
    for octet in octets.iter_mut() {
        let group = groups.next()?;
        if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *octet = group.parse::<u16>().ok()?.try_into().ok()?;
    }
    if groups.next().is_some() {
        return None;
    }
    Some(octets)
}

impl FromStr for Endpoint {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [a, b, c, d] = parse_octets(s).ok_or_else(|| InvalidAddress(s.to_string()))?;
        Ok(Endpoint {
            addr: Ipv4Addr::new(a, b, c, d),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}
