use std::fmt;
use std::str::FromStr;

pub const PIN_LENGTH: usize = 6;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("PIN must be {PIN_LENGTH} hexadecimal characters")]
pub struct InvalidPin;

/// A pairing code as shown on the device screen, normalized to uppercase.
#[derive(Clone, PartialEq, Eq)]
pub struct Pin(String);

impl Pin {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte value of the hex pair at `index` (0, 1 or 2).
    pub fn byte(&self, index: usize) -> u8 {
        let pair = &self.0[index * 2..index * 2 + 2];
        // Characters were checked on construction.
        u8::from_str_radix(pair, 16).unwrap_or_default()
    }
}

impl FromStr for Pin {
    type Err = InvalidPin;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pin = s.trim().to_ascii_uppercase();
        if pin.len() != PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidPin);
        }
        Ok(Pin(pin))
    }
}

// PINs are short-lived secrets, keep them out of debug logs.
impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Pin(******)")
    }
}
