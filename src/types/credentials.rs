//! `HomeKit`/legacy pairing credentials.

use std::fmt;

/// Authentication family a `HapCredentials` value was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsKind {
    /// No credentials; receiver requires no pairing.
    Null,
    /// AirPlay 1 SRP pin-pairing credentials (`clientId:seed`).
    Legacy,
    /// Full HAP long-term credentials (`ltpk:ltsk:atv_id:client_id`).
    Hap,
    /// HAP Pair-Verify performed without enrolling long-term keys.
    Transient,
}

/// Pairing credentials for a single receiver.
///
/// Encoded as colon-joined lowercase hex. Two forms are accepted on parse:
/// two-field (`client_id:seed`, legacy) and four-field (`ltpk:ltsk:atv_id:client_id`,
/// full HAP).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HapCredentials {
    /// Long-term public key (HAP only; empty otherwise).
    pub long_term_public_key: Vec<u8>,
    /// Long-term secret: a 32-byte Ed25519 seed for legacy, the HAP signing key otherwise.
    pub long_term_secret: Vec<u8>,
    /// Receiver identifier (HAP only; empty otherwise).
    pub receiver_id: Vec<u8>,
    /// Client identifier.
    pub client_id: Vec<u8>,
    /// Authentication family this value was parsed/constructed for.
    pub kind: CredentialsKind,
}

/// Error parsing a credentials string.
#[derive(Debug, thiserror::Error)]
pub enum CredentialsParseError {
    /// Wrong number of colon-separated fields (expected 2 or 4).
    #[error("expected 2 or 4 colon-separated fields, got {0}")]
    WrongFieldCount(usize),
    /// A field was not valid hex.
    #[error("invalid hex in credentials field")]
    InvalidHex,
}

impl HapCredentials {
    /// Distinguished value for receivers that require no pairing at all.
    #[must_use]
    pub fn no_credentials() -> Self {
        Self {
            long_term_public_key: Vec::new(),
            long_term_secret: Vec::new(),
            receiver_id: Vec::new(),
            client_id: Vec::new(),
            kind: CredentialsKind::Null,
        }
    }

    /// Distinguished value used for HAP transient Pair-Verify, where no
    /// long-term material is stored.
    #[must_use]
    pub fn transient_credentials() -> Self {
        Self {
            long_term_public_key: Vec::new(),
            long_term_secret: Vec::new(),
            receiver_id: Vec::new(),
            client_id: Vec::new(),
            kind: CredentialsKind::Transient,
        }
    }

    /// Build legacy (AirPlay 1) credentials from a client id and a 32-byte seed.
    #[must_use]
    pub fn legacy(client_id: Vec<u8>, seed: Vec<u8>) -> Self {
        Self {
            long_term_public_key: Vec::new(),
            long_term_secret: seed,
            receiver_id: Vec::new(),
            client_id,
            kind: CredentialsKind::Legacy,
        }
    }

    /// Build full HAP credentials.
    #[must_use]
    pub fn hap(
        long_term_public_key: Vec<u8>,
        long_term_secret: Vec<u8>,
        receiver_id: Vec<u8>,
        client_id: Vec<u8>,
    ) -> Self {
        Self {
            long_term_public_key,
            long_term_secret,
            receiver_id,
            client_id,
            kind: CredentialsKind::Hap,
        }
    }

    /// Parse from the wire format: `hex(client_id):hex(seed)` (legacy) or
    /// `hex(ltpk):hex(ltsk):hex(atv_id):hex(client_id)` (HAP).
    ///
    /// # Errors
    ///
    /// Returns an error if the field count or hex encoding is invalid.
    pub fn parse(s: &str) -> Result<Self, CredentialsParseError> {
        let fields: Vec<&str> = s.split(':').collect();
        match fields.len() {
            2 => {
                let client_id = decode_hex(fields[0])?;
                let seed = decode_hex(fields[1])?;
                Ok(Self::legacy(client_id, seed))
            }
            4 => {
                let ltpk = decode_hex(fields[0])?;
                let ltsk = decode_hex(fields[1])?;
                let atv_id = decode_hex(fields[2])?;
                let client_id = decode_hex(fields[3])?;
                Ok(Self::hap(ltpk, ltsk, atv_id, client_id))
            }
            n => Err(CredentialsParseError::WrongFieldCount(n)),
        }
    }
}

impl fmt::Display for HapCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CredentialsKind::Legacy => {
                write!(
                    f,
                    "{}:{}",
                    hex_encode(&self.client_id),
                    hex_encode(&self.long_term_secret)
                )
            }
            CredentialsKind::Hap => {
                write!(
                    f,
                    "{}:{}:{}:{}",
                    hex_encode(&self.long_term_public_key),
                    hex_encode(&self.long_term_secret),
                    hex_encode(&self.receiver_id),
                    hex_encode(&self.client_id)
                )
            }
            CredentialsKind::Null | CredentialsKind::Transient => write!(f, ""),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn decode_hex(s: &str) -> Result<Vec<u8>, CredentialsParseError> {
    if s.len() % 2 != 0 {
        return Err(CredentialsParseError::InvalidHex);
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| CredentialsParseError::InvalidHex))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_round_trips() {
        let creds = HapCredentials::legacy(vec![0xAB; 8], vec![0x11; 32]);
        let encoded = creds.to_string();
        let parsed = HapCredentials::parse(&encoded).unwrap();
        assert_eq!(parsed, creds);
    }

    #[test]
    fn hap_round_trips() {
        let creds = HapCredentials::hap(vec![1; 32], vec![2; 64], vec![3; 6], vec![4; 6]);
        let encoded = creds.to_string();
        let parsed = HapCredentials::parse(&encoded).unwrap();
        assert_eq!(parsed, creds);
    }

    #[test]
    fn rejects_wrong_field_count() {
        assert!(matches!(
            HapCredentials::parse("aa:bb:cc"),
            Err(CredentialsParseError::WrongFieldCount(3))
        ));
    }
}
