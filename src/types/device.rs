use std::collections::HashMap;
use std::net::IpAddr;

/// A receiver to stream audio to.
///
/// Produced by the external discovery collaborator (mDNS/DNS-SD); the core
/// only consumes the address, port, and TXT record properties.
#[derive(Debug, Clone, PartialEq)]
pub struct AirPlayDevice {
    /// Unique device identifier (from TXT record).
    pub id: String,

    /// Human-readable device name (e.g. "Living Room `HomePod`").
    pub name: String,

    /// Device model identifier (e.g. "AudioAccessory5,1" for `HomePod` Mini).
    pub model: Option<String>,

    /// Resolved network address.
    pub address: IpAddr,

    /// RTSP control port.
    pub port: u16,

    /// Raw TXT record properties, used to select the pairing family and
    /// audio parameters during `initialize`.
    pub txt_records: HashMap<String, String>,
}

impl AirPlayDevice {
    /// Parsed `features`/`ft` TXT value, used to select the pairing family
    /// and to detect MFi-SAP / `AirPort` model quirks.
    #[must_use]
    pub fn features(&self) -> u64 {
        self.txt_records
            .get("features")
            .or_else(|| self.txt_records.get("ft"))
            .and_then(|v| {
                v.strip_prefix("0x")
                    .map_or_else(|| v.parse().ok(), |hex| u64::from_str_radix(hex, 16).ok())
            })
            .unwrap_or(0)
    }

    /// Whether the receiver model name begins with "AirPort", used by the
    /// `/auth-setup` MFiSAP probe gate.
    #[must_use]
    pub fn is_airport(&self) -> bool {
        self.model
            .as_deref()
            .is_some_and(|m| m.starts_with("AirPort"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(txt: &[(&str, &str)]) -> AirPlayDevice {
        AirPlayDevice {
            id: "id".to_string(),
            name: "name".to_string(),
            model: None,
            address: "127.0.0.1".parse().unwrap(),
            port: 7000,
            txt_records: txt
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn features_parses_hex_prefixed_value() {
        let d = device(&[("features", "0x445F8A00")]);
        assert_eq!(d.features(), 0x445F_8A00);
    }

    #[test]
    fn features_defaults_to_zero() {
        let d = device(&[]);
        assert_eq!(d.features(), 0);
    }

    #[test]
    fn is_airport_checks_model_prefix() {
        let mut d = device(&[]);
        d.model = Some("AirPort4,107".to_string());
        assert!(d.is_airport());
        d.model = Some("AudioAccessory5,1".to_string());
        assert!(!d.is_airport());
    }
}
