//! Legacy AirPlay 1 SRP pin-pairing and its matching Pair-Verify.
//!
//! Unlike the `HomeKit` TLV state machines in [`super::verify`] and
//! [`super::transient`], this handshake speaks binary plists over
//! `/pair-pin-start`, `/pair-setup-pin`, and `/pair-verify`, and uses Apple's
//! non-standard two-hash SRP session key (see
//! [`crate::protocol::crypto::SessionKeyMode::AppleLegacy`]).

use crate::protocol::crypto::{
    Aes128Ctr, CryptoError, Ed25519KeyPair, Ed25519PublicKey, SessionKeyMode, SrpClient, SrpParams,
    X25519KeyPair, X25519PublicKey,
};
use crate::types::HapCredentials;
use sha2::{Digest, Sha512};

/// Errors specific to the legacy pin-pairing/verify handshake.
#[derive(Debug, thiserror::Error)]
pub enum LegacyPairingError {
    /// A plist response was missing a required key or had the wrong type.
    #[error("malformed legacy pairing response: {0}")]
    MalformedResponse(String),
    /// The PIN was rejected (wrong SRP proof).
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    /// A response body was too short to contain the expected fixed fields.
    #[error("response too short: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

fn hash_sha512(parts: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Drives the three-step SRP pin-pairing exchange (`step1`/`step2`/`step3`
/// in the original client).
pub struct LegacyPairSetup {
    srp: Option<SrpClient>,
    client: Option<crate::protocol::crypto::SrpVerifier>,
    identifier: Vec<u8>,
    seed: [u8; 32],
}

impl LegacyPairSetup {
    /// Generate a fresh 8-byte hex identifier and 32-byte seed, as the
    /// client identity for a new pairing attempt.
    #[must_use]
    pub fn new() -> Self {
        use rand::RngCore;
        let mut rng = rand::thread_rng();
        let mut identifier = vec![0u8; 8];
        rng.fill_bytes(&mut identifier);
        let mut seed = [0u8; 32];
        rng.fill_bytes(&mut seed);
        Self { srp: None, client: None, identifier, seed }
    }

    /// Step 1: build the `{method: "pin", user: <hex id>}` request body for
    /// `/pair-setup-pin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the SRP client cannot be constructed (never
    /// happens for the built-in group).
    pub fn start(&mut self, pin: &str) -> Result<Vec<u8>, LegacyPairingError> {
        let srp = SrpClient::new(&SrpParams::APPLE_2048, SessionKeyMode::AppleLegacy)?;
        self.srp = Some(srp);
        let _ = pin; // PIN is consumed in `process_challenge`, not `step1`.
        Ok(encode_dict(&[
            ("method", PlistField::Str("pin")),
            ("user", PlistField::Str(&hex_encode(&self.identifier))),
        ]))
    }

    /// Step 2: process the device's `{pk, salt}` challenge and return the
    /// `{pk, proof}` request body.
    ///
    /// # Errors
    ///
    /// Returns an error if the response is malformed or the PIN's SRP proof
    /// fails to verify (wrong PIN).
    pub fn process_challenge(&mut self, response: &[u8], pin: &str) -> Result<Vec<u8>, LegacyPairingError> {
        let reply = crate::protocol::plist::decode(response)
            .map_err(|e| LegacyPairingError::MalformedResponse(e.to_string()))?;
        let server_public = field_bytes(&reply, "pk")?;
        let salt = field_bytes(&reply, "salt")?;

        let srp = self.srp.as_ref().expect("start() must run before process_challenge()");
        let username = hex_encode(&self.identifier).into_bytes();
        let verifier = srp.process_challenge(&username, pin.as_bytes(), &salt, &server_public)?;

        let body = encode_dict(&[
            ("pk", PlistField::Data(srp.public_key())),
            ("proof", PlistField::Data(verifier.client_proof())),
        ]);
        self.client = Some(verifier);
        Ok(body)
    }

    /// Step 3: verify the device's proof and encrypt our Ed25519 public key
    /// with AES-128-GCM, returning the final `{epk, authTag}` request body
    /// and the completed credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the server's proof does not verify.
    pub fn finish(&mut self, response: &[u8]) -> Result<(Vec<u8>, HapCredentials), LegacyPairingError> {
        let reply = crate::protocol::plist::decode(response)
            .map_err(|e| LegacyPairingError::MalformedResponse(e.to_string()))?;
        let server_proof = field_bytes(&reply, "proof")?;

        let verifier = self.client.take().expect("process_challenge() must run before finish()");
        let session_key = verifier.verify_server(&server_proof)?;

        let aes_key = &hash_sha512(&[b"Pair-Setup-AES-Key", session_key.as_bytes()])[0..16];
        let mut aes_iv = hash_sha512(&[b"Pair-Setup-AES-IV", session_key.as_bytes()])[0..16].to_vec();
        aes_iv[15] = aes_iv[15].wrapping_add(1);

        let auth_keypair = Ed25519KeyPair::from_bytes(&self.seed)?;
        let auth_public = *auth_keypair.public_key().as_bytes();

        let cipher = gcm16(aes_key)?;
        let sealed = cipher.encrypt(&aes_iv, &auth_public)?;
        let (epk, tag) = sealed.split_at(32);

        let body = encode_dict(&[("epk", PlistField::Data(epk)), ("authTag", PlistField::Data(tag))]);
        let credentials = HapCredentials::legacy(self.identifier.clone(), self.seed.to_vec());
        Ok((body, credentials))
    }
}

impl Default for LegacyPairSetup {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the legacy (non-HAP) Pair-Verify exchange used before every
/// AirPlay 1 `ANNOUNCE`/`play`.
pub struct LegacyVerify {
    verify_keypair: X25519KeyPair,
    auth_keypair: Ed25519KeyPair,
}

impl LegacyVerify {
    /// Derive both the X25519 verification key pair and the Ed25519 signing
    /// key pair from the same stored 32-byte seed.
    ///
    /// # Errors
    ///
    /// Returns an error if `seed` is not a valid Ed25519 seed.
    pub fn new(seed: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            verify_keypair: X25519KeyPair::from_bytes(seed)?,
            auth_keypair: Ed25519KeyPair::from_bytes(seed)?,
        })
    }

    /// Build the first verify message: `0x01000000 || verify_public || auth_public`.
    #[must_use]
    pub fn start(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(68);
        out.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        out.extend_from_slice(self.verify_keypair.public_key().as_bytes());
        out.extend_from_slice(self.auth_keypair.public_key().as_bytes());
        out
    }

    /// Process the device's response (its ephemeral public key followed by
    /// an opaque challenge) and return the final `0x00000000 || signature`
    /// message. The handshake produces no session keys; AirPlay 1 traffic
    /// past this point is unencrypted.
    ///
    /// # Errors
    ///
    /// Returns an error if the response is shorter than the fixed public
    /// key field.
    pub fn finish(&self, response: &[u8]) -> Result<Vec<u8>, LegacyPairingError> {
        if response.len() < 32 {
            return Err(LegacyPairingError::Truncated { expected: 32, actual: response.len() });
        }
        let (device_public, challenge) = response.split_at(32);
        let device_public = X25519PublicKey::from_bytes(device_public)?;

        let shared = self.verify_keypair.diffie_hellman(&device_public);
        let aes_key = &hash_sha512(&[b"Pair-Verify-AES-Key", shared.as_bytes()])[0..16];
        let aes_iv = &hash_sha512(&[b"Pair-Verify-AES-IV", shared.as_bytes()])[0..16];

        let signed_message = [self.verify_keypair.public_key().as_bytes().as_slice(), device_public.as_bytes()].concat();
        let signature = self.auth_keypair.sign(&signed_message).to_bytes();

        // The challenge is encrypted only to advance the keystream to the
        // offset the signature must be encrypted at; its ciphertext is
        // discarded, matching the reference client's `aes_encrypt` which
        // returns just the last chunk encrypted.
        let mut ctr = Aes128Ctr::new(aes_key, aes_iv)?;
        let mut payload = challenge.to_vec();
        payload.extend_from_slice(&signature);
        ctr.apply_keystream(&mut payload);

        let mut out = Vec::with_capacity(4 + signature.len());
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        out.extend_from_slice(&payload[challenge.len()..]);
        Ok(out)
    }
}

/// Drive [`LegacyVerify`] over `conn`'s `/pair-verify` endpoint.
///
/// # Errors
///
/// Returns an error if the credentials are not legacy, pairing fails, or
/// the RTSP exchange fails.
pub async fn verify_legacy(
    conn: &mut crate::net::rtsp::RtspConnection,
    session: &mut crate::protocol::rtsp::RtspSession,
    credentials: &HapCredentials,
) -> Result<(), crate::error::AirPlayError> {
    let verifier = LegacyVerify::new(&credentials.long_term_secret)?;
    let request = session.post_request("/pair-verify", "application/octet-stream", verifier.start());
    let response = conn.exchange(request, None, false).await?;

    let reply = verifier.finish(&response.body).map_err(|e| crate::error::AirPlayError::AuthenticationFailed {
        message: e.to_string(),
        recoverable: false,
    })?;
    let request = session.post_request("/pair-verify", "application/octet-stream", reply);
    conn.exchange(request, None, false).await?;
    Ok(())
}

/// Wraps AES-128-GCM with a 16-byte IV (the legacy handshake's key-setup
/// step uses a 16-byte IV with the last byte incremented by one; standard
/// 96-bit-nonce GCM does not apply here).
struct Gcm16 {
    cipher: aes_gcm::AesGcm<aes_gcm::aes::Aes128, aes_gcm::aead::array::typenum::U16>,
}

fn gcm16(key: &[u8]) -> Result<Gcm16, CryptoError> {
    use aes_gcm::KeyInit;
    let key =
        aes_gcm::Key::<aes_gcm::AesGcm<aes_gcm::aes::Aes128, aes_gcm::aead::array::typenum::U16>>::from_slice(key);
    Ok(Gcm16 { cipher: aes_gcm::AesGcm::new(key) })
}

impl Gcm16 {
    fn encrypt(&self, iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, LegacyPairingError> {
        use aes_gcm::aead::Aead;
        let nonce = aes_gcm::aead::array::Array::from_slice(iv);
        self.cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| LegacyPairingError::Crypto(CryptoError::EncryptionFailed(e.to_string())))
    }
}

enum PlistField<'a> {
    Str(&'a str),
    Data(&'a [u8]),
}

fn encode_dict(fields: &[(&str, PlistField<'_>)]) -> Vec<u8> {
    use crate::protocol::plist::PlistValue;
    use std::collections::HashMap;

    let mut map = HashMap::new();
    for (key, value) in fields {
        let value = match value {
            PlistField::Str(s) => PlistValue::String((*s).to_string()),
            PlistField::Data(d) => PlistValue::Data((*d).to_vec()),
        };
        map.insert((*key).to_string(), value);
    }
    crate::protocol::plist::encode(&PlistValue::Dictionary(map))
        .expect("encoding a flat string/data dictionary never fails")
}

fn field_bytes(value: &crate::protocol::plist::PlistValue, key: &str) -> Result<Vec<u8>, LegacyPairingError> {
    value
        .as_dict()
        .and_then(|d| d.get(key))
        .and_then(crate::protocol::plist::PlistValue::as_bytes)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| LegacyPairingError::MalformedResponse(format!("missing or non-data field {key}")))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_start_message_has_fixed_prefix_and_length() {
        let seed = [7u8; 32];
        let verifier = LegacyVerify::new(&seed).unwrap();
        let m1 = verifier.start();
        assert_eq!(&m1[0..4], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(m1.len(), 4 + 32 + 32);
    }

    #[test]
    fn verify_finish_rejects_short_response() {
        let verifier = LegacyVerify::new(&[1u8; 32]).unwrap();
        let err = verifier.finish(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, LegacyPairingError::Truncated { .. }));
    }

    #[test]
    fn verify_finish_prefixes_zero_and_omits_challenge_ciphertext() {
        let client = LegacyVerify::new(&[3u8; 32]).unwrap();
        let device = X25519KeyPair::generate();
        let mut response = device.public_key().as_bytes().to_vec();
        response.extend_from_slice(b"opaque-challenge");
        let reply = client.finish(&response).unwrap();
        assert_eq!(&reply[0..4], &[0x00, 0x00, 0x00, 0x00]);
        // Only the encrypted signature is emitted; the challenge only
        // advances the keystream and its ciphertext is discarded.
        assert_eq!(reply.len(), 4 + 64);
    }

    #[test]
    fn hex_encode_is_uppercase() {
        assert_eq!(hex_encode(&[0xAB, 0x01]), "AB01");
    }
}
