use super::CryptoError;
use num_bigint::{BigUint, RandomBits};
use rand::Rng;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

/// SRP-6a group parameters (prime, generator, byte width of the prime).
pub struct SrpParams {
    n_hex: &'static str,
    g: u32,
}

impl SrpParams {
    /// RFC 5054 2048-bit group (g=2), used by the legacy AirPlay 1 "pin"
    /// pairing handshake.
    pub const APPLE_2048: SrpParams = SrpParams {
        n_hex: "\
AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B855F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773BCA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB694B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73",
        g: 2,
    };

    /// HomeKit Accessory Protocol's 3072-bit group (g=5), used by HAP
    /// Pair-Setup.
    pub const RFC5054_3072: SrpParams = SrpParams {
        n_hex: "\
FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E0\
88A67CC74020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B\
302B0A6DF25F14374FE1356D6D51C245E485B576625E7EC6F44C42E9\
A637ED6B0BFF5CB6F406B7EDEE386BFB5A899FA5AE9F24117C4B1FE6\
49286651ECE45B3DC2007CB8A163BF0598DA48361C55D39A69163FA8\
FD24CF5F83655D23DCA3AD961C62F356208552BB9ED529077096966D\
670C354E4ABC9804F1746C08CA18217C32905E462E36CE3BE39E772C\
180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718\
3995497CEA956AE515D2261898FA051015728E5A8AAAC42DAD33170D\
04507A33A85521ABDF1CBA64ECFB850458DBEF0A8AEA71575D060C7D\
B3970F85A6E1E4C7ABF5AE8CDB0933D71E8C94E04A25619DCEE3D226\
1AD2EE6BF12FFA06D98A0864D87602733EC86A64521F2B18177B200C\
BBE117577A615D6C770988C0BAD946E208E24FA074E5AB3143DB5BFC\
E0FD108E4B82D120A93AD2CAFFFFFFFFFFFFFFFF",
        g: 5,
    };

    fn n(&self) -> BigUint {
        BigUint::parse_bytes(self.n_hex.as_bytes(), 16).expect("static SRP prime is valid hex")
    }

    fn width_bytes(&self) -> usize {
        self.n().to_bytes_be().len()
    }
}

/// Selects how the SRP session key `K` is derived from the premaster secret
/// `S`. The legacy AirPlay 1 handshake uses a non-standard two-hash scheme;
/// HAP Pair-Setup uses the textbook `K = H(S)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKeyMode {
    /// `K = H(S)`, as specified by SRP-6a.
    Standard,
    /// `K = H(S || 0x00000000) || H(S || 0x00000001)`.
    AppleLegacy,
}

/// Apple-flavored SRP-6a client: supports both the standard `K = H(S)`
/// derivation (HAP Pair-Setup) and the legacy two-hash derivation (AirPlay 1
/// pin pairing).
pub struct SrpClient {
    n: BigUint,
    g: BigUint,
    width: usize,
    k: BigUint,
    a: BigUint,
    public_key: Vec<u8>,
    session_key_mode: SessionKeyMode,
}

impl SrpClient {
    /// Create a new client for the given group, generating a fresh
    /// ephemeral private exponent `a`.
    ///
    /// # Errors
    ///
    /// Returns an error if the static group parameters fail to parse (never
    /// happens for the built-in groups).
    pub fn new(params: &SrpParams, session_key_mode: SessionKeyMode) -> Result<Self, CryptoError> {
        let n = params.n();
        let g = BigUint::from(params.g);
        let width = params.width_bytes();

        let k = {
            let mut hasher = Sha512::new();
            hasher.update(n.to_bytes_be());
            hasher.update(pad(&g.to_bytes_be(), width));
            BigUint::from_bytes_be(&hasher.finalize())
        };

        let mut rng = rand::thread_rng();
        let a: BigUint = rng.sample(RandomBits::new(256));
        let a = a % &n;

        let a_pub = g.modpow(&a, &n);
        let public_key = pad(&a_pub.to_bytes_be(), width);

        Ok(Self {
            n,
            g,
            width,
            k,
            a,
            public_key,
            session_key_mode,
        })
    }

    /// Our ephemeral public key `A`, padded to the group width.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Process the server's challenge (salt, `B`) and derive the session
    /// key and client proof.
    ///
    /// # Errors
    ///
    /// Returns an error if the server's public key is degenerate (`B mod N
    /// == 0`).
    pub fn process_challenge(
        &self,
        username: &[u8],
        password: &[u8],
        salt: &[u8],
        server_public: &[u8],
    ) -> Result<SrpVerifier, CryptoError> {
        let b_pub = BigUint::from_bytes_be(server_public);
        if &b_pub % &self.n == BigUint::from(0u32) {
            return Err(CryptoError::SrpError(
                "invalid server public key".to_string(),
            ));
        }

        let u = {
            let mut hasher = Sha512::new();
            hasher.update(&self.public_key);
            hasher.update(pad(&b_pub.to_bytes_be(), self.width));
            BigUint::from_bytes_be(&hasher.finalize())
        };

        let x = {
            let mut inner = Sha512::new();
            inner.update(username);
            inner.update(b":");
            inner.update(password);
            let h_up = inner.finalize();

            let mut outer = Sha512::new();
            outer.update(salt);
            outer.update(h_up);
            BigUint::from_bytes_be(&outer.finalize())
        };

        let g_x = self.g.modpow(&x, &self.n);
        let k_g_x = (&self.k * g_x) % &self.n;
        let base = if b_pub >= k_g_x {
            (&b_pub - &k_g_x) % &self.n
        } else {
            (&self.n - (&k_g_x - &b_pub) % &self.n) % &self.n
        };

        let exp = &self.a + (&u * x);
        let s_shared = base.modpow(&exp, &self.n);
        let s_bytes = s_shared.to_bytes_be();

        let k_session = match self.session_key_mode {
            SessionKeyMode::Standard => Sha512::digest(&s_bytes).to_vec(),
            SessionKeyMode::AppleLegacy => {
                let k1 = {
                    let mut h = Sha512::new();
                    h.update(&s_bytes);
                    h.update([0, 0, 0, 0]);
                    h.finalize()
                };
                let k2 = {
                    let mut h = Sha512::new();
                    h.update(&s_bytes);
                    h.update([0, 0, 0, 1]);
                    h.finalize()
                };
                let mut out = Vec::with_capacity(128);
                out.extend_from_slice(&k1);
                out.extend_from_slice(&k2);
                out
            }
        };

        let m1 = {
            let hn = Sha512::digest(self.n.to_bytes_be());
            let hg = Sha512::digest(self.g.to_bytes_be());
            let mut hn_xor_hg = [0u8; 64];
            for i in 0..64 {
                hn_xor_hg[i] = hn[i] ^ hg[i];
            }

            let h_user = Sha512::digest(username);

            let mut hasher = Sha512::new();
            hasher.update(hn_xor_hg);
            hasher.update(h_user);
            hasher.update(salt);
            hasher.update(&self.public_key);
            hasher.update(b_pub.to_bytes_be());
            hasher.update(&k_session);
            hasher.finalize().to_vec()
        };

        Ok(SrpVerifier {
            a_pub: self.public_key.clone(),
            m1,
            k_session,
        })
    }
}

/// Intermediate SRP state after the client proof has been computed; holds
/// the session key pending server-proof verification.
pub struct SrpVerifier {
    a_pub: Vec<u8>,
    m1: Vec<u8>,
    k_session: Vec<u8>,
}

impl SrpVerifier {
    /// The client's proof, `M1`, to send to the server.
    #[must_use]
    pub fn client_proof(&self) -> &[u8] {
        &self.m1
    }

    /// Verify the server's proof `M2 = H(A, M1, K)` and, on success, return
    /// the session key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SrpError`] if the proof does not match
    /// (indicates a man-in-the-middle or wrong password/PIN).
    pub fn verify_server(&self, server_proof: &[u8]) -> Result<SessionKey, CryptoError> {
        let mut hasher = Sha512::new();
        hasher.update(&self.a_pub);
        hasher.update(&self.m1);
        hasher.update(&self.k_session);
        let expected_m2 = hasher.finalize();

        if expected_m2.as_slice() != server_proof {
            return Err(CryptoError::SrpError(
                "server proof verification failed".to_string(),
            ));
        }

        Ok(SessionKey {
            key: self.k_session.clone(),
        })
    }
}

/// SRP session key material; zeroized on drop.
pub struct SessionKey {
    key: Vec<u8>,
}

impl SessionKey {
    /// Raw session key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn pad(bytes: &[u8], width: usize) -> Vec<u8> {
    if bytes.len() >= width {
        return bytes.to_vec();
    }
    let mut out = vec![0u8; width];
    out[width - bytes.len()..].copy_from_slice(bytes);
    out
}
