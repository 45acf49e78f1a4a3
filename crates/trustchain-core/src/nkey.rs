//! Ed25519 key pairs in the nkey text encoding
//!
//! Every identity in the trust chain is an Ed25519 key pair. Public keys and
//! seeds are exchanged as base32 text carrying a one-letter role prefix and a
//! CRC16 checksum:
//!
//! - Public key: `base32(prefix || public[32] || crc16_le)`, e.g. `O...`, `A...`, `U...`
//! - Seed: `base32(seed_prefix(role) || seed[32] || crc16_le)`, e.g. `SO...`, `SA...`, `SU...`
//!
//! The role prefix keeps an account seed from ever being used where an
//! operator seed is required.

use crate::error::{CoreError, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// Prefix byte marking an encoded seed
const PREFIX_BYTE_SEED: u8 = 18 << 3;

/// RFC 4648 base32 alphabet
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Role of a key pair within the trust chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPrefix {
    /// Root of trust
    Operator,
    /// Tenant, signs users
    Account,
    /// Client identity
    User,
}

impl KeyPrefix {
    /// Raw prefix byte used in the encoded form
    pub const fn byte(self) -> u8 {
        match self {
            KeyPrefix::Operator => 14 << 3,
            KeyPrefix::Account => 0,
            KeyPrefix::User => 20 << 3,
        }
    }

    /// Leading character of an encoded public key with this prefix
    pub const fn letter(self) -> char {
        match self {
            KeyPrefix::Operator => 'O',
            KeyPrefix::Account => 'A',
            KeyPrefix::User => 'U',
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            b if b == KeyPrefix::Operator.byte() => Ok(KeyPrefix::Operator),
            b if b == KeyPrefix::Account.byte() => Ok(KeyPrefix::Account),
            b if b == KeyPrefix::User.byte() => Ok(KeyPrefix::User),
            other => Err(CoreError::InvalidPrefix(format!("unsupported prefix byte {}", other))),
        }
    }
}

impl std::fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyPrefix::Operator => write!(f, "operator"),
            KeyPrefix::Account => write!(f, "account"),
            KeyPrefix::User => write!(f, "user"),
        }
    }
}

/// Ed25519 key pair bound to a role prefix
#[derive(Clone)]
pub struct KeyPair {
    prefix: KeyPrefix,
    signing_key: SigningKey,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("prefix", &self.prefix)
            .field("public_key", &self.public_key())
            .field("seed", &"[redacted]")
            .finish()
    }
}

impl KeyPair {
    /// Generate a new random key pair for the given role
    pub fn create(prefix: KeyPrefix) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { prefix, signing_key }
    }

    /// Build a key pair from a raw 32-byte seed
    pub fn from_raw_seed(prefix: KeyPrefix, seed: &[u8; 32]) -> Self {
        Self {
            prefix,
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Decode an encoded seed (`SO...`, `SA...`, `SU...`)
    pub fn from_seed(seed: &str) -> Result<Self> {
        let (prefix, raw) = decode_seed(seed)?;
        Ok(Self::from_raw_seed(prefix, &raw))
    }

    /// Role of this key pair
    pub fn prefix(&self) -> KeyPrefix {
        self.prefix
    }

    /// Encoded public key
    pub fn public_key(&self) -> String {
        let mut raw = Vec::with_capacity(35);
        raw.push(self.prefix.byte());
        raw.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        append_checksum(&mut raw);
        base32_encode(&raw)
    }

    /// Encoded seed
    pub fn seed(&self) -> String {
        let prefix = self.prefix.byte();
        let mut raw = Vec::with_capacity(36);
        raw.push(PREFIX_BYTE_SEED | (prefix >> 5));
        raw.push((prefix & 31) << 3);
        raw.extend_from_slice(&self.signing_key.to_bytes());
        append_checksum(&mut raw);
        base32_encode(&raw)
    }

    /// Sign arbitrary bytes
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verify a signature against an encoded public key
    pub fn verify(public_key: &str, message: &[u8], signature: &[u8]) -> Result<()> {
        let (_, raw) = decode_public_key(public_key)?;
        let verifying_key = VerifyingKey::from_bytes(&raw)?;

        let signature: [u8; 64] = signature
            .try_into()
            .map_err(|_| CoreError::CryptoError("Invalid signature length".into()))?;

        verifying_key
            .verify(message, &Signature::from_bytes(&signature))
            .map_err(|e| CoreError::SignatureInvalid(e.to_string()))
    }
}

/// Decode an encoded seed into its role and raw 32-byte seed
pub fn decode_seed(seed: &str) -> Result<(KeyPrefix, [u8; 32])> {
    let raw = decode_checked(seed)?;
    if raw.len() != 34 {
        return Err(CoreError::InvalidEncoding(format!(
            "seed has {} bytes, expected 34",
            raw.len()
        )));
    }

    if raw[0] & 248 != PREFIX_BYTE_SEED {
        return Err(CoreError::InvalidPrefix("not a seed".into()));
    }

    let prefix = KeyPrefix::from_byte(((raw[0] & 7) << 5) | ((raw[1] & 248) >> 3))?;

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&raw[2..]);
    Ok((prefix, bytes))
}

/// Decode an encoded public key into its role and raw 32-byte key
pub fn decode_public_key(public_key: &str) -> Result<(KeyPrefix, [u8; 32])> {
    let raw = decode_checked(public_key)?;
    if raw.len() != 33 {
        return Err(CoreError::InvalidEncoding(format!(
            "public key has {} bytes, expected 33",
            raw.len()
        )));
    }

    let prefix = KeyPrefix::from_byte(raw[0])?;

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&raw[1..]);
    Ok((prefix, bytes))
}

/// Check that a string is a public key for the given role
pub fn is_valid_public_key(public_key: &str, prefix: KeyPrefix) -> bool {
    matches!(decode_public_key(public_key), Ok((p, _)) if p == prefix)
}

/// Decode base32 and strip the trailing checksum after validating it
fn decode_checked(encoded: &str) -> Result<Vec<u8>> {
    let mut raw = base32_decode(encoded)?;
    if raw.len() < 3 {
        return Err(CoreError::InvalidEncoding("input too short".into()));
    }

    let split = raw.len() - 2;
    let expected = u16::from_le_bytes([raw[split], raw[split + 1]]);
    raw.truncate(split);

    if crc16(&raw) != expected {
        return Err(CoreError::InvalidChecksum);
    }

    Ok(raw)
}

fn append_checksum(raw: &mut Vec<u8>) {
    let crc = crc16(raw);
    raw.extend_from_slice(&crc.to_le_bytes());
}

/// CRC16-XMODEM
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Base32 (RFC 4648) without padding
pub(crate) fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 31) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }

    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 31) as usize] as char);
    }

    out
}

pub(crate) fn base32_decode(encoded: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for c in encoded.bytes() {
        let value = match c {
            b'A'..=b'Z' => c - b'A',
            b'2'..=b'7' => c - b'2' + 26,
            _ => {
                return Err(CoreError::InvalidEncoding(format!(
                    "invalid base32 character '{}'",
                    c as char
                )))
            }
        };

        buffer = (buffer << 5) | value as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
        buffer &= (1 << bits) - 1;
    }

    // Leftover bits are padding: fewer than one character and all zero
    if bits >= 5 || buffer != 0 {
        return Err(CoreError::InvalidEncoding("non-canonical base32 tail".into()));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_key_prefix_letters() {
        assert!(KeyPair::create(KeyPrefix::Operator).public_key().starts_with('O'));
        assert!(KeyPair::create(KeyPrefix::Account).public_key().starts_with('A'));
        assert!(KeyPair::create(KeyPrefix::User).public_key().starts_with('U'));
    }

    #[test]
    fn test_seed_prefix_letters() {
        assert!(KeyPair::create(KeyPrefix::Operator).seed().starts_with("SO"));
        assert!(KeyPair::create(KeyPrefix::Account).seed().starts_with("SA"));
        assert!(KeyPair::create(KeyPrefix::User).seed().starts_with("SU"));
    }

    #[test]
    fn test_encoded_lengths() {
        let kp = KeyPair::create(KeyPrefix::Account);
        assert_eq!(kp.public_key().len(), 56);
        assert_eq!(kp.seed().len(), 58);
    }

    #[test]
    fn test_seed_restores_same_public_key() {
        let kp = KeyPair::create(KeyPrefix::User);
        let restored = KeyPair::from_seed(&kp.seed()).unwrap();

        assert_eq!(restored.prefix(), KeyPrefix::User);
        assert_eq!(restored.public_key(), kp.public_key());
    }

    #[test]
    fn test_decode_seed_reports_prefix() {
        let kp = KeyPair::create(KeyPrefix::Operator);
        let (prefix, _) = decode_seed(&kp.seed()).unwrap();
        assert_eq!(prefix, KeyPrefix::Operator);
    }

    #[test]
    fn test_public_key_is_not_a_seed() {
        let kp = KeyPair::create(KeyPrefix::Account);
        assert!(KeyPair::from_seed(&kp.public_key()).is_err());
    }

    #[test]
    fn test_corrupted_seed_fails_checksum() {
        let kp = KeyPair::create(KeyPrefix::Account);
        let mut seed = kp.seed().into_bytes();
        // flip a character in the key body
        seed[20] = if seed[20] == b'A' { b'B' } else { b'A' };
        let seed = String::from_utf8(seed).unwrap();

        assert!(KeyPair::from_seed(&seed).is_err());
    }

    #[test]
    fn test_garbage_seed_rejected() {
        assert!(matches!(
            KeyPair::from_seed("not-a-seed"),
            Err(CoreError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::create(KeyPrefix::Operator);
        let sig = kp.sign(b"payload");

        assert!(KeyPair::verify(&kp.public_key(), b"payload", &sig).is_ok());
        assert!(KeyPair::verify(&kp.public_key(), b"tampered", &sig).is_err());
    }

    #[test]
    fn test_verify_with_wrong_key_fails() {
        let kp1 = KeyPair::create(KeyPrefix::Account);
        let kp2 = KeyPair::create(KeyPrefix::Account);
        let sig = kp1.sign(b"payload");

        assert!(KeyPair::verify(&kp2.public_key(), b"payload", &sig).is_err());
    }

    #[test]
    fn test_is_valid_public_key() {
        let kp = KeyPair::create(KeyPrefix::Account);
        assert!(is_valid_public_key(&kp.public_key(), KeyPrefix::Account));
        assert!(!is_valid_public_key(&kp.public_key(), KeyPrefix::Operator));
        assert!(!is_valid_public_key("AAAA", KeyPrefix::Account));
    }

    #[test]
    fn test_base32_known_vector() {
        assert_eq!(base32_encode(b"foobar"), "MZXW6YTBOI");
        assert_eq!(base32_decode("MZXW6YTBOI").unwrap(), b"foobar");
    }

    #[test]
    fn test_base32_rejects_nonzero_padding_bits() {
        // "MZXW6YTBOI" ends in 'I' (0b01000); 'J' sets a padding bit
        assert!(base32_decode("MZXW6YTBOJ").is_err());

        let seed = KeyPair::create(KeyPrefix::Account).seed();
        let mut alternate = seed.clone();
        let last = alternate.pop().unwrap();
        let bumped = BASE32_ALPHABET[(BASE32_ALPHABET.iter().position(|&c| c as char == last).unwrap() + 1) % 32];
        alternate.push(bumped as char);
        assert!(KeyPair::from_seed(&alternate).is_err());
        assert!(KeyPair::from_seed(&seed).is_ok());
    }

    #[test]
    fn test_crc16_xmodem_vector() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_debug_redacts_seed() {
        let kp = KeyPair::create(KeyPrefix::User);
        let debug = format!("{:?}", kp);
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains(&kp.seed()));
    }
}
