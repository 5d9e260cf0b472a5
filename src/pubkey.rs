use crate::error::{Error, ErrorKind};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest key we will accept from the service or the user
pub const MAX_PUBLIC_KEY_LEN: usize = 1024;

// DER header of an Ed25519 SubjectPublicKeyInfo, followed by the 32 key bytes
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

lazy_static! {
    static ref BASE64_RE: Regex = Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").unwrap();
}

/// A participant's public key. This is the only stable handle for an identity.
///
/// It is opaque to us: equality is exact and case-sensitive and we never
/// normalize it. We only refuse strings that could never be a key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(String);

impl PublicKey {
    /// Accept a key as typed by a user or reported by the service
    pub fn try_from_str(s: &str) -> Result<PublicKey, Error> {
        if s.is_empty() {
            return Err(ErrorKind::InvalidPublicKey("key is empty".to_owned()).into());
        }
        if s.len() > MAX_PUBLIC_KEY_LEN {
            return Err(ErrorKind::InvalidPublicKey(format!(
                "key is longer than {} bytes",
                MAX_PUBLIC_KEY_LEN
            ))
            .into());
        }
        if let Some(c) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(ErrorKind::InvalidPublicKey(format!(
                "key contains the character {:?}",
                c
            ))
            .into());
        }
        Ok(PublicKey(s.to_owned()))
    }

    /// Accept a key read off a QR code.
    ///
    /// Scans carry no framing or checksum, so with `strict` we also require
    /// the payload to be a base64 Ed25519 SubjectPublicKeyInfo, which is
    /// what nodes generate.
    pub fn try_from_scan(payload: &str, strict: bool) -> Result<PublicKey, Error> {
        let pubkey = PublicKey::try_from_str(payload)?;
        if strict && !pubkey.is_ed25519_spki() {
            return Err(ErrorKind::InvalidPublicKey(
                "scanned code is not an Ed25519 public key".to_owned(),
            )
            .into());
        }
        Ok(pubkey)
    }

    /// Whether this key is a base64 encoded Ed25519 SubjectPublicKeyInfo
    pub fn is_ed25519_spki(&self) -> bool {
        if !BASE64_RE.is_match(&self.0) {
            return false;
        }
        match base64::engine::general_purpose::STANDARD.decode(&self.0) {
            Ok(der) => der.len() == 44 && der.starts_with(&ED25519_SPKI_PREFIX),
            Err(_) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A shortened form for log lines and narrow displays
    pub fn abbreviated(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 16 {
            return self.0.clone();
        }
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 6..].iter().collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = Error;

    fn try_from(s: String) -> Result<PublicKey, Error> {
        PublicKey::try_from_str(&s)
    }
}

impl From<PublicKey> for String {
    fn from(pk: PublicKey) -> String {
        pk.0
    }
}

impl AsRef<str> for PublicKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALICE: &str = "MCowBQYDK2VwAyEAaGHMrIKC3h27SO99YbKEUfUEXDOXjJHYOA5uWHR/rCU=";

    #[test]
    fn test_accepts_opaque_keys() {
        let pk = PublicKey::try_from_str("abc").unwrap();
        assert_eq!(pk.as_str(), "abc");
        assert_ne!(pk, PublicKey::try_from_str("ABC").unwrap());
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        for bad in ["", " abc", "abc ", "a b", "a\tb", "a\nb"] {
            let e = PublicKey::try_from_str(bad).unwrap_err();
            assert!(matches!(e.kind, ErrorKind::InvalidPublicKey(_)), "{bad:?}");
        }
        let long = "a".repeat(MAX_PUBLIC_KEY_LEN + 1);
        assert!(PublicKey::try_from_str(&long).is_err());
    }

    #[test]
    fn test_scan_strictness() {
        assert!(PublicKey::try_from_scan(ALICE, true).is_ok());
        assert!(PublicKey::try_from_scan("xyz", false).is_ok());
        assert!(PublicKey::try_from_scan("xyz", true).is_err());
        // valid base64, wrong length
        assert!(PublicKey::try_from_scan("aGVsbG8=", true).is_err());
        assert!(PublicKey::try_from_scan("", false).is_err());
    }

    #[test]
    fn test_serde_validates() {
        let pk: PublicKey = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(pk.as_str(), "abc");
        assert!(serde_json::from_str::<PublicKey>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&pk).unwrap(), "\"abc\"");
    }

    #[test]
    fn test_abbreviated() {
        assert_eq!(PublicKey::try_from_str("abc").unwrap().abbreviated(), "abc");
        assert_eq!(
            PublicKey::try_from_str(ALICE).unwrap().abbreviated(),
            "MCowBQYD…R/rCU="
        );
    }
}
