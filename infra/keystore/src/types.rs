//! Keypair record shapes.

use crate::bytes_as_base64;
use crate::engine::{CIPHERTEXT_LEN, SALT_LEN};
use crate::error::KeyStoreError;
use ed25519_dalek::{SIGNATURE_LENGTH, Signature, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// A decrypted keypair. Exists only in memory; persisting one means
/// encrypting it first via [`crate::create`].
#[derive(Clone)]
pub struct PlaintextKeypair {
    /// The private signing key.
    pub sk: SigningKey,
    /// The public verifying key derived from `sk`.
    pub vk: VerifyingKey,
}

impl std::fmt::Debug for PlaintextKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The signing key never reaches logs or panic messages.
        f.debug_struct("PlaintextKeypair")
            .field("vk", &self.vk)
            .field("sk", &"<redacted>")
            .finish()
    }
}

impl PlaintextKeypair {
    /// Wraps a signing key, deriving its verifying key.
    #[must_use]
    pub fn from_signing_key(sk: SigningKey) -> Self {
        let vk = sk.verifying_key();
        Self { sk, vk }
    }

    /// The verifying key as raw bytes, the form licenses embed.
    #[must_use]
    pub fn vk_bytes(&self) -> [u8; 32] {
        self.vk.to_bytes()
    }
}

/// The persisted keypair record: `*.crypto-keypair` canonical JSON.
///
/// The signing key is present only as `ciphertext`; `vk_signature` is
/// `sign(sk, vk)` captured at creation, so the record can be checked for
/// integrity offline without credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EncryptedKeypair {
    /// 48 bytes: the encrypted 32-byte signing key plus the 16-byte AEAD tag.
    #[serde(with = "bytes_as_base64")]
    pub ciphertext: Vec<u8>,
    /// 12-byte KDF salt, doubling as the AEAD nonce.
    #[serde(with = "bytes_as_base64")]
    pub salt: Vec<u8>,
    /// The 32-byte public verifying key.
    #[serde(with = "bytes_as_base64")]
    pub vk: Vec<u8>,
    /// 64-byte Ed25519 signature of `vk` under the enclosed signing key.
    #[serde(with = "bytes_as_base64")]
    pub vk_signature: Vec<u8>,
}

impl EncryptedKeypair {
    /// Checks field lengths and the `vk_signature` binding.
    ///
    /// A record that passes really was produced from a keypair whose signing
    /// key matches `vk`; it says nothing about whether any particular
    /// credentials can decrypt it.
    ///
    /// # Errors
    /// Returns [`KeyStoreError::CorruptRecord`] for any length or signature
    /// mismatch.
    pub fn verify_binding(&self) -> Result<(), KeyStoreError> {
        let corrupt =
            |reason: &str| KeyStoreError::CorruptRecord { reason: reason.to_owned() };

        let vk: [u8; 32] =
            self.vk.as_slice().try_into().map_err(|_| corrupt("vk must be 32 bytes"))?;
        if self.salt.len() != SALT_LEN {
            return Err(corrupt("salt must be 12 bytes"));
        }
        if self.ciphertext.len() != CIPHERTEXT_LEN {
            return Err(corrupt("ciphertext must be 48 bytes"));
        }
        let sig: [u8; SIGNATURE_LENGTH] = self
            .vk_signature
            .as_slice()
            .try_into()
            .map_err(|_| corrupt("vk_signature must be 64 bytes"))?;

        let vk = VerifyingKey::from_bytes(&vk)
            .map_err(|_| corrupt("vk is not a valid ed25519 point"))?;
        vk.verify(vk.as_bytes(), &Signature::from_bytes(&sig))
            .map_err(|_| corrupt("vk_signature does not bind vk"))?;
        Ok(())
    }

    /// Serializes the record into canonical bytes: UTF-8 JSON, keys sorted
    /// at every level, no insignificant whitespace, unpadded base64.
    ///
    /// # Errors
    /// Returns [`KeyStoreError::Internal`] if serialization fails, which
    /// indicates a bug rather than bad input.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>, KeyStoreError> {
        let value = serde_json::to_value(self)
            .map_err(|e| KeyStoreError::Internal { message: e.to_string() })?;
        serde_json::to_vec(&value).map_err(|e| KeyStoreError::Internal { message: e.to_string() })
    }

    /// Parses a record from bytes, rejecting unknown fields, duplicate
    /// fields, trailing bytes, and non-UTF-8 input.
    ///
    /// # Errors
    /// Returns [`KeyStoreError::CorruptRecord`] for anything unparseable.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyStoreError> {
        serde_json::from_slice(bytes)
            .map_err(|e| KeyStoreError::CorruptRecord { reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Signer;

    fn record() -> EncryptedKeypair {
        let sk = SigningKey::from_bytes(&[11u8; 32]);
        let vk = sk.verifying_key();
        EncryptedKeypair {
            ciphertext: vec![0u8; 48],
            salt: vec![0u8; 12],
            vk: vk.to_bytes().to_vec(),
            vk_signature: sk.sign(vk.as_bytes()).to_bytes().to_vec(),
        }
    }

    #[test]
    fn binding_accepts_honest_record() {
        record().verify_binding().unwrap();
    }

    #[test]
    fn binding_rejects_foreign_vk() {
        let mut r = record();
        r.vk = SigningKey::from_bytes(&[12u8; 32]).verifying_key().to_bytes().to_vec();
        let err = r.verify_binding().unwrap_err();
        assert!(matches!(err, KeyStoreError::CorruptRecord { .. }));
    }

    #[test]
    fn binding_rejects_bad_lengths() {
        let mut r = record();
        r.salt = vec![0u8; 11];
        assert!(r.verify_binding().is_err());

        let mut r = record();
        r.ciphertext.push(0);
        assert!(r.verify_binding().is_err());
    }

    #[test]
    fn canonical_bytes_have_sorted_keys_and_no_padding() {
        let bytes = record().to_canonical_bytes().unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        let ciphertext = text.find("\"ciphertext\"").unwrap();
        let salt = text.find("\"salt\"").unwrap();
        let vk = text.find("\"vk\"").unwrap();
        let vk_signature = text.find("\"vk_signature\"").unwrap();
        assert!(ciphertext < salt && salt < vk && vk < vk_signature);
        assert!(!text.contains('='), "canonical base64 is unpadded");
        assert!(!text.contains(' '), "no insignificant whitespace");
    }

    #[test]
    fn decode_rejects_unknown_fields_and_trailing_bytes() {
        let mut bytes = record().to_canonical_bytes().unwrap();
        let with_extra = {
            let mut text: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            text.as_object_mut().unwrap().insert("extra".into(), 1.into());
            serde_json::to_vec(&text).unwrap()
        };
        assert!(EncryptedKeypair::from_bytes(&with_extra).is_err());

        bytes.extend_from_slice(b"garbage");
        assert!(EncryptedKeypair::from_bytes(&bytes).is_err());
    }
}
