//! # KeyStore
//!
//! Ed25519 keypairs at rest. A keypair is created once, never mutated, and
//! destroyed by deleting its file; everything in between is this crate's
//! problem:
//!
//! * **Key derivation** - `scrypt(lowercase(username) || password, salt)`
//!   with N=16384, r=8, p=1 producing a 32-byte ChaCha20-Poly1305 key.
//!   Username comparison is case-insensitive; the password is byte-exact.
//! * **Encryption at rest** - the 32-byte signing key is sealed with
//!   ChaCha20-Poly1305 under the derived key, nonce = the record's 12-byte
//!   salt, producing a 48-byte ciphertext (tag included).
//! * **Offline integrity** - records carry `sign(sk, vk)` captured at
//!   creation, so "is this really a keypair?" is answerable against the
//!   stored verifying key without decrypting anything.
//! * **Persistence** - canonical JSON records in `*.crypto-keypair` files,
//!   written atomically (temp file + rename) and never overwritten.
//!
//! Records are tagged variants, not an inheritance hierarchy: an
//! [`EncryptedKeypair`] is what lives on disk, a [`PlaintextKeypair`] exists
//! only in memory.

mod engine;
mod error;
mod store;
mod types;

pub use crate::engine::{CIPHERTEXT_LEN, SALT_LEN, SEED_LEN, create, derive_key, open};
pub use crate::error::KeyStoreError;
pub use crate::store::{Credential, load, load_seed, resolve_save_dir, save};
pub use crate::types::{EncryptedKeypair, PlaintextKeypair};

/// Helper module for transparently serializing byte buffers to base64.
///
/// The wire form is standard-alphabet base64 **without padding**; decoding is
/// indifferent, so records produced by older padded encoders still load.
pub mod bytes_as_base64 {
    use base64::alphabet;
    use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Unpadded on encode, indifferent on decode.
    pub const WIRE: GeneralPurpose = GeneralPurpose::new(
        &alphabet::STANDARD,
        GeneralPurposeConfig::new()
            .with_encode_padding(false)
            .with_decode_padding_mode(DecodePaddingMode::Indifferent),
    );

    /// Serializes a byte vector into an unpadded base64 string.
    pub fn serialize<S: Serializer>(v: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        use base64::Engine as _;
        let mut buf = String::with_capacity((v.len() * 4).div_ceil(3));
        WIRE.encode_string(v, &mut buf);
        String::serialize(&buf, s)
    }

    /// Deserializes a base64 string (padded or not) back into a byte vector.
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        use base64::Engine as _;
        match WIRE.decode(String::deserialize(d)?) {
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(serde::de::Error::custom(format!("invalid base64: {e}"))),
        }
    }

    /// Encodes `bytes` in the wire form.
    #[must_use]
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use base64::Engine as _;
        WIRE.encode(bytes)
    }

    /// Decodes wire-form (or padded) base64.
    ///
    /// # Errors
    /// Returns the underlying decode error for non-base64 input.
    pub fn decode(text: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine as _;
        WIRE.decode(text)
    }
}
