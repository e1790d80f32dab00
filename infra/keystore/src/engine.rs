//! Key derivation and keypair sealing.
//!
//! The cryptography is deliberately small: scrypt turns credentials into a
//! 32-byte key, ChaCha20-Poly1305 seals the signing key under it, and the
//! record's salt serves as both KDF salt and AEAD nonce. A fresh salt is
//! drawn for every `create`, so the nonce never repeats under one derived
//! key.

use crate::error::KeyStoreError;
use crate::types::{EncryptedKeypair, PlaintextKeypair};
use aead::inout::InOutBuf;
use aead::{AeadInOut, Key, KeyInit, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use ed25519_dalek::{Signer, SigningKey};
use getrandom::fill;
use scrypt::Params;
use zeroize::Zeroize;

/// KDF salt / AEAD nonce length.
pub const SALT_LEN: usize = 12;

/// Seed and signing-key length.
pub const SEED_LEN: usize = 32;

/// Sealed signing key: 32 bytes of ciphertext plus the 16-byte tag.
pub const CIPHERTEXT_LEN: usize = 48;

/// scrypt cost: N = 16384.
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// Derives the 32-byte record key from credentials.
///
/// The KDF input is `lowercase(username) || password`: usernames compare
/// case-insensitively, passwords are byte-exact.
///
/// # Errors
/// Returns [`KeyStoreError::Internal`] if the KDF rejects its parameters,
/// which indicates a bug rather than bad input.
pub fn derive_key(
    username: &str,
    password: &str,
    salt: &[u8; SALT_LEN],
) -> Result<[u8; SEED_LEN], KeyStoreError> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SEED_LEN)
        .map_err(|e| KeyStoreError::Internal { message: e.to_string() })?;

    let mut secret = username.to_lowercase().into_bytes();
    secret.extend_from_slice(password.as_bytes());

    let mut key = [0u8; SEED_LEN];
    let derived = scrypt::scrypt(&secret, salt, &params, &mut key);
    secret.zeroize();
    derived.map_err(|e| KeyStoreError::Internal { message: e.to_string() })?;

    Ok(key)
}

/// Creates a new encrypted keypair record.
///
/// With `seed` absent, 32 bytes are drawn from the system CSPRNG; a supplied
/// seed is used verbatim as the signing key, which is how `*.crypto-seed`
/// files produce deterministic authors. The caller's seed copy is consumed
/// and wiped here.
///
/// # Errors
/// * [`KeyStoreError::Internal`] if the entropy source fails.
pub fn create(
    seed: Option<[u8; SEED_LEN]>,
    username: &str,
    password: &str,
) -> Result<EncryptedKeypair, KeyStoreError> {
    let mut sk_bytes = match seed {
        Some(seed) => seed,
        None => {
            let mut bytes = [0u8; SEED_LEN];
            fill(&mut bytes)
                .map_err(|e| KeyStoreError::Internal { message: e.to_string() })?;
            bytes
        },
    };

    let sk = SigningKey::from_bytes(&sk_bytes);
    let vk = sk.verifying_key();
    let vk_signature = sk.sign(vk.as_bytes());

    let mut salt = [0u8; SALT_LEN];
    fill(&mut salt).map_err(|e| KeyStoreError::Internal { message: e.to_string() })?;

    let mut key = derive_key(username, password, &salt)?;
    let cipher = init_cipher(&key)?;
    key.zeroize();

    let mut buf = sk_bytes.to_vec();
    sk_bytes.zeroize();

    let nonce = nonce_from_salt(&salt);
    let tag = cipher
        .encrypt_inout_detached(&nonce, b"", InOutBuf::from(&mut buf[..]))
        .map_err(|_| KeyStoreError::Internal { message: "AEAD sealing failed".to_owned() })?;
    buf.extend_from_slice(tag.as_slice());

    Ok(EncryptedKeypair {
        ciphertext: buf,
        salt: salt.to_vec(),
        vk: vk.to_bytes().to_vec(),
        vk_signature: vk_signature.to_bytes().to_vec(),
    })
}

/// Opens an encrypted keypair record with the given credentials.
///
/// # Errors
/// * [`KeyStoreError::CorruptRecord`] when the record fails its offline
///   integrity check.
/// * [`KeyStoreError::BadCredentials`] when AEAD authentication fails *or*
///   the decrypted signing key does not re-derive the stored verifying key.
pub fn open(
    record: &EncryptedKeypair,
    username: &str,
    password: &str,
) -> Result<PlaintextKeypair, KeyStoreError> {
    record.verify_binding()?;

    let salt: [u8; SALT_LEN] = record
        .salt
        .as_slice()
        .try_into()
        .map_err(|_| KeyStoreError::CorruptRecord { reason: "salt must be 12 bytes".to_owned() })?;

    let mut key = derive_key(username, password, &salt)?;
    let cipher = init_cipher(&key)?;
    key.zeroize();

    let (sealed, tag_slice) = record.ciphertext.split_at(SEED_LEN);
    let mut buf = sealed.to_vec();
    let tag = tag_slice
        .try_into()
        .map_err(|_| KeyStoreError::CorruptRecord { reason: "tag must be 16 bytes".to_owned() })?;

    let nonce = nonce_from_salt(&salt);
    cipher
        .decrypt_inout_detached(&nonce, b"", InOutBuf::from(&mut buf[..]), &tag)
        .map_err(|_| KeyStoreError::BadCredentials)?;

    let mut sk_bytes: [u8; SEED_LEN] = buf
        .as_slice()
        .try_into()
        .map_err(|_| KeyStoreError::CorruptRecord { reason: "sealed key must be 32 bytes".to_owned() })?;
    buf.zeroize();

    let sk = SigningKey::from_bytes(&sk_bytes);
    sk_bytes.zeroize();

    let keypair = PlaintextKeypair::from_signing_key(sk);
    if keypair.vk.as_bytes().as_slice() != record.vk.as_slice() {
        // Decryption "succeeded" but produced a foreign key: treat exactly
        // like a wrong password.
        return Err(KeyStoreError::BadCredentials);
    }

    Ok(keypair)
}

fn init_cipher(key: &[u8; SEED_LEN]) -> Result<ChaCha20Poly1305, KeyStoreError> {
    let key = Key::<ChaCha20Poly1305>::try_from(&key[..])
        .map_err(|_| KeyStoreError::Internal { message: "invalid cipher key length".to_owned() })?;
    Ok(ChaCha20Poly1305::new(&key))
}

fn nonce_from_salt(salt: &[u8; SALT_LEN]) -> Nonce<ChaCha20Poly1305> {
    let mut nonce = Nonce::<ChaCha20Poly1305>::default();
    nonce.copy_from_slice(salt);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_open_round_trip() {
        let record = create(None, "admin@example.com", "hunter2").unwrap();
        let keypair = open(&record, "admin@example.com", "hunter2").unwrap();
        assert_eq!(keypair.vk_bytes().as_slice(), record.vk.as_slice());
    }

    #[test]
    fn username_is_case_insensitive_password_is_not() {
        let record = create(None, "Admin@Example.COM", "hunter2").unwrap();
        assert!(open(&record, "admin@example.com", "hunter2").is_ok());

        let err = open(&record, "admin@example.com", "Hunter2").unwrap_err();
        assert!(matches!(err, KeyStoreError::BadCredentials));
    }

    #[test]
    fn seeded_creation_is_deterministic_in_vk() {
        let a = create(Some([42u8; 32]), "u", "p").unwrap();
        let b = create(Some([42u8; 32]), "u", "p").unwrap();
        // Fresh salts give different ciphertexts, same identity.
        assert_eq!(a.vk, b.vk);
        assert_eq!(a.vk_signature, b.vk_signature);
        assert_ne!(a.salt, b.salt);
    }

    #[test]
    fn tampered_ciphertext_reads_as_bad_credentials() {
        let mut record = create(None, "u", "p").unwrap();
        record.ciphertext[0] ^= 0x01;
        let err = open(&record, "u", "p").unwrap_err();
        assert!(matches!(err, KeyStoreError::BadCredentials));
    }
}
