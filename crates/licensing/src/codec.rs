//! # Canonical Codec
//!
//! One byte form feeds both signing and verification, so it has to be
//! deterministic: UTF-8 JSON with keys sorted at every level, no
//! insignificant whitespace, integers without a trailing `.0`, floats in
//! shortest round-trip form, binary fields as unpadded base64, and omitted
//! fields absent rather than null.
//!
//! Sorting falls out of the serializer: records are first converted to a
//! [`serde_json::Value`], whose object type is a `BTreeMap` (the crate's
//! `preserve_order` feature must stay off), then written compactly.
//!
//! Decoding is strict: duplicate keys, unknown fields, trailing bytes, and
//! non-UTF-8 input are all rejected. The round-trip law is
//! `encode(decode(encode(x))) == encode(x)`; input that was already
//! canonical survives `encode(decode(b)) == b` exactly.

use crate::error::LicenseError;
use crate::{License, SignedLicense};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Produces the canonical byte form of any license-shaped record. These are
/// the bytes an author signs.
///
/// # Errors
/// Returns [`LicenseError::CorruptRecord`] when the record cannot be
/// serialized, which indicates a bug rather than bad input.
pub fn canonical_bytes<T: Serialize>(record: &T) -> Result<Vec<u8>, LicenseError> {
    let value = serde_json::to_value(record)
        .map_err(|e| LicenseError::CorruptRecord { reason: e.to_string() })?;
    serde_json::to_vec(&value).map_err(|e| LicenseError::CorruptRecord { reason: e.to_string() })
}

/// Encodes an unsigned license into canonical bytes.
///
/// # Errors
/// See [`canonical_bytes`].
pub fn encode_license(license: &License) -> Result<Vec<u8>, LicenseError> {
    canonical_bytes(license)
}

/// Decodes an unsigned license, strictly.
///
/// # Errors
/// Returns [`LicenseError::CorruptRecord`] for malformed input.
pub fn decode_license(bytes: &[u8]) -> Result<License, LicenseError> {
    decode(bytes)
}

/// Encodes a signed license into canonical bytes - the `*.crypto-license`
/// file content.
///
/// # Errors
/// See [`canonical_bytes`].
pub fn encode_signed(signed: &SignedLicense) -> Result<Vec<u8>, LicenseError> {
    canonical_bytes(signed)
}

/// Decodes a signed license, strictly.
///
/// # Errors
/// Returns [`LicenseError::CorruptRecord`] for malformed input.
pub fn decode_signed(bytes: &[u8]) -> Result<SignedLicense, LicenseError> {
    decode(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LicenseError> {
    serde_json::from_slice(bytes).map_err(|e| LicenseError::CorruptRecord { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grants::{GrantValue, Grants};
    use crate::{Author, Client, Timespan};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn sample() -> License {
        let mut capability = BTreeMap::new();
        capability.insert("seats".to_owned(), GrantValue::Number(5.into()));
        let mut grant = Grants::new();
        grant.insert("awesome-py-app", GrantValue::Table(capability));

        License {
            author: Author::new("Acme", "acme.example", "AwesomePyApp", [7u8; 32]),
            client: Some(Client::new("agent", [9u8; 32])),
            dependencies: Vec::new(),
            grant,
            machine: None,
            timespan: Some(Timespan::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
                86_400,
            )),
        }
    }

    #[test]
    fn canonical_output_is_sorted_compact_and_unpadded() {
        let bytes = encode_license(&sample()).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();

        let author = text.find("\"author\"").unwrap();
        let client = text.find("\"client\"").unwrap();
        let grant = text.find("\"grant\"").unwrap();
        let timespan = text.find("\"timespan\"").unwrap();
        assert!(author < client && client < grant && grant < timespan);

        assert!(!text.contains(": "), "no insignificant whitespace");
        assert!(!text.contains('='), "unpadded base64");
        assert!(!text.contains("dependencies"), "omitted fields are absent");
        assert!(!text.contains("machine"), "omitted fields are absent");
        assert!(text.contains("\"length\":86400"), "integers carry no decimal point");
        assert!(text.contains("2024-06-01T12:00:00Z"), "RFC3339 start");
    }

    #[test]
    fn round_trip_law_holds() {
        let once = encode_license(&sample()).unwrap();
        let twice = encode_license(&decode_license(&once).unwrap()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn non_canonical_input_normalizes_on_reencode() {
        // Same record, keys deliberately out of order and base64 padded-free
        // already, but with extra whitespace.
        let bytes = encode_license(&sample()).unwrap();
        let loose = {
            let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            serde_json::to_vec_pretty(&value).unwrap()
        };
        assert_ne!(loose, bytes);

        let reencoded = encode_license(&decode_license(&loose).unwrap()).unwrap();
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn decode_rejects_trailing_bytes_unknown_fields_and_bad_utf8() {
        let mut bytes = encode_license(&sample()).unwrap();

        let with_unknown = {
            let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            value.as_object_mut().unwrap().insert("surprise".into(), 1.into());
            serde_json::to_vec(&value).unwrap()
        };
        assert!(decode_license(&with_unknown).is_err());

        bytes.extend_from_slice(b" {}");
        assert!(decode_license(&bytes).is_err());

        assert!(decode_license(&[0xFF, 0xFE, b'{', b'}']).is_err());
    }

    #[test]
    fn decode_rejects_duplicate_struct_fields() {
        let raw = br#"{"author":{"domain":"d","name":"n","product":"p","service":"s","pubkey":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"},"grant":{"s":{}},"grant":{"s":{}}}"#;
        let err = decode_license(raw).unwrap_err();
        assert!(matches!(err, LicenseError::CorruptRecord { .. }));
    }

    #[test]
    fn signed_record_embeds_license_verbatim() {
        let signed = SignedLicense { license: sample(), signature: vec![3u8; 64] };
        let bytes = encode_signed(&signed).unwrap();
        let parsed = decode_signed(&bytes).unwrap();
        assert_eq!(parsed, signed);
        assert_eq!(encode_signed(&parsed).unwrap(), bytes);
    }
}
