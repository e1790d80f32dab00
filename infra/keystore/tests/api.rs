use clic_keystore::{Credential, EncryptedKeypair, KeyStoreError, create, load, open, save};
use std::fs;
use std::path::PathBuf;

fn record() -> EncryptedKeypair {
    create(Some([0x5Au8; 32]), "admin@example.com", "secret").unwrap()
}

#[test]
fn save_then_load_with_candidate_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.crypto-keypair");

    let record = record();
    save(&record, &path, &[], false).unwrap();

    let candidates = vec![
        Credential::new("admin@example.com", "wrong"),
        Credential::new("nobody@example.com", "secret"),
        Credential::new("ADMIN@example.com", "secret"),
    ];
    let keypair = load(&path, &candidates).unwrap();
    assert_eq!(keypair.vk_bytes().as_slice(), record.vk.as_slice());
}

#[test]
fn load_fails_when_no_candidate_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.crypto-keypair");
    save(&record(), &path, &[], false).unwrap();

    let err = load(&path, &[Credential::new("admin@example.com", "nope")]).unwrap_err();
    assert!(matches!(err, KeyStoreError::BadCredentials));
    assert_eq!(err.code(), "bad-credentials");
}

#[test]
fn save_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agent.crypto-keypair");
    save(&record(), &path, &[], false).unwrap();

    let before = fs::read(&path).unwrap();
    let err = save(&record(), &path, &[], false).unwrap_err();
    assert!(matches!(err, KeyStoreError::FileExists { .. }));
    assert_eq!(fs::read(&path).unwrap(), before, "existing file untouched");
}

#[test]
fn relative_save_honors_search_path_direction() {
    let general = tempfile::tempdir().unwrap();
    let specific = tempfile::tempdir().unwrap();
    let search: Vec<PathBuf> =
        vec![general.path().to_path_buf(), specific.path().to_path_buf()];

    let forward = save(&record(), "fwd.crypto-keypair".as_ref(), &search, false).unwrap();
    assert!(forward.starts_with(general.path()));

    let reverse = save(&record(), "rev.crypto-keypair".as_ref(), &search, true).unwrap();
    assert!(reverse.starts_with(specific.path()));
}

#[test]
fn bad_password_leaves_no_file_behind() {
    let dir = tempfile::tempdir().unwrap();
    let record = record();
    let err = open(&record, "admin@example.com", "wrong").unwrap_err();
    assert!(matches!(err, KeyStoreError::BadCredentials));

    let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "open must not create or modify files");
}

#[test]
fn corrupt_file_is_reported_as_corrupt_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.crypto-keypair");
    fs::write(&path, b"{\"vk\": 17}").unwrap();

    let err = load(&path, &[Credential::new("u", "p")]).unwrap_err();
    assert!(matches!(err, KeyStoreError::CorruptRecord { .. }));
}
