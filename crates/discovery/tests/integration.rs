use clic_discovery::{DiscoveryOptions, SearchPath, discover};
use clic_keystore::Credential;
use clic_licensing::issuer::{IssueOptions, LicenseDraft, issue};
use clic_licensing::{Author, Client, GrantValue, Grants, SignedLicense, Verifier};
use clic_resolver::StaticResolver;
use std::fs;
use std::path::Path;

const USERNAME: &str = "agent@example.com";
const PASSWORD: &str = "hunter2";

fn grants_for(service: &str) -> Grants {
    let mut grants = Grants::new();
    grants.insert(service, GrantValue::Table(std::collections::BTreeMap::new()));
    grants
}

/// Creates a keypair file and returns its record plus a resolver that
/// publishes the author identity derived from `author_seed`.
fn fixture(dir: &Path, client_bound: bool) -> (StaticResolver, SignedLicense) {
    let keypair_record = clic_keystore::create(Some([21u8; 32]), USERNAME, PASSWORD).unwrap();
    clic_keystore::save(&keypair_record, &dir.join("agent.crypto-keypair"), &[], false).unwrap();
    let agent = clic_keystore::open(&keypair_record, USERNAME, PASSWORD).unwrap();

    let author_keypair =
        clic_keystore::open(&clic_keystore::create(Some([22u8; 32]), "vendor", "pw").unwrap(), "vendor", "pw")
            .unwrap();
    let author = Author::new("Vendor", "vendor.example", "Tool", author_keypair.vk_bytes());

    let mut resolver = StaticResolver::new();
    resolver.publish("tool", "vendor.example", author_keypair.vk_bytes());

    let mut verifier = Verifier::new(&resolver);
    let mut draft = LicenseDraft::new(author, grants_for("tool"));
    if client_bound {
        draft.client = Some(Client::new("agent", agent.vk_bytes()));
    }
    let options = IssueOptions { no_confirm: true, ..IssueOptions::default() };
    let signed = issue(&author_keypair, draft, &mut verifier, &options, None).unwrap();

    fs::write(dir.join("tool.crypto-license"), signed.to_bytes().unwrap()).unwrap();
    (resolver, signed)
}

fn credentials() -> Vec<Credential> {
    vec![Credential::new(USERNAME, PASSWORD)]
}

#[test]
fn yields_keypair_with_matching_client_bound_license() {
    let dir = tempfile::tempdir().unwrap();
    let (resolver, signed) = fixture(dir.path(), true);

    let search = SearchPath::new(vec![dir.path().to_path_buf()]);
    let options = DiscoveryOptions { credentials: credentials(), ..DiscoveryOptions::default() };
    let candidates: Vec<_> = discover(&search, &resolver, options).collect();

    assert_eq!(candidates.len(), 1);
    let candidate = &candidates[0];
    let license = candidate.license.as_ref().expect("license should pair");
    assert_eq!(license.signed, signed);
    assert!(license.verified.effective_grants().contains("tool"));
}

#[test]
fn bearer_license_pairs_with_any_keypair() {
    let dir = tempfile::tempdir().unwrap();
    let (resolver, _) = fixture(dir.path(), false);

    let search = SearchPath::new(vec![dir.path().to_path_buf()]);
    let options = DiscoveryOptions { credentials: credentials(), ..DiscoveryOptions::default() };
    let candidates: Vec<_> = discover(&search, &resolver, options).collect();

    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].license.is_some());
}

#[test]
fn foreign_client_license_yields_keypair_without_license() {
    let dir = tempfile::tempdir().unwrap();
    let (resolver, signed) = fixture(dir.path(), true);

    // Replace the license with one naming a different client key.
    let author_keypair =
        clic_keystore::open(&clic_keystore::create(Some([22u8; 32]), "vendor", "pw").unwrap(), "vendor", "pw")
            .unwrap();
    let mut draft = LicenseDraft::new(signed.license.author.clone(), grants_for("tool"));
    draft.client = Some(Client::new("somebody-else", [99u8; 32]));
    let mut verifier = Verifier::new(&resolver);
    let options = IssueOptions { no_confirm: true, ..IssueOptions::default() };
    let foreign = issue(&author_keypair, draft, &mut verifier, &options, None).unwrap();
    fs::write(dir.path().join("tool.crypto-license"), foreign.to_bytes().unwrap()).unwrap();

    let search = SearchPath::new(vec![dir.path().to_path_buf()]);
    let options = DiscoveryOptions { credentials: credentials(), ..DiscoveryOptions::default() };
    let candidates: Vec<_> = discover(&search, &resolver, options).collect();

    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].license.is_none(), "foreign client must not pair");
}

#[test]
fn unopenable_keypairs_yield_nothing_but_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let (resolver, _) = fixture(dir.path(), true);

    let search = SearchPath::new(vec![dir.path().to_path_buf()]);
    let options = DiscoveryOptions {
        credentials: vec![Credential::new(USERNAME, "wrong password")],
        ..DiscoveryOptions::default()
    };
    let mut discovery = discover(&search, &resolver, options);
    assert!(discovery.next().is_none());
    assert_eq!(discovery.keypairs_found(), 1);
    assert_eq!(discovery.keypairs_opened(), 0);
}

#[test]
fn files_are_found_across_the_whole_search_path() {
    let general = tempfile::tempdir().unwrap();
    let specific = tempfile::tempdir().unwrap();

    // License lands in the general dir, keypair in the specific one.
    let (resolver, _) = fixture(general.path(), false);
    fs::remove_file(general.path().join("agent.crypto-keypair")).unwrap();
    let record = clic_keystore::create(Some([21u8; 32]), USERNAME, PASSWORD).unwrap();
    clic_keystore::save(&record, &specific.path().join("agent.crypto-keypair"), &[], false).unwrap();

    let search =
        SearchPath::new(vec![general.path().to_path_buf(), specific.path().to_path_buf()]);
    let options = DiscoveryOptions { credentials: credentials(), ..DiscoveryOptions::default() };
    let candidates: Vec<_> = discover(&search, &resolver, options).collect();

    assert_eq!(candidates.len(), 1);
    assert!(candidates[0].license.is_some());
    assert!(candidates[0].keypair_path.starts_with(specific.path()));
}
