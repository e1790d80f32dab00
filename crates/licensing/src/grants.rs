//! # Grants
//!
//! A grant is a recursive capability table: string keys mapping to scalars
//! (booleans, numbers, strings) or nested tables. A license's grant map
//! keys these tables by service name; verification hands applications the
//! *effective* grant set, the deterministic merge of every grant in the
//! verified license tree.
//!
//! ## Merge semantics
//!
//! Merging walks the verified tree in DFS declaration order, leaves first.
//! Later tables deep-merge over earlier ones key by key, with one escape
//! hatch: entries under an `override` sub-table *replace* the inherited
//! entry outright instead of merging into it, and the wrapper itself never
//! appears in the output. The root license's own grant merges last, so it
//! always has final say over its own service.
//!
//! The merge is pure: the same tree yields byte-identical output, every
//! time. Tables are `BTreeMap`s, so canonical key order is a property of
//! the type rather than a serializer obligation.

use serde::de::{Error as DeError, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key whose entries replace rather than merge.
pub const OVERRIDE_KEY: &str = "override";

/// A single grant value: scalar or nested table. No nulls, no arrays, no
/// cycles (enforced by construction - values own their children).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GrantValue {
    /// Boolean capability switch.
    Bool(bool),
    /// Numeric limit or quota.
    Number(serde_json::Number),
    /// Opaque string capability (license keys, tiers, ...).
    Text(String),
    /// Nested capability table.
    Table(BTreeMap<String, GrantValue>),
}

impl GrantValue {
    /// Returns the nested table, if this value is one.
    #[must_use]
    pub const fn as_table(&self) -> Option<&BTreeMap<String, GrantValue>> {
        match self {
            Self::Table(table) => Some(table),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for GrantValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(GrantValueVisitor)
    }
}

struct GrantValueVisitor;

impl<'de> Visitor<'de> for GrantValueVisitor {
    type Value = GrantValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a boolean, number, string, or capability table")
    }

    fn visit_bool<E: DeError>(self, v: bool) -> Result<Self::Value, E> {
        Ok(GrantValue::Bool(v))
    }

    fn visit_i64<E: DeError>(self, v: i64) -> Result<Self::Value, E> {
        Ok(GrantValue::Number(v.into()))
    }

    fn visit_u64<E: DeError>(self, v: u64) -> Result<Self::Value, E> {
        Ok(GrantValue::Number(v.into()))
    }

    fn visit_f64<E: DeError>(self, v: f64) -> Result<Self::Value, E> {
        serde_json::Number::from_f64(v)
            .map(GrantValue::Number)
            .ok_or_else(|| E::custom("non-finite numbers cannot appear in grants"))
    }

    fn visit_str<E: DeError>(self, v: &str) -> Result<Self::Value, E> {
        Ok(GrantValue::Text(v.to_owned()))
    }

    fn visit_string<E: DeError>(self, v: String) -> Result<Self::Value, E> {
        Ok(GrantValue::Text(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut table = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            if table.contains_key(&key) {
                return Err(A::Error::custom(format!("duplicate grant key `{key}`")));
            }
            let value = map.next_value::<GrantValue>()?;
            table.insert(key, value);
        }
        Ok(GrantValue::Table(table))
    }
}

/// A license's grant map: service name → capability table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Grants(pub BTreeMap<String, GrantValue>);

impl Grants {
    /// Creates an empty grant map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts (or replaces) the capability table for `service`.
    pub fn insert(&mut self, service: impl Into<String>, capability: GrantValue) {
        self.0.insert(service.into(), capability);
    }

    /// The capability table for `service`, if granted.
    #[must_use]
    pub fn get(&self, service: &str) -> Option<&GrantValue> {
        self.0.get(service)
    }

    /// Whether `service` has an entry.
    #[must_use]
    pub fn contains(&self, service: &str) -> bool {
        self.0.contains_key(service)
    }

    /// Iterates services in canonical (sorted) order.
    pub fn services(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Deep-merges `patch` over `self`, consuming `override` wrappers.
    pub fn merge_from(&mut self, patch: &Self) {
        for (service, value) in &patch.0 {
            merge_entry(&mut self.0, service, value);
        }
    }

    /// Whether the leaf or table at `path` exists under `service`.
    #[must_use]
    pub fn contains_path(&self, service: &str, path: &[String]) -> bool {
        let mut current = match self.0.get(service) {
            Some(value) => value,
            None => return false,
        };
        for segment in path {
            match current {
                GrantValue::Table(table) => match table.get(segment) {
                    Some(next) => current = next,
                    None => return false,
                },
                _ => return false,
            }
        }
        true
    }
}

impl<'de> Deserialize<'de> for Grants {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = GrantValue::deserialize(deserializer)?;
        let GrantValue::Table(table) = value else {
            return Err(D::Error::custom("grant map must be a table"));
        };
        for (service, capability) in &table {
            if !matches!(capability, GrantValue::Table(_)) {
                return Err(D::Error::custom(format!(
                    "grant for `{service}` must be a capability table"
                )));
            }
        }
        Ok(Self(table))
    }
}

/// Merges one entry of a patch table into `base`.
fn merge_entry(base: &mut BTreeMap<String, GrantValue>, key: &str, value: &GrantValue) {
    match (base.get_mut(key), value) {
        (Some(GrantValue::Table(existing)), GrantValue::Table(patch)) => {
            merge_table(existing, patch);
        },
        _ => {
            base.insert(key.to_owned(), normalize(value));
        },
    }
}

/// Deep-merges `patch` into `base`. Plain entries merge first, then the
/// `override` entries replace whatever the plain pass left behind.
fn merge_table(base: &mut BTreeMap<String, GrantValue>, patch: &BTreeMap<String, GrantValue>) {
    for (key, value) in patch.iter().filter(|(key, _)| *key != OVERRIDE_KEY) {
        merge_entry(base, key, value);
    }
    if let Some(GrantValue::Table(overrides)) = patch.get(OVERRIDE_KEY) {
        for (key, value) in overrides {
            base.insert(key.clone(), normalize(value));
        }
    }
}

/// Strips `override` wrappers from a value that is being inserted wholesale
/// (nothing underneath to merge into, so the wrapper's entries just land).
fn normalize(value: &GrantValue) -> GrantValue {
    let GrantValue::Table(table) = value else {
        return value.clone();
    };
    let mut out = BTreeMap::new();
    for (key, inner) in table.iter().filter(|(key, _)| *key != OVERRIDE_KEY) {
        out.insert(key.clone(), normalize(inner));
    }
    if let Some(GrantValue::Table(overrides)) = table.get(OVERRIDE_KEY) {
        for (key, inner) in overrides {
            out.insert(key.clone(), normalize(inner));
        }
    }
    GrantValue::Table(out)
}

/// Computes the effective grant set of a verified license tree.
///
/// Grants accumulate leaves-first in DFS declaration order; each license's
/// own grant merges over what its dependencies delivered, and the root
/// merges last, giving it final say over its own service. Sibling
/// dependencies granting the same service merge in declaration order, later
/// ones replacing earlier ones only through `override` entries.
///
/// Pure: the same tree produces byte-identical output on every call.
#[must_use]
pub fn resolve_grants(tree: &crate::verifier::VerifiedLicense) -> Grants {
    let mut effective = Grants::new();
    for dependency in &tree.dependencies {
        effective.merge_from(&resolve_grants(dependency));
    }
    effective.merge_from(&tree.license.grant);
    effective
}

/// Collects the leaf paths a capability table claims under `override`
/// wrappers, with the wrapper segment elided. These are the paths a
/// refining license asserts exist in the dependency it refines.
#[must_use]
pub fn override_paths(value: &GrantValue) -> Vec<Vec<String>> {
    let mut out = Vec::new();
    walk_overrides(value, &mut Vec::new(), &mut out);
    out
}

fn walk_overrides(value: &GrantValue, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    let GrantValue::Table(table) = value else {
        return;
    };
    for (key, inner) in table {
        if key == OVERRIDE_KEY {
            collect_leaves(inner, prefix, out);
        } else {
            prefix.push(key.clone());
            walk_overrides(inner, prefix, out);
            prefix.pop();
        }
    }
}

fn collect_leaves(value: &GrantValue, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    match value {
        GrantValue::Table(table) => {
            for (key, inner) in table {
                prefix.push(key.clone());
                collect_leaves(inner, prefix, out);
                prefix.pop();
            }
        },
        _ => out.push(prefix.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, GrantValue)]) -> GrantValue {
        GrantValue::Table(
            entries.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect(),
        )
    }

    fn text(s: &str) -> GrantValue {
        GrantValue::Text(s.to_owned())
    }

    fn num(n: i64) -> GrantValue {
        GrantValue::Number(n.into())
    }

    #[test]
    fn decode_rejects_duplicate_keys() {
        let err = serde_json::from_str::<Grants>(r#"{"svc":{"a":1,"a":2}}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate grant key"));
    }

    #[test]
    fn decode_rejects_scalar_capability_and_null() {
        assert!(serde_json::from_str::<Grants>(r#"{"svc":5}"#).is_err());
        assert!(serde_json::from_str::<Grants>(r#"{"svc":null}"#).is_err());
        assert!(serde_json::from_str::<Grants>(r#"{"svc":{"a":[1]}}"#).is_err());
    }

    #[test]
    fn plain_entries_deep_merge() {
        let mut base = Grants::new();
        base.insert("svc", table(&[("limits", table(&[("users", num(10))])), ("tier", text("basic"))]));

        let mut patch = Grants::new();
        patch.insert("svc", table(&[("limits", table(&[("machines", num(2))]))]));

        base.merge_from(&patch);
        let svc = base.get("svc").unwrap().as_table().unwrap();
        let limits = svc.get("limits").unwrap().as_table().unwrap();
        assert_eq!(limits.get("users"), Some(&num(10)));
        assert_eq!(limits.get("machines"), Some(&num(2)));
        assert_eq!(svc.get("tier"), Some(&text("basic")));
    }

    #[test]
    fn override_entries_replace_and_wrapper_is_consumed() {
        let mut base = Grants::new();
        base.insert("svc", table(&[("limits", table(&[("users", num(10)), ("machines", num(8))]))]));

        let mut patch = Grants::new();
        patch.insert(
            "svc",
            table(&[("limits", table(&[("override", table(&[("users", num(2))]))]))]),
        );

        base.merge_from(&patch);
        let svc = base.get("svc").unwrap().as_table().unwrap();
        let limits = svc.get("limits").unwrap().as_table().unwrap();
        assert_eq!(limits.get("users"), Some(&num(2)), "override replaces");
        assert_eq!(limits.get("machines"), Some(&num(8)), "siblings survive");
        assert!(!limits.contains_key(OVERRIDE_KEY), "wrapper never appears in output");
    }

    #[test]
    fn override_beats_plain_siblings_in_same_patch() {
        let mut base = Grants::new();
        base.insert("svc", table(&[("users", num(1))]));

        let mut patch = Grants::new();
        patch.insert(
            "svc",
            table(&[("users", num(5)), ("override", table(&[("users", num(3))]))]),
        );

        base.merge_from(&patch);
        let svc = base.get("svc").unwrap().as_table().unwrap();
        assert_eq!(svc.get("users"), Some(&num(3)));
    }

    #[test]
    fn merge_order_is_not_commutative() {
        let a = {
            let mut g = Grants::new();
            g.insert("svc", table(&[("tier", text("basic"))]));
            g
        };
        let b = {
            let mut g = Grants::new();
            g.insert("svc", table(&[("tier", text("pro"))]));
            g
        };

        let mut ab = a.clone();
        ab.merge_from(&b);
        let mut ba = b.clone();
        ba.merge_from(&a);
        assert_ne!(ab, ba);
    }

    #[test]
    fn override_paths_elide_the_wrapper() {
        let value = table(&[
            ("limits", table(&[("override", table(&[("users", num(1)), ("deep", table(&[("x", num(2))]))]))])),
            ("plain", text("untouched")),
        ]);

        let mut paths = override_paths(&value);
        paths.sort();
        assert_eq!(
            paths,
            vec![
                vec!["limits".to_owned(), "deep".to_owned(), "x".to_owned()],
                vec!["limits".to_owned(), "users".to_owned()],
            ]
        );
    }

    #[test]
    fn contains_path_walks_tables() {
        let mut grants = Grants::new();
        grants.insert("svc", table(&[("limits", table(&[("users", num(10))]))]));

        assert!(grants.contains_path("svc", &["limits".to_owned(), "users".to_owned()]));
        assert!(grants.contains_path("svc", &["limits".to_owned()]));
        assert!(!grants.contains_path("svc", &["limits".to_owned(), "machines".to_owned()]));
        assert!(!grants.contains_path("other", &[]));
    }

    #[test]
    fn merge_is_pure() {
        let mut base = Grants::new();
        base.insert("svc", table(&[("a", num(1))]));
        let mut patch = Grants::new();
        patch.insert("svc", table(&[("b", num(2))]));

        let mut first = base.clone();
        first.merge_from(&patch);
        let mut second = base.clone();
        second.merge_from(&patch);

        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }
}
