use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

/// Normalized query parameters of a list request.
///
/// Only whitelisted keys survive. Values are trimmed and lower-cased, empty
/// values are dropped and repeated keys are joined with `,` in arrival
/// order. Keys are kept sorted so the digest ignores parameter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, String>);

impl QueryParams {
    pub fn normalize<I, K, V>(pairs: I, allowed: &[&str]) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut params: BTreeMap<String, String> = BTreeMap::new();

        for (key, value) in pairs {
            let key = key.as_ref().trim();
            if !allowed.contains(&key) {
                continue;
            }
            let value = value.as_ref().trim().to_lowercase();
            if value.is_empty() {
                continue;
            }
            params
                .entry(key.to_string())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Hex SHA-256 over the sorted parameters.
    ///
    /// Every key and value is length-prefixed, so no value can forge a
    /// separator.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in &self.0 {
            for part in [key, value] {
                hasher.update((part.len() as u64).to_be_bytes());
                hasher.update(part.as_bytes());
            }
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALLOWED: &[&str] = &["search", "category", "ordering"];

    #[test]
    fn digest_ignores_order_and_case() {
        let a = QueryParams::normalize([("search", " Phone "), ("category", "2")], ALLOWED);
        let b = QueryParams::normalize([("category", "2"), ("search", "phone")], ALLOWED);
        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn unknown_and_empty_keys_dropped() {
        let params = QueryParams::normalize(
            [("search", ""), ("utm_source", "mail"), ("category", "3")],
            ALLOWED,
        );
        assert_eq!(params.get("search"), None);
        assert_eq!(params.get("utm_source"), None);
        assert_eq!(params.get("category"), Some("3"));
        assert_eq!(params, QueryParams::normalize([("category", "3")], ALLOWED));
    }

    #[test]
    fn repeated_keys_are_joined() {
        let params = QueryParams::normalize(
            [("ordering", "-created_at"), ("ordering", "status")],
            ALLOWED,
        );
        assert_eq!(params.get("ordering"), Some("-created_at,status"));
    }

    #[test]
    fn different_params_differ() {
        let a = QueryParams::normalize([("search", "ab")], ALLOWED);
        let b = QueryParams::normalize([("search", "a"), ("category", "b")], ALLOWED);
        assert_ne!(a.digest(), b.digest());
        assert_ne!(a.digest(), QueryParams::default().digest());
    }
}
