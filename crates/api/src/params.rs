//! Typed parameter sets for a signed call.
//!
//! OAuth fields and API fields live in separate types. They are only merged
//! into a [`SignedParams`] view for signing and transmission.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::cache::Fingerprint;
use crate::encode::encode;

pub const OAUTH_VERSION: &str = "1.0";
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";

/// Parameters that change on every call and must not affect cache identity.
pub const VOLATILE_KEYS: [&str; 3] = ["oauth_nonce", "oauth_signature", "oauth_timestamp"];

// ── OAuth parameters ────────────────────────────────────────────────

/// The `oauth_*` half of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthParams {
    pub consumer_key: String,
    pub token: Option<String>,
    pub nonce: String,
    pub timestamp: u64,
    pub callback: Option<String>,
    pub verifier: Option<String>,
    pub signature: Option<String>,
}

impl OAuthParams {
    /// Default set with a fresh nonce and the current timestamp.
    pub fn fresh(consumer_key: &str, token: Option<&str>) -> Self {
        Self {
            consumer_key: consumer_key.to_string(),
            token: token.map(String::from),
            nonce: generate_nonce(),
            timestamp: unix_timestamp(),
            callback: None,
            verifier: None,
            signature: None,
        }
    }

    pub fn with_callback(mut self, callback: &str) -> Self {
        self.callback = Some(callback.to_string());
        self
    }

    pub fn with_verifier(mut self, verifier: &str) -> Self {
        self.verifier = Some(verifier.to_string());
        self
    }

    /// Wire pairs in a stable order. The signature is included once set.
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("oauth_consumer_key", self.consumer_key.clone()),
            ("oauth_version", OAUTH_VERSION.to_string()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", self.timestamp.to_string()),
            ("oauth_nonce", self.nonce.clone()),
        ];
        if let Some(ref token) = self.token {
            pairs.push(("oauth_token", token.clone()));
        }
        if let Some(ref callback) = self.callback {
            pairs.push(("oauth_callback", callback.clone()));
        }
        if let Some(ref verifier) = self.verifier {
            pairs.push(("oauth_verifier", verifier.clone()));
        }
        if let Some(ref signature) = self.signature {
            pairs.push(("oauth_signature", signature.clone()));
        }
        pairs
    }
}

/// 32 random hex characters.
pub fn generate_nonce() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

/// Seconds since the Unix epoch.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

// ── API parameters ──────────────────────────────────────────────────

/// The method-specific half of a request, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiParams(BTreeMap<String, String>);

impl ApiParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn extend(&mut self, other: ApiParams) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ApiParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// ── Signed view ─────────────────────────────────────────────────────

/// OAuth and API parameters of one call, with the signature filled in.
#[derive(Debug, Clone)]
pub struct SignedParams {
    pub oauth: OAuthParams,
    pub api: ApiParams,
}

impl SignedParams {
    /// OAuth pairs followed by API pairs.
    pub fn merged(&self) -> Vec<(String, String)> {
        self.oauth
            .pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .chain(self.api.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .collect()
    }

    pub fn api_pairs(&self) -> Vec<(String, String)> {
        self.api.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    /// Cache key over the merged set with volatile fields removed.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.merged())
    }

    /// `OAuth realm="",k="v",...` with keys and values percent-encoded.
    pub fn authorization_header(&self) -> String {
        let mut header = String::from("OAuth realm=\"\"");
        for (k, v) in self.oauth.pairs() {
            header.push_str(&format!(",{}=\"{}\"", encode(k), encode(&v)));
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oauth() -> OAuthParams {
        OAuthParams {
            consumer_key: "key".into(),
            token: Some("tok".into()),
            nonce: "n1".into(),
            timestamp: 100,
            callback: None,
            verifier: None,
            signature: None,
        }
    }

    #[test]
    fn test_nonce_shape_and_uniqueness() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_fresh_params_carry_token_only_when_present() {
        let with = OAuthParams::fresh("key", Some("tok"));
        assert!(with.pairs().iter().any(|(k, v)| *k == "oauth_token" && v == "tok"));

        let without = OAuthParams::fresh("key", None);
        assert!(!without.pairs().iter().any(|(k, _)| *k == "oauth_token"));
        assert!(without.timestamp > 0);
    }

    #[test]
    fn test_merged_keeps_buckets_apart() {
        let signed = SignedParams {
            oauth: oauth(),
            api: ApiParams::new().with("video_id", "42").with("format", "json"),
        };
        let merged = signed.merged();
        assert_eq!(merged.first().map(|(k, _)| k.as_str()), Some("oauth_consumer_key"));
        assert_eq!(merged.len(), 6 + 2);
        assert_eq!(signed.api_pairs().len(), 2);
    }

    #[test]
    fn test_authorization_header_format() {
        let mut params = oauth();
        params.signature = Some("ab+c/=".into());
        let signed = SignedParams { oauth: params, api: ApiParams::new() };
        let header = signed.authorization_header();
        assert!(header.starts_with("OAuth realm=\"\",oauth_consumer_key=\"key\""));
        assert!(header.contains(",oauth_token=\"tok\""));
        assert!(header.ends_with(",oauth_signature=\"ab%2Bc%2F%3D\""));
        assert!(!header.contains(", "));
    }

    #[test]
    fn test_api_params_from_iter_sorted() {
        let params: ApiParams = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(params.get("b"), Some("2"));
    }
}
