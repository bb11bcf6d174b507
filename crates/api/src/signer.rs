//! OAuth 1.0 HMAC-SHA1 request signing.
//!
//! ```text
//! base string = enc(METHOD) & enc(base url) & enc(k1=v1&k2=v2...)
//! key         = enc(consumer secret) & enc(token secret)
//! signature   = base64(HMAC-SHA1(key, base string))
//! ```
//!
//! Pairs are sorted by raw key (byte order) and each key and value is
//! encoded once before joining, then the joined query is encoded again as
//! a whole. The remote API recomputes this exactly.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::encode::encode;

type HmacSha1 = Hmac<Sha1>;

/// Build the signature base string.
pub fn base_string<K, V>(params: &[(K, V)], method: &str, url: &str) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let query = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        encode(&method.to_uppercase()),
        encode(url),
        encode(&query)
    )
}

/// Build the HMAC key from the consumer secret and optional token secret.
pub fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        encode(consumer_secret),
        encode(token_secret.unwrap_or(""))
    )
}

/// Compute the `oauth_signature` value for a parameter set.
pub fn sign<K, V>(
    params: &[(K, V)],
    method: &str,
    url: &str,
    consumer_secret: &str,
    token_secret: Option<&str>,
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let base = base_string(params, method, url);
    let key = signing_key(consumer_secret, token_secret);

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(base.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}
