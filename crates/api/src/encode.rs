//! RFC 3986 percent-encoding used for OAuth base strings and headers.
//!
//! Everything except the unreserved set (`A-Z a-z 0-9 - . _ ~`) is encoded
//! as `%XX` with uppercase hex. Space becomes `%20` (never `+`) and `~` is
//! left alone, which is the stricter form OAuth 1.0 requires.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const RFC3986_UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a single value.
pub fn encode(input: &str) -> String {
    utf8_percent_encode(input, RFC3986_UNRESERVED).to_string()
}

/// Encode each element of a sequence.
pub fn encode_all<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| encode(s.as_ref())).collect()
}

/// Encode every key and value of a mapping, preserving order.
pub fn encode_pairs<I, K, V>(pairs: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (encode(k.as_ref()), encode(v.as_ref())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_space_and_tilde() {
        assert_eq!(encode("a b~c"), "a%20b~c");
    }

    #[test]
    fn test_reserved_characters() {
        assert_eq!(encode("+"), "%2B");
        assert_eq!(encode("foo=bar&baz"), "foo%3Dbar%26baz");
        assert_eq!(encode("http://vimeo.com/api/rest/v2"), "http%3A%2F%2Fvimeo.com%2Fapi%2Frest%2Fv2");
        assert_eq!(encode("-._~"), "-._~");
    }

    #[test]
    fn test_utf8_is_encoded_bytewise() {
        assert_eq!(encode("é"), "%C3%A9");
    }

    #[test]
    fn test_encode_all_and_pairs() {
        assert_eq!(encode_all(&["GET", "a b"]), vec!["GET", "a%20b"]);
        let pairs = encode_pairs([("k y", "v/al")]);
        assert_eq!(pairs, vec![("k%20y".to_string(), "v%2Fal".to_string())]);
    }

    proptest! {
        #[test]
        fn prop_output_is_unreserved_or_escaped(s in ".*") {
            let out = encode(&s);
            let bytes = out.as_bytes();
            let mut i = 0;
            while i < bytes.len() {
                let b = bytes[i];
                if b == b'%' {
                    prop_assert!(i + 2 < bytes.len());
                    prop_assert!(bytes[i + 1].is_ascii_hexdigit() && bytes[i + 2].is_ascii_hexdigit());
                    prop_assert!(!bytes[i + 1].is_ascii_lowercase() && !bytes[i + 2].is_ascii_lowercase());
                    i += 3;
                } else {
                    prop_assert!(b.is_ascii_alphanumeric() || b"-._~".contains(&b));
                    i += 1;
                }
            }
        }

        #[test]
        fn prop_decodes_back_to_input(s in ".*") {
            let out = encode(&s);
            let decoded = percent_encoding::percent_decode_str(&out).decode_utf8_lossy().into_owned();
            prop_assert_eq!(decoded, s);
        }
    }
}
