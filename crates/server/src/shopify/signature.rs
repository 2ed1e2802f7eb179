//! Shopify request signature verification.
//!
//! Two schemes share HMAC-SHA256 with the app secret but build the signed
//! message differently:
//!
//! - App Proxy requests: every query parameter except `signature`, multi-valued
//!   parameters joined by `,`, sorted by key and concatenated as `k=v` with no
//!   separator. The digest arrives hex-encoded in `signature`.
//! - OAuth callbacks: every parameter except `hmac` and `signature`, sorted by
//!   key and joined as `k=v` with `&`. The digest arrives hex-encoded in `hmac`.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Parse a raw query string into ordered key/value pairs.
#[must_use]
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Verify an App Proxy request signature.
#[must_use]
pub fn verify_app_proxy(pairs: &[(String, String)], secret: &SecretString) -> bool {
    let Some(provided) = find(pairs, "signature") else {
        return false;
    };

    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (key, value) in pairs {
        if key != "signature" {
            grouped.entry(key.as_str()).or_default().push(value.as_str());
        }
    }

    let message: String = grouped
        .iter()
        .map(|(k, values)| format!("{k}={}", values.join(",")))
        .collect();

    verify_hex(secret, &message, provided)
}

/// Verify the `hmac` parameter of an OAuth callback.
#[must_use]
pub fn verify_oauth_hmac(pairs: &[(String, String)], secret: &SecretString) -> bool {
    let Some(provided) = find(pairs, "hmac") else {
        return false;
    };

    let mut sorted: Vec<(&str, &str)> = pairs
        .iter()
        .filter(|(k, _)| k != "hmac" && k != "signature")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    sorted.sort_unstable();

    let message = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    verify_hex(secret, &message, provided)
}

/// Hex HMAC-SHA256 of `message`, as Shopify would send it.
///
/// # Panics
///
/// Never in practice: HMAC keys may have any length.
#[must_use]
pub fn sign(secret: &SecretString, message: &str) -> String {
    let mut mac = new_mac(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn find<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn new_mac(secret: &SecretString) -> Result<HmacSha256, hmac::digest::InvalidLength> {
    HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
}

// Constant-time comparison via `verify_slice`.
fn verify_hex(secret: &SecretString, message: &str, provided_hex: &str) -> bool {
    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };
    let Ok(mut mac) = new_mac(secret) else {
        return false;
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("hush")
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_app_proxy_valid_signature() {
        let message = "extra=1,2logged_in_customer_id=path_prefix=/apps/codshop=demo.myshopify.comtimestamp=1317327555";
        let signature = sign(&secret(), message);

        let query = pairs(&[
            ("shop", "demo.myshopify.com"),
            ("logged_in_customer_id", ""),
            ("path_prefix", "/apps/cod"),
            ("timestamp", "1317327555"),
            ("extra", "1"),
            ("extra", "2"),
            ("signature", signature.as_str()),
        ]);

        assert!(verify_app_proxy(&query, &secret()));
    }

    #[test]
    fn test_app_proxy_rejects_tampering() {
        let signature = sign(&secret(), "shop=demo.myshopify.comtimestamp=1");
        let query = pairs(&[
            ("shop", "other.myshopify.com"),
            ("timestamp", "1"),
            ("signature", signature.as_str()),
        ]);
        assert!(!verify_app_proxy(&query, &secret()));
    }

    #[test]
    fn test_app_proxy_rejects_missing_or_garbage_signature() {
        let query = pairs(&[("shop", "demo.myshopify.com")]);
        assert!(!verify_app_proxy(&query, &secret()));

        let query = pairs(&[("shop", "demo.myshopify.com"), ("signature", "zz-not-hex")]);
        assert!(!verify_app_proxy(&query, &secret()));
    }

    #[test]
    fn test_oauth_hmac_valid() {
        let message = "code=0907a61c0c8d55e99db179b68161bc00&shop=demo.myshopify.com&state=abc&timestamp=1337178173";
        let hmac = sign(&secret(), message);

        let query = pairs(&[
            ("hmac", hmac.as_str()),
            ("timestamp", "1337178173"),
            ("state", "abc"),
            ("shop", "demo.myshopify.com"),
            ("code", "0907a61c0c8d55e99db179b68161bc00"),
        ]);

        assert!(verify_oauth_hmac(&query, &secret()));
        assert!(!verify_oauth_hmac(&query, &SecretString::from("other")));
    }

    #[test]
    fn test_parse_query_decodes() {
        let parsed = parse_query("shop=demo.myshopify.com&path_prefix=%2Fapps%2Fcod&x=a+b");
        assert_eq!(parsed[1], ("path_prefix".to_string(), "/apps/cod".to_string()));
        assert_eq!(parsed[2].1, "a b");
    }
}
