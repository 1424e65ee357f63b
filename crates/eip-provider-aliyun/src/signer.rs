//! ACS3-HMAC-SHA256 request signing
//!
//! Every request carries a canonical set of `x-acs-*` headers plus an
//! `Authorization` header derived from them. The payload is always empty:
//! RPC-style parameters travel in the query string.

use eip_core::{Error, Result};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub(crate) const ALGORITHM: &str = "ACS3-HMAC-SHA256";

type HmacSha256 = Hmac<Sha256>;

/// Everything that goes into one signature
#[derive(Debug, Clone)]
pub(crate) struct RequestToSign<'a> {
    pub method: &'a str,
    /// `host[:port]` exactly as sent
    pub host: &'a str,
    pub action: &'a str,
    pub version: &'a str,
    pub query: &'a BTreeMap<String, String>,
    /// UTC, `%Y-%m-%dT%H:%M:%SZ`
    pub date: String,
    pub nonce: String,
}

/// RFC 3986 encoding: only `A-Z a-z 0-9 - _ . ~` pass through
pub(crate) fn percent_encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Encoded `k=v` pairs joined by `&`, sorted by encoded key
pub(crate) fn canonical_query(params: &BTreeMap<String, String>) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub(crate) fn hmac_sha256_hex(secret: &str, data: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| Error::auth("Access key secret is not a usable HMAC key"))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build the signed header set for `request`
///
/// Returns lowercase header names mapped to values, including `host` and
/// `authorization`.
pub(crate) fn sign(
    request: &RequestToSign<'_>,
    access_key_id: &str,
    access_key_secret: &str,
) -> Result<BTreeMap<&'static str, String>> {
    let payload_hash = sha256_hex(b"");

    let mut headers: BTreeMap<&'static str, String> = BTreeMap::new();
    headers.insert("host", request.host.to_string());
    headers.insert("x-acs-action", request.action.to_string());
    headers.insert("x-acs-content-sha256", payload_hash.clone());
    headers.insert("x-acs-date", request.date.clone());
    headers.insert("x-acs-signature-nonce", request.nonce.clone());
    headers.insert("x-acs-version", request.version.to_string());

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value.trim()))
        .collect();
    let signed_headers = headers.keys().copied().collect::<Vec<_>>().join(";");

    let canonical_request = format!(
        "{}\n/\n{}\n{}\n{}\n{}",
        request.method,
        canonical_query(request.query),
        canonical_headers,
        signed_headers,
        payload_hash
    );
    let string_to_sign = format!(
        "{}\n{}",
        ALGORITHM,
        sha256_hex(canonical_request.as_bytes())
    );
    let signature = hmac_sha256_hex(access_key_secret, &string_to_sign)?;

    headers.insert(
        "authorization",
        format!(
            "{} Credential={},SignedHeaders={},Signature={}",
            ALGORITHM, access_key_id, signed_headers, signature
        ),
    );

    Ok(headers)
}
