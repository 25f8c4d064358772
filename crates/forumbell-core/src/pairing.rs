// ── Pairing protocol ──
//
// Stateless half of the user-API-key handshake:
//
//   1. Build `/user-api-key/new?...` carrying a nonce, the client id and
//      our public key. The user approves it in a browser.
//   2. The site redirects to our custom scheme with `payload=<base64>`,
//      an RSA ciphertext of `{"nonce": ..., "key": ...}`.
//   3. Decrypt and parse that payload.
//
// Matching the nonce against the pending request is the registry's job;
// it owns the session state.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

use forumbell_api::discovery::USER_API_KEY_PATH;

use crate::config::PairingOptions;
use crate::error::CoreError;
use crate::keystore::KeyPair;

/// Marker preceding the encrypted reply in the redirect URL.
pub const PAYLOAD_MARKER: &str = "payload=";

const CLIENT_ID_BYTES: usize = 32;
const NONCE_BYTES: usize = 16;

/// The decrypted reply to a pairing request.
#[derive(Debug)]
pub struct PairingReply {
    pub nonce: String,
    /// The newly issued user API key.
    pub key: SecretString,
}

#[derive(Deserialize)]
struct RawReply {
    nonce: String,
    key: String,
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// A fresh per-installation client id (64 hex chars).
pub fn generate_client_id() -> String {
    random_hex(CLIENT_ID_BYTES)
}

/// A fresh single-use nonce (32 hex chars).
pub fn generate_nonce() -> String {
    random_hex(NONCE_BYTES)
}

/// Encode `key=value` pairs, each component percent-encoded on its own.
///
/// Multi-valued parameters are joined with `,` before encoding.
pub fn serialize_params(params: &[(&str, &[&str])]) -> String {
    params
        .iter()
        .map(|(key, values)| {
            format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&values.join(","))
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the authorization URL the user opens to approve this device.
pub fn build_pairing_url(
    site_url: &str,
    client_id: &str,
    nonce: &str,
    public_key: &str,
    device_name: &str,
    options: &PairingOptions,
) -> Result<Url, CoreError> {
    let application_name = format!("{} - {device_name}", options.application_label);
    let query = serialize_params(&[
        ("access", &["rp"]),
        ("client_id", &[client_id]),
        ("nonce", &[nonce]),
        ("push_url", &[options.push_url.as_str()]),
        ("auth_redirect", &[options.auth_redirect.as_str()]),
        ("application_name", &[application_name.as_str()]),
        ("public_key", &[public_key]),
    ]);

    let full = format!("{}{USER_API_KEY_PATH}?{query}", site_url.trim_end_matches('/'));
    Url::parse(&full).map_err(|e| CoreError::Config {
        message: format!("invalid site URL '{site_url}': {e}"),
    })
}

/// Decrypt and parse an encrypted pairing reply.
///
/// `payload` is base64 (line breaks tolerated) of an RSA ciphertext
/// whose plaintext is JSON with string fields `nonce` and `key`.
pub fn decrypt_reply(payload: &str, keys: &KeyPair) -> Result<PairingReply, CoreError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let ciphertext = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| CoreError::PairingFailure {
            reason: format!("payload is not base64: {e}"),
        })?;

    let plaintext = keys.decrypt(&ciphertext)?;
    let raw: RawReply =
        serde_json::from_slice(&plaintext).map_err(|e| CoreError::PairingFailure {
            reason: format!("reply is not valid JSON: {e}"),
        })?;

    Ok(PairingReply {
        nonce: raw.nonce,
        key: SecretString::from(raw.key),
    })
}

/// Pull the percent-decoded payload out of an incoming redirect URL.
///
/// Returns `None` unless the URL contains the marker exactly once.
pub fn extract_payload(incoming: &str) -> Option<String> {
    let mut parts = incoming.split(PAYLOAD_MARKER);
    let _before = parts.next()?;
    let encoded = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}
