//! Signed HTTP transport for the CloudStack API.
//!
//! Every request is authenticated by an HMAC-SHA1 signature over the
//! canonical form of its query string: parameters sorted byte-wise by name,
//! values escaped with `application/x-www-form-urlencoded` rules, joined
//! with `&`, and lowercased as a whole. The base64 signature is appended to
//! the transmitted URL escaped once.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac as _};
use serde::de::DeserializeOwned;
use sha1::Sha1;

use crate::config::ConfigError;
use crate::provider::ApiParams;

use super::{CloudStackError, CloudStackIaas};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

type HmacSha1 = Hmac<Sha1>;

fn hex_upper(nibble: u8) -> char {
    char::from_digit(u32::from(nibble), 16)
        .unwrap_or('0')
        .to_ascii_uppercase()
}

/// Escapes a query value with `application/x-www-form-urlencoded` rules.
///
/// Unreserved bytes (`A-Z a-z 0-9 - _ . ~`) pass through, a space becomes
/// `+`, and every other byte is percent-encoded with uppercase hex.
#[must_use]
pub fn form_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                escaped.push(char::from(byte));
            }
            b' ' => escaped.push('+'),
            _ => {
                escaped.push('%');
                escaped.push(hex_upper(byte >> 4));
                escaped.push(hex_upper(byte & 0x0f));
            }
        }
    }
    escaped
}

/// Builds the canonical query string for `params`.
///
/// Pairs are emitted as `name=escapedValue`, joined with `&` in byte-wise
/// lexicographic order of the names. The result is both the transmitted
/// query string and, once lowercased, the HMAC input.
#[must_use]
pub fn build_canonical_query(params: &ApiParams) -> String {
    let sorted: BTreeMap<&str, &str> = params
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
    let pairs: Vec<String> = sorted
        .iter()
        .map(|(name, value)| format!("{name}={}", form_escape(value)))
        .collect();
    pairs.join("&")
}

/// Signs a canonical query string with `secret`.
///
/// The canonical string is lowercased as a whole before the HMAC-SHA1 is
/// computed; the digest is returned base64-encoded with standard padding.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the secret cannot key the HMAC.
pub fn sign_canonical(secret: &str, canonical: &str) -> Result<String, ConfigError> {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|err| ConfigError::Invalid {
            key: String::from("secret-key"),
            message: err.to_string(),
        })?;
    mac.update(canonical.to_lowercase().as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

impl CloudStackIaas {
    /// Issues `command` with `params` and decodes the JSON body into `T`.
    ///
    /// The caller's map is never mutated; `command`, `response=json`, and
    /// `apiKey` are injected into an internal copy before signing.
    ///
    /// # Errors
    ///
    /// Returns [`CloudStackError::Config`] when `url`, `api-key`, or
    /// `secret-key` are unresolved, [`CloudStackError::Transport`] on HTTP
    /// failures, [`CloudStackError::UnexpectedStatus`] on any status other
    /// than 200, and [`CloudStackError::UnexpectedBody`] when the body does
    /// not decode into `T`.
    pub async fn api_request<T: DeserializeOwned>(
        &self,
        command: &str,
        params: &ApiParams,
    ) -> Result<T, CloudStackError> {
        let body = self.do_request(command, params).await?;
        serde_json::from_slice(&body).map_err(|err| CloudStackError::UnexpectedBody {
            command: command.to_owned(),
            message: err.to_string(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }

    /// Issues `command` and returns the raw 200 body without decoding it.
    pub(crate) async fn do_request(
        &self,
        command: &str,
        params: &ApiParams,
    ) -> Result<Vec<u8>, CloudStackError> {
        let base_url = self.config_string("url")?;
        let api_key = self.config_string("api-key")?;
        let secret_key = self.config_string("secret-key")?;

        let mut signed_params = params.clone();
        signed_params.insert(String::from("command"), command.to_owned());
        signed_params.insert(String::from("response"), String::from("json"));
        signed_params.insert(String::from("apiKey"), api_key);

        let query = build_canonical_query(&signed_params);
        let signature = sign_canonical(&secret_key, &query)?;
        let url = format!("{base_url}?{query}&signature={}", form_escape(&signature));

        tracing::debug!(command, "issuing cloudstack request");
        let send = HTTP_CLIENT.get(&url).send();
        let response = tokio::select! {
            () = self.shutdown.cancelled() => return Err(CloudStackError::Canceled),
            result = send => result.map_err(|err| CloudStackError::Transport {
                command: command.to_owned(),
                source: err,
            })?,
        };

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| CloudStackError::Transport {
                command: command.to_owned(),
                source: err,
            })?;

        if status.as_u16() != 200 {
            return Err(CloudStackError::UnexpectedStatus {
                command: command.to_owned(),
                code: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}
