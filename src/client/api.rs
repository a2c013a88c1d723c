//! Remote licensing API.
//!
//! Every license operation goes through a single POST to the add-on's API
//! URL. The form body names the request kind, the key and the add-on; the
//! JSON response is kept verbatim as [`LicenseData`].
//!
//! Whether the request is sent at all is decided by [`NetworkPolicy`].

use crate::client::responses::LicenseData;
use crate::errors::{LicenseError, LicenseResult};

use reqwest::Client;
use ring::hmac;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Whether remote license requests leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    /// Requests are sent to the licensing API.
    Live,
    /// Requests are dropped and state is left as it is.
    #[default]
    Suppressed,
}

/// Kind of remote license request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    CheckLicense,
    ActivateLicense,
    DeactivateLicense,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::CheckLicense => "check_license",
            RequestKind::ActivateLicense => "activate_license",
            RequestKind::DeactivateLicense => "deactivate_license",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form body sent to the licensing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseRequest {
    pub request: String,
    pub license: String,
    pub item_name: String,
    pub version: String,
    pub author: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl LicenseRequest {
    /// Fields covered by the signature, in a fixed order, each prefixed
    /// with its byte length so field boundaries cannot shift.
    fn canonical(&self) -> String {
        [
            self.request.as_str(),
            self.license.as_str(),
            self.item_name.as_str(),
            self.version.as_str(),
            self.author.as_str(),
            self.url.as_str(),
        ]
        .iter()
        .map(|field| format!("{}:{}", field.len(), field))
        .collect()
    }

    /// Attach a hex HMAC-SHA256 signature. An empty secret leaves the
    /// request unsigned.
    pub fn signed(mut self, secret: &str) -> Self {
        if secret.is_empty() {
            self.signature = None;
            return self;
        }
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        let tag = hmac::sign(&key, self.canonical().as_bytes());
        self.signature = Some(hex::encode(tag.as_ref()));
        self
    }

    /// Check a signature produced by [`LicenseRequest::signed`].
    pub fn verify(&self, secret: &str) -> bool {
        let Some(signature) = &self.signature else {
            return false;
        };
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
        hmac::verify(&key, self.canonical().as_bytes(), &tag).is_ok()
    }
}

/// HTTP client for one licensing API endpoint.
#[derive(Debug, Clone)]
pub struct LicenseApi {
    http: Client,
    api_url: String,
}

impl LicenseApi {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> LicenseResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_url: api_url.into(),
        })
    }

    /// POST the request and parse the response object.
    ///
    /// Returns:
    /// - `Ok(LicenseData)` for any 2xx response carrying a JSON object.
    /// - `Err(NetworkError)` on transport failures.
    /// - `Err(ServerError)` for other statuses or unparsable bodies.
    pub async fn send(&self, request: &LicenseRequest) -> LicenseResult<LicenseData> {
        let resp = self.http.post(&self.api_url).form(request).send().await?;

        if !resp.status().is_success() {
            return Err(LicenseError::ServerError(format!(
                "{} failed with HTTP status {}",
                request.request,
                resp.status()
            )));
        }

        let body: Value = resp.json().await.map_err(|e| {
            LicenseError::ServerError(format!("Failed to parse {} response: {e}", request.request))
        })?;

        match body {
            Value::Object(map) => Ok(LicenseData::from_map(map)),
            other => Err(LicenseError::ServerError(format!(
                "{} response is not an object: {other}",
                request.request
            ))),
        }
    }
}
