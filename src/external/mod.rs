//! HTTP client for the external e-commerce platform.
//!
//! Wraps the three surfaces the link flow needs: the QR authentication
//! endpoints (issue / poll / complete), the account profile endpoint,
//! and a best-effort "what is my IP" echo used to stamp completed
//! logins. QR issuance and polling are passthroughs — their payloads
//! are returned as untyped JSON for the API layer to forward verbatim.
//!
//! Failures are propagated as-is: any non-2xx status or unexpected
//! body shape becomes an error with no retry or backoff.

use anyhow::{anyhow, Context, Result};
use reqwest::header::SET_COOKIE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Default base URL for the platform's QR authentication endpoints.
pub const AUTH_BASE_URL: &str = "https://shopee.vn/api/v2/authentication";

/// Default URL for the platform's profile endpoint.
pub const PROFILE_URL: &str = "https://shopee.vn/api/v4/account/get_profile";

/// Default URL for the source-IP echo service.
pub const IP_ECHO_URL: &str = "https://checkip.amazonaws.com";

/// Browser User-Agent sent on every platform request — the QR
/// endpoints reject non-browser clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// External profile returned after a completed QR login.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalProfile {
    pub userid: i64,
    pub username: String,
    pub portrait: String,
}

/// Wire shape of the profile endpoint response.
#[derive(Deserialize, Debug)]
struct ProfileResponse {
    data: ProfileData,
}

#[derive(Deserialize, Debug)]
struct ProfileData {
    user_profile: UserProfile,
}

#[derive(Deserialize, Debug)]
struct UserProfile {
    userid: i64,
    username: String,
    portrait: String,
}

/// Body of the QR login completion request.
///
/// The fingerprint fields are part of the wire format but the service
/// sends them empty, matching what the platform accepts from browsers.
#[derive(Serialize)]
struct QrcodeLoginRequest<'a> {
    qrcode_token: &'a str,
    device_sz_fingerprint: &'a str,
    client_identifier: ClientIdentifier<'a>,
    username: &'a str,
}

#[derive(Serialize)]
struct ClientIdentifier<'a> {
    security_device_fingerprint: &'a str,
}

/// HTTP client for the external platform.
///
/// Sends a browser User-Agent on every request. Session cookies from
/// login completion are captured manually from `Set-Cookie` headers
/// rather than a cookie store, so they can be persisted.
pub struct ShopClient {
    http_client: Client,
    auth_base_url: String,
    profile_url: String,
    ip_echo_url: String,
}

impl ShopClient {
    /// Create a client using the default platform URLs.
    pub fn new() -> Self {
        Self::with_base_urls(
            AUTH_BASE_URL.to_string(),
            PROFILE_URL.to_string(),
            IP_ECHO_URL.to_string(),
        )
    }

    /// Create a client with custom URLs (for testing with a mock server).
    pub fn with_base_urls(auth_base_url: String, profile_url: String, ip_echo_url: String) -> Self {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http_client,
            auth_base_url,
            profile_url,
            ip_echo_url,
        }
    }

    /// Request a fresh QR payload from the platform.
    ///
    /// Pure passthrough — no local state is involved.
    pub async fn gen_qrcode(&self) -> Result<Value> {
        let url = format!("{}/gen_qrcode", self.auth_base_url);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to send gen_qrcode request")?;

        check_response_status(&response)?;
        response
            .json::<Value>()
            .await
            .context("Failed to parse gen_qrcode response")
    }

    /// Poll the scan status of an issued QR code.
    ///
    /// Pure passthrough; the id is percent-encoded into the query.
    pub async fn qrcode_status(&self, qrcode_id: &str) -> Result<Value> {
        let url = format!(
            "{}/qrcode_status?qrcode_id={}",
            self.auth_base_url,
            urlencoding::encode(qrcode_id)
        );
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .context("Failed to send qrcode_status request")?;

        check_response_status(&response)?;
        response
            .json::<Value>()
            .await
            .context("Failed to parse qrcode_status response")
    }

    /// Submit a scanned QR's exchange token to the platform login
    /// endpoint, capturing the session cookies it sets.
    pub async fn submit_qrcode_login(
        &self,
        qrcode_token: &str,
        username: &str,
    ) -> Result<BTreeMap<String, String>> {
        let url = format!("{}/qrcode_login", self.auth_base_url);
        let body = QrcodeLoginRequest {
            qrcode_token,
            device_sz_fingerprint: "",
            client_identifier: ClientIdentifier {
                security_device_fingerprint: "",
            },
            username,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send qrcode_login request")?;

        check_response_status(&response)?;

        let cookies = collect_cookies(&response);
        debug!(cookie_count = cookies.len(), "Captured platform session cookies");
        Ok(cookies)
    }

    /// Fetch the profile of the account the captured cookies belong to.
    pub async fn fetch_profile(&self, cookies: &BTreeMap<String, String>) -> Result<ExternalProfile> {
        let response = self
            .http_client
            .get(&self.profile_url)
            .header("Cookie", cookie_header(cookies))
            .send()
            .await
            .context("Failed to send profile request")?;

        check_response_status(&response)?;
        let profile: ProfileResponse = response
            .json()
            .await
            .context("Failed to parse profile response")?;

        let user_profile = profile.data.user_profile;
        Ok(ExternalProfile {
            userid: user_profile.userid,
            username: user_profile.username,
            portrait: user_profile.portrait,
        })
    }

    /// Resolve this service's public IP via the echo endpoint.
    ///
    /// Best-effort: failures log a warning and yield an empty string,
    /// never aborting the link flow.
    pub async fn lookup_source_ip(&self) -> String {
        let result = async {
            let response = self
                .http_client
                .get(&self.ip_echo_url)
                .send()
                .await
                .context("Failed to send IP echo request")?;
            check_response_status(&response)?;
            let body = response.text().await.context("Failed to read IP echo body")?;
            Ok::<String, anyhow::Error>(body.trim().to_string())
        }
        .await;

        match result {
            Ok(ip) => ip,
            Err(e) => {
                warn!(error = %e, "Source IP lookup failed");
                String::new()
            }
        }
    }
}

impl Default for ShopClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect `Set-Cookie` response headers into an ordered name→value map.
///
/// Only the leading `name=value` pair matters; attributes after the
/// first `;` are dropped.
fn collect_cookies(response: &reqwest::Response) -> BTreeMap<String, String> {
    let mut cookies = BTreeMap::new();
    for header in response.headers().get_all(SET_COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        let pair = raw.split(';').next().unwrap_or("");
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }
    cookies
}

/// Build a `Cookie` request header value from a cookie map.
fn cookie_header(cookies: &BTreeMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check the response status; non-2xx becomes a descriptive error.
fn check_response_status(response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("Platform API returned status {}", status));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_response_deserialization() {
        let json = r#"{
            "data": {
                "user_profile": {
                    "userid": 123456789,
                    "username": "shop_user",
                    "portrait": "avatars/abc.jpg",
                    "phone": "****1234"
                }
            },
            "error": 0
        }"#;

        let response: ProfileResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.data.user_profile.userid, 123456789);
        assert_eq!(response.data.user_profile.username, "shop_user");
        assert_eq!(response.data.user_profile.portrait, "avatars/abc.jpg");
    }

    #[test]
    fn test_login_request_wire_shape() {
        let body = QrcodeLoginRequest {
            qrcode_token: "tok_abc",
            device_sz_fingerprint: "",
            client_identifier: ClientIdentifier {
                security_device_fingerprint: "",
            },
            username: "alice",
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["qrcode_token"], "tok_abc");
        assert_eq!(json["device_sz_fingerprint"], "");
        assert_eq!(json["client_identifier"]["security_device_fingerprint"], "");
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_cookie_header_formatting() {
        let mut cookies = BTreeMap::new();
        cookies.insert("SPC_ST".to_string(), "abc123".to_string());
        cookies.insert("SPC_U".to_string(), "456".to_string());

        assert_eq!(cookie_header(&cookies), "SPC_ST=abc123; SPC_U=456");
        assert_eq!(cookie_header(&BTreeMap::new()), "");
    }
}
