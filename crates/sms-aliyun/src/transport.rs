//! Dysmsapi RPC transport.
//!
//! Requests are form-POSTed to `https://dysmsapi.<region>.aliyuncs.com/` and
//! authenticated with the RPC signature scheme (version 1.0):
//!
//! 1. Merge the action parameters with the common parameters
//!    (`AccessKeyId`, `SignatureNonce`, `Timestamp`, ...).
//! 2. Sort by name, percent-encode names and values (RFC 3986) and join them
//!    into a canonical query string.
//! 3. Sign `POST&%2F&<encoded canonical query>` with HMAC-SHA1 keyed by
//!    `<AccessKeySecret>&` and send the base64 digest as `Signature`.

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sms_core::{ChannelConfig, SmsError};
use std::collections::BTreeMap;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use uuid::Uuid;

type HmacSha1 = Hmac<Sha1>;

pub const API_VERSION: &str = "2017-05-25";
pub const ACTION_SEND_SMS: &str = "SendSms";
pub const ACTION_SEND_BATCH_SMS: &str = "SendBatchSms";

const HTTP_METHOD: &str = "POST";

/// One Dysmsapi action with its action-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcRequest {
    pub action: &'static str,
    pub params: BTreeMap<String, String>,
}

impl RpcRequest {
    pub fn new(action: &'static str) -> Self {
        Self {
            action,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Fields of the vendor response body this crate cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliyunResponse {
    #[serde(default)]
    pub code: String,
    pub message: Option<String>,
    pub request_id: Option<String>,
    pub biz_id: Option<String>,
}

/// Performs exactly one remote call per invocation.
#[async_trait]
pub trait AliyunTransport: Send + Sync {
    async fn call(
        &self,
        config: &ChannelConfig,
        request: &RpcRequest,
    ) -> Result<AliyunResponse, SmsError>;
}

/// Signed HTTPS transport backed by `reqwest`.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport {
    /// Overrides the region-derived endpoint; used for testing/mocking.
    endpoint: Option<String>,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            http: reqwest::Client::new(),
        }
    }

    fn url_for(&self, config: &ChannelConfig) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/", endpoint.trim_end_matches('/')),
            None => endpoint_for(config.effective_region()),
        }
    }
}

#[async_trait]
impl AliyunTransport for HttpTransport {
    async fn call(
        &self,
        config: &ChannelConfig,
        request: &RpcRequest,
    ) -> Result<AliyunResponse, SmsError> {
        let url = self.url_for(config);
        let nonce = Uuid::new_v4().to_string();
        let params = signed_params(config, request, &nonce, &timestamp_now()?)?;

        debug!(action = request.action, %url, "calling Dysmsapi");

        let mut builder = self.http.post(&url).form(&params);
        if config.timeout > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout));
        }
        let res = builder
            .send()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        let status = res.status();
        let raw_text = res
            .text()
            .await
            .map_err(|e| SmsError::Http(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<AliyunResponse>(&raw_text)
                .ok()
                .and_then(|body| match body.message {
                    Some(message) if !body.code.is_empty() => {
                        Some(format!("{} ({})", message, body.code))
                    }
                    other => other,
                })
                .unwrap_or(raw_text);
            return Err(match status.as_u16() {
                401 | 403 => SmsError::Auth(format!("HTTP {}: {}", status, detail)),
                _ => SmsError::Provider(format!("HTTP {}: {}", status, detail)),
            });
        }

        serde_json::from_str(&raw_text)
            .map_err(|e| SmsError::Unexpected(format!("响应格式无效: {}", e)))
    }
}

/// Region-derived API endpoint.
pub fn endpoint_for(region_id: &str) -> String {
    format!("https://dysmsapi.{}.aliyuncs.com/", region_id)
}

/// Action params plus the common params, including the `Signature`.
pub fn signed_params(
    config: &ChannelConfig,
    request: &RpcRequest,
    nonce: &str,
    timestamp: &str,
) -> Result<BTreeMap<String, String>, SmsError> {
    let mut params = request.params.clone();
    let common = [
        ("AccessKeyId", config.access_key_id.as_str()),
        ("Action", request.action),
        ("Format", "JSON"),
        ("RegionId", config.effective_region()),
        ("SignatureMethod", "HMAC-SHA1"),
        ("SignatureNonce", nonce),
        ("SignatureVersion", "1.0"),
        ("Timestamp", timestamp),
        ("Version", API_VERSION),
    ];
    for (name, value) in common {
        params.insert(name.to_string(), value.to_string());
    }

    let signature = sign(
        &config.access_key_secret,
        &string_to_sign(HTTP_METHOD, &params),
    )?;
    params.insert("Signature".to_string(), signature);
    Ok(params)
}

pub fn string_to_sign(method: &str, params: &BTreeMap<String, String>) -> String {
    let canonical = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!(
        "{}&{}&{}",
        method,
        percent_encode("/"),
        percent_encode(&canonical)
    )
}

pub fn sign(access_key_secret: &str, string_to_sign: &str) -> Result<String, SmsError> {
    let key = format!("{}&", access_key_secret);
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| SmsError::Unexpected(format!("hmac key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// RFC 3986 encoding: unreserved characters kept, space as `%20`.
pub fn percent_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
        .replace("%7E", "~")
}

/// UTC timestamp with second precision, e.g. `2024-05-01T08:00:00Z`.
fn timestamp_now() -> Result<String, SmsError> {
    time::OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .map_err(|e| SmsError::Unexpected(e.to_string()))?
        .format(&Rfc3339)
        .map_err(|e| SmsError::Unexpected(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config() -> ChannelConfig {
        ChannelConfig {
            access_key_id: "testid".into(),
            access_key_secret: "testsecret".into(),
            sign_name: "阿里云短信测试".into(),
            ..Default::default()
        }
    }

    #[test]
    fn percent_encoding_follows_rfc3986() {
        assert_eq!(percent_encode("a b"), "a%20b");
        assert_eq!(percent_encode("a*b"), "a%2Ab");
        assert_eq!(percent_encode("a~b"), "a~b");
        assert_eq!(percent_encode("a+b"), "a%2Bb");
        assert_eq!(percent_encode("2016-02-23T12:46:24Z"), "2016-02-23T12%3A46%3A24Z");
        assert_eq!(percent_encode("签名"), "%E7%AD%BE%E5%90%8D");
    }

    #[test]
    fn string_to_sign_is_canonical() {
        let params = BTreeMap::from([
            ("Timestamp".to_string(), "2016-02-23T12:46:24Z".to_string()),
            ("Action".to_string(), "SendSms".to_string()),
            ("AccessKeyId".to_string(), "testid".to_string()),
        ]);
        assert_eq!(
            string_to_sign("POST", &params),
            "POST&%2F&AccessKeyId%3Dtestid%26Action%3DSendSms%26Timestamp%3D2016-02-23T12%253A46%253A24Z"
        );
    }

    #[test]
    fn signature_is_base64_sha1_digest() {
        let a = sign("testsecret", "POST&%2F&x").unwrap();
        let b = sign("testsecret", "POST&%2F&x").unwrap();
        let c = sign("othersecret", "POST&%2F&x").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // 20 byte digest -> 28 base64 chars
        assert_eq!(a.len(), 28);
        assert!(a.ends_with('='));
    }

    #[test]
    fn signed_params_carry_common_fields() {
        let request = RpcRequest::new(ACTION_SEND_SMS)
            .param("PhoneNumbers", "13800138000")
            .param("TemplateCode", "SMS_1");
        let params = signed_params(&config(), &request, "nonce-1", "2024-05-01T08:00:00Z").unwrap();

        assert_eq!(params["Action"], "SendSms");
        assert_eq!(params["AccessKeyId"], "testid");
        assert_eq!(params["RegionId"], "cn-hangzhou");
        assert_eq!(params["SignatureNonce"], "nonce-1");
        assert_eq!(params["Version"], API_VERSION);
        assert_eq!(params["PhoneNumbers"], "13800138000");

        let mut unsigned = params.clone();
        let signature = unsigned.remove("Signature").unwrap();
        let expected = sign("testsecret", &string_to_sign("POST", &unsigned)).unwrap();
        assert_eq!(signature, expected);
    }

    #[test]
    fn endpoint_is_region_derived() {
        assert_eq!(
            endpoint_for("ap-southeast-1"),
            "https://dysmsapi.ap-southeast-1.aliyuncs.com/"
        );
        let mut cfg = config();
        cfg.region_id = String::new();
        assert_eq!(
            HttpTransport::new().url_for(&cfg),
            "https://dysmsapi.cn-hangzhou.aliyuncs.com/"
        );
    }

    #[tokio::test]
    async fn posts_signed_form_and_parses_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("Action".into(), "SendSms".into()),
                Matcher::UrlEncoded("SignatureMethod".into(), "HMAC-SHA1".into()),
                Matcher::UrlEncoded("SignName".into(), "阿里云短信测试".into()),
                Matcher::UrlEncoded("TemplateParam".into(), r#"{"name":"张三"}"#.into()),
                Matcher::Regex("Signature=".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "Code": "OK",
                    "Message": "OK",
                    "RequestId": "R1",
                    "BizId": "B1"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let transport = HttpTransport::with_endpoint(server.url());
        let request = RpcRequest::new(ACTION_SEND_SMS)
            .param("PhoneNumbers", "13800138000")
            .param("SignName", "阿里云短信测试")
            .param("TemplateCode", "SMS_1")
            .param("TemplateParam", r#"{"name":"张三"}"#);
        let response = transport.call(&config(), &request).await.unwrap();

        assert_eq!(response.code, "OK");
        assert_eq!(response.request_id.as_deref(), Some("R1"));
        assert_eq!(response.biz_id.as_deref(), Some("B1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_error_status_becomes_provider_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"Code":"isv.SMS_SIGNATURE_ILLEGAL","Message":"签名不合法","RequestId":"R2"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::with_endpoint(server.url());
        let err = transport
            .call(&config(), &RpcRequest::new(ACTION_SEND_SMS))
            .await
            .unwrap_err();

        match err {
            SmsError::Provider(msg) => {
                assert!(msg.contains("400"));
                assert!(msg.contains("签名不合法"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forbidden_becomes_auth_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(403)
            .with_body(r#"{"Code":"InvalidAccessKeyId.NotFound","Message":"Specified access key is not found."}"#)
            .create_async()
            .await;

        let transport = HttpTransport::with_endpoint(server.url());
        let err = transport
            .call(&config(), &RpcRequest::new(ACTION_SEND_SMS))
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Auth(_)));
    }

    #[tokio::test]
    async fn garbage_body_is_unexpected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let transport = HttpTransport::with_endpoint(server.url());
        let err = transport
            .call(&config(), &RpcRequest::new(ACTION_SEND_SMS))
            .await
            .unwrap_err();
        assert!(matches!(err, SmsError::Unexpected(_)));
    }
}
