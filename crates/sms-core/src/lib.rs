//! # SMS Core
//!
//! Channel contract and common types for the smskit multi-provider SMS abstraction.
//!
//! This crate provides the fundamental building blocks for SMS channels:
//! - [`SmsChannel`] trait every provider adapter implements
//! - [`ChannelConfig`] / [`ChannelConfigPatch`] typed settings with explicit merge
//! - [`SendResult`], the only result shape callers ever inspect
//! - [`ChannelRegistry`] so hosts can pick a channel by its type string
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_core::{SmsChannel, TemplateData};
//!
//! // Any SMS provider implements SmsChannel
//! let data = TemplateData::from([("code".to_string(), "123456".to_string())]);
//! let result = channel.send("13800138000", "SMS_123456", &data).await;
//! if !result.success {
//!     eprintln!("{}", result.message);
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub mod config;
pub mod messages;

pub use config::{
    candidate_or, is_blank, ChannelConfig, ChannelConfigPatch, TemplateIds, TemplateIdsPatch,
    DEFAULT_REGION_ID, DEFAULT_TIMEOUT_SECS,
};

/// Default validity, in minutes, announced in verification messages.
pub const DEFAULT_EXPIRE_MINUTES: u32 = 10;

/// Named template parameters, serialized in key order.
pub type TemplateData = BTreeMap<String, String>;

/// Errors that can occur inside a channel before they are folded into a [`SendResult`].
#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// Required settings are missing; one message per field
    #[error("configuration error: {}", .0.join(", "))]
    Config(Vec<String>),
    /// HTTP communication error
    #[error("http error: {0}")]
    Http(String),
    /// Authentication/authorization error
    #[error("authentication error: {0}")]
    Auth(String),
    /// Invalid request parameters
    #[error("invalid request: {0}")]
    Invalid(String),
    /// SMS provider returned an error
    #[error("provider error: {0}")]
    Provider(String),
    /// Unexpected error occurred
    #[error("unexpected: {0}")]
    Unexpected(String),
}

/// Normalized outcome of every send-family operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl SendResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            request_id: None,
        }
    }

    /// Failed result; an empty message is replaced by the generic failure phrase.
    pub fn failure(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = messages::SEND_FAILED.to_string();
        }
        Self {
            success: false,
            message,
            data: None,
            request_id: None,
        }
    }

    /// Fold an internal error into a failed result.
    ///
    /// Configuration gaps get the configuration prefix and local or transport
    /// failures the client-error prefix; vendor-side rejections get `prefix`.
    /// Only the inner detail follows the prefix.
    pub fn from_error(prefix: &str, err: &SmsError) -> Self {
        let message = match err {
            SmsError::Config(errors) => {
                messages::prefixed(messages::CONFIG_ERROR_PREFIX, &errors.join(", "))
            }
            SmsError::Http(detail) | SmsError::Unexpected(detail) => {
                messages::prefixed(messages::CLIENT_ERROR_PREFIX, detail)
            }
            SmsError::Auth(detail) | SmsError::Provider(detail) | SmsError::Invalid(detail) => {
                messages::prefixed(prefix, detail)
            }
        };
        Self::failure(message)
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Input widget kind for a configurable setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Password,
    Number,
}

/// Declarative description of one setting, used to build configuration forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub default: String,
}

impl ConfigField {
    pub fn new(name: &str, label: &str, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            field_type,
            required,
            default: String::new(),
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }
}

/// Outcome of a config check; `valid` is always `errors.is_empty()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::from_errors(Vec::new())
    }
}

impl ValidationResult {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings: Vec::new(),
        }
    }

    /// Turn an invalid result into the matching [`SmsError::Config`].
    pub fn into_result(self) -> Result<(), SmsError> {
        if self.valid {
            Ok(())
        } else {
            Err(SmsError::Config(self.errors))
        }
    }
}

/// Static provider metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub website: String,
    pub description: String,
    pub regions: Vec<String>,
}

/// Message categories a channel can deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Verification,
    Notification,
    Marketing,
    International,
}

/// Uniform interface every SMS provider adapter implements.
///
/// No operation returns an error: failures are reported through
/// [`SendResult::success`] and [`SendResult::message`].
#[async_trait]
pub trait SmsChannel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Stable machine identifier, e.g. "aliyun".
    fn channel_type(&self) -> &'static str;

    fn config(&self) -> &ChannelConfig;

    /// Merge `patch` into the stored config. Not validated here.
    fn set_config(&mut self, patch: ChannelConfigPatch);

    fn config_fields(&self) -> Vec<ConfigField>;

    /// Check required settings, falling back to stored values for fields
    /// `candidate` leaves out. Never mutates the channel.
    fn validate_config(&self, candidate: &ChannelConfigPatch) -> ValidationResult;

    /// Send a single templated SMS.
    async fn send(&self, phone: &str, template_id: &str, template_data: &TemplateData)
        -> SendResult;

    /// Send a verification code using the configured verification template.
    async fn send_verification(&self, phone: &str, code: &str, expire_minutes: u32) -> SendResult {
        let template_id = self.config().templates.verification.clone();
        if is_blank(Some(&template_id)) {
            return SendResult::failure(messages::VERIFICATION_TEMPLATE_MISSING);
        }
        let data = TemplateData::from([
            ("code".to_string(), code.to_string()),
            ("expire".to_string(), expire_minutes.to_string()),
        ]);
        self.send(phone, &template_id, &data).await
    }

    async fn send_notification(
        &self,
        phone: &str,
        template_id: &str,
        params: &TemplateData,
    ) -> SendResult {
        self.send(phone, template_id, params).await
    }

    /// Deliver one template to several recipients in a single remote call.
    async fn send_batch(
        &self,
        phones: &[String],
        template_id: &str,
        template_data: &TemplateData,
    ) -> SendResult;

    /// Validate `candidate` merged over the stored config without sending anything.
    async fn test_connection(&self, candidate: &ChannelConfigPatch) -> SendResult;

    fn capabilities(&self) -> Vec<Capability>;

    fn supports_international(&self) -> bool;

    fn supported_regions(&self) -> Vec<String>;

    fn provider_info(&self) -> ProviderInfo;
}

/// Builds a fresh channel instance; each instance owns its own config.
pub type ChannelFactory = Arc<dyn Fn() -> Box<dyn SmsChannel> + Send + Sync>;

/// Channel type to factory map, populated explicitly by the host at startup.
#[derive(Default, Clone)]
pub struct ChannelRegistry {
    map: Arc<HashMap<String, ChannelFactory>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self {
            map: Arc::new(HashMap::new()),
        }
    }

    pub fn with<F>(mut self, channel_type: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SmsChannel> + Send + Sync + 'static,
    {
        let mut m = (*self.map).clone();
        m.insert(channel_type.into(), Arc::new(factory));
        self.map = Arc::new(m);
        self
    }

    /// Build a new instance of the channel registered under `channel_type`.
    pub fn create(&self, channel_type: &str) -> Option<Box<dyn SmsChannel>> {
        self.map.get(channel_type).map(|factory| factory())
    }

    pub fn contains(&self, channel_type: &str) -> bool {
        self.map.contains_key(channel_type)
    }

    /// Registered channel types, sorted.
    pub fn channel_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.map.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
