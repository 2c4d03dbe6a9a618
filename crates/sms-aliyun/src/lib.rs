//! # Aliyun SMS Channel
//!
//! Alibaba Cloud Dysmsapi channel implementation for smskit.
//!
//! ## Features
//!
//! - Templated single and batch sends (`SendSms` / `SendBatchSms`)
//! - Verification-code and notification helpers from the [`SmsChannel`] contract
//! - Config validation before any remote call
//! - Every failure folded into a [`SendResult`] and logged with `tracing`
//!
//! ## Example
//!
//! ```rust,ignore
//! use sms_aliyun::AliyunChannel;
//! use sms_core::{ChannelConfig, SmsChannel, TemplateData};
//!
//! let channel = AliyunChannel::new(ChannelConfig {
//!     access_key_id: "your_access_key_id".into(),
//!     access_key_secret: "your_access_key_secret".into(),
//!     sign_name: "YourSign".into(),
//!     ..Default::default()
//! });
//! let data = TemplateData::from([("code".to_string(), "123456".to_string())]);
//! let result = channel.send("13800138000", "SMS_123456", &data).await;
//! println!("{} {:?}", result.message, result.request_id);
//! ```

use async_trait::async_trait;
use serde_json::json;
use sms_core::messages::{self, prefixed};
use sms_core::{
    candidate_or, is_blank, Capability, ChannelConfig, ChannelConfigPatch, ConfigField,
    FieldType, ProviderInfo, SendResult, SmsChannel, SmsError, TemplateData, ValidationResult,
    DEFAULT_REGION_ID,
};
use std::sync::Arc;
use tracing::error;

pub mod transport;

pub use transport::{AliyunResponse, AliyunTransport, HttpTransport, RpcRequest};
use transport::{ACTION_SEND_BATCH_SMS, ACTION_SEND_SMS};

pub const CHANNEL_TYPE: &str = "aliyun";

/// Vendor status code meaning the message was accepted. Case-sensitive.
pub const SUCCESS_CODE: &str = "OK";

const CHANNEL_NAME: &str = "阿里云短信";
const CONNECTION_OK: &str = "阿里云短信服务连接正常";

const ACCESS_KEY_ID_MISSING: &str = "Access Key ID 不能为空";
const ACCESS_KEY_SECRET_MISSING: &str = "Access Key Secret 不能为空";
const SIGN_NAME_MISSING: &str = "短信签名不能为空";
const REGION_DEFAULTED: &str = "区域 ID 未设置，将使用默认值 cn-hangzhou";

/// Aliyun channel. Owns its config; the transport is shared and stateless.
#[derive(Clone)]
pub struct AliyunChannel {
    config: ChannelConfig,
    transport: Arc<dyn AliyunTransport>,
}

impl AliyunChannel {
    /// Channel talking to the real region-derived endpoint.
    pub fn new(config: ChannelConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(config: ChannelConfig, transport: Arc<dyn AliyunTransport>) -> Self {
        Self { config, transport }
    }

    /// `SendSms` request for one recipient.
    pub fn build_send_request(
        &self,
        phone: &str,
        template_id: &str,
        template_data: &TemplateData,
    ) -> Result<RpcRequest, SmsError> {
        Ok(RpcRequest::new(ACTION_SEND_SMS)
            .param("PhoneNumbers", phone)
            .param("SignName", self.config.sign_name.as_str())
            .param("TemplateCode", template_id)
            .param("TemplateParam", to_json(template_data)?))
    }

    /// `SendBatchSms` request: sign name and template data repeated once per phone.
    pub fn build_batch_request(
        &self,
        phones: &[String],
        template_id: &str,
        template_data: &TemplateData,
    ) -> Result<RpcRequest, SmsError> {
        if phones.is_empty() {
            return Err(SmsError::Invalid("手机号列表为空".into()));
        }
        let sign_names = vec![self.config.sign_name.as_str(); phones.len()];
        let params = vec![template_data; phones.len()];

        Ok(RpcRequest::new(ACTION_SEND_BATCH_SMS)
            .param("PhoneNumberJson", to_json(&phones)?)
            .param("SignNameJson", to_json(&sign_names)?)
            .param("TemplateCode", template_id)
            .param("TemplateParamJson", to_json(&params)?))
    }

    fn ensure_valid(&self) -> Result<(), SmsError> {
        self.validate_config(&ChannelConfigPatch::default())
            .into_result()
    }

    async fn dispatch(
        &self,
        request: Result<RpcRequest, SmsError>,
        success_phrase: &str,
        failure_phrase: &str,
    ) -> Result<SendResult, SmsError> {
        self.ensure_valid()?;
        let request = request?;
        let response = self.transport.call(&self.config, &request).await?;
        Ok(normalize(response, success_phrase, failure_phrase))
    }
}

/// Map a vendor body onto the normalized result shape.
fn normalize(response: AliyunResponse, success_phrase: &str, failure_phrase: &str) -> SendResult {
    let success = response.code == SUCCESS_CODE;
    let message = response
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if success {
                success_phrase.to_string()
            } else {
                failure_phrase.to_string()
            }
        });
    let data = json!({
        "request_id": response.request_id,
        "biz_id": response.biz_id,
        "code": response.code,
    });

    let result = if success {
        SendResult::ok(message)
    } else {
        SendResult::failure(message)
    };
    result.with_data(data).with_request_id(response.request_id)
}

/// Unicode is kept as-is (serde_json never escapes non-ASCII).
fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, SmsError> {
    serde_json::to_string(value).map_err(|e| SmsError::Invalid(format!("参数编码失败: {}", e)))
}

#[async_trait]
impl SmsChannel for AliyunChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    fn channel_type(&self) -> &'static str {
        CHANNEL_TYPE
    }

    fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn set_config(&mut self, patch: ChannelConfigPatch) {
        self.config.merge(&patch);
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::new("access_key_id", "Access Key ID", FieldType::Text, true),
            ConfigField::new(
                "access_key_secret",
                "Access Key Secret",
                FieldType::Password,
                true,
            ),
            ConfigField::new("region_id", "区域 ID", FieldType::Text, false)
                .with_default(DEFAULT_REGION_ID),
            ConfigField::new("sign_name", "短信签名", FieldType::Text, true),
            ConfigField::new("timeout", "超时时间（秒）", FieldType::Number, false)
                .with_default(sms_core::DEFAULT_TIMEOUT_SECS.to_string()),
        ]
    }

    fn validate_config(&self, candidate: &ChannelConfigPatch) -> ValidationResult {
        let stored = &self.config;
        let required = [
            (
                candidate_or(&candidate.access_key_id, &stored.access_key_id),
                ACCESS_KEY_ID_MISSING,
            ),
            (
                candidate_or(&candidate.access_key_secret, &stored.access_key_secret),
                ACCESS_KEY_SECRET_MISSING,
            ),
            (
                candidate_or(&candidate.sign_name, &stored.sign_name),
                SIGN_NAME_MISSING,
            ),
        ];
        let errors = required
            .iter()
            .filter(|(value, _)| is_blank(Some(*value)))
            .map(|(_, message)| message.to_string())
            .collect();

        let mut result = ValidationResult::from_errors(errors);
        if is_blank(Some(candidate_or(&candidate.region_id, &stored.region_id))) {
            result.warnings.push(REGION_DEFAULTED.to_string());
        }
        result
    }

    async fn send(
        &self,
        phone: &str,
        template_id: &str,
        template_data: &TemplateData,
    ) -> SendResult {
        let request = self.build_send_request(phone, template_id, template_data);
        match self
            .dispatch(request, messages::SEND_SUCCEEDED, messages::SEND_FAILED)
            .await
        {
            Ok(result) => {
                if !result.success {
                    error!(
                        phone,
                        template_id,
                        error = %result.message,
                        "Aliyun SMS rejected by vendor"
                    );
                }
                result
            }
            Err(e) => {
                error!(phone, template_id, error = %e, "Aliyun SMS send failed");
                SendResult::from_error(messages::SEND_FAILED_PREFIX, &e)
            }
        }
    }

    async fn send_batch(
        &self,
        phones: &[String],
        template_id: &str,
        template_data: &TemplateData,
    ) -> SendResult {
        let request = self.build_batch_request(phones, template_id, template_data);
        match self
            .dispatch(request, messages::BATCH_SUCCEEDED, messages::BATCH_FAILED)
            .await
        {
            Ok(result) => {
                if !result.success {
                    error!(
                        phones = ?phones,
                        template_id,
                        error = %result.message,
                        "Aliyun batch SMS rejected by vendor"
                    );
                }
                result
            }
            Err(e) => {
                error!(phones = ?phones, template_id, error = %e, "Aliyun batch SMS send failed");
                SendResult::from_error(messages::BATCH_FAILED_PREFIX, &e)
            }
        }
    }

    async fn test_connection(&self, candidate: &ChannelConfigPatch) -> SendResult {
        let merged = self.config.merged(candidate);
        let validation = self.validate_config(candidate);
        if !validation.valid {
            let detail = validation.errors.join(", ");
            error!(error = %detail, "Aliyun SMS connection test failed");
            return SendResult::failure(prefixed(
                messages::CONNECTION_TEST_FAILED_PREFIX,
                &detail,
            ));
        }

        SendResult::ok(CONNECTION_OK).with_data(json!({
            "region": merged.effective_region(),
            "sign_name": merged.sign_name,
        }))
    }

    fn capabilities(&self) -> Vec<Capability> {
        vec![
            Capability::Verification,
            Capability::Notification,
            Capability::Marketing,
            Capability::International,
        ]
    }

    fn supports_international(&self) -> bool {
        true
    }

    fn supported_regions(&self) -> Vec<String> {
        ["CN", "HK", "US", "SG", "JP", "KR"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "阿里云".to_string(),
            website: "https://www.aliyun.com/".to_string(),
            description: "阿里云 SMS 短信服务".to_string(),
            regions: [
                "cn-hangzhou",
                "cn-beijing",
                "cn-shanghai",
                "cn-shenzhen",
                "cn-hongkong",
                "ap-southeast-1",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}
