//! Localized, user-facing result messages.

pub const SEND_SUCCEEDED: &str = "发送成功";
pub const SEND_FAILED: &str = "发送失败";
pub const BATCH_SUCCEEDED: &str = "批量发送成功";
pub const BATCH_FAILED: &str = "批量发送失败";

pub const SEND_FAILED_PREFIX: &str = "短信发送失败";
pub const BATCH_FAILED_PREFIX: &str = "批量发送失败";
pub const CONFIG_ERROR_PREFIX: &str = "短信配置错误";
pub const CONNECTION_TEST_FAILED_PREFIX: &str = "连接测试失败";
pub const CLIENT_ERROR_PREFIX: &str = "客户端错误";

pub const VERIFICATION_TEMPLATE_MISSING: &str = "验证码模板未配置";

/// `"<prefix>：<detail>"`
pub fn prefixed(prefix: &str, detail: &str) -> String {
    format!("{}：{}", prefix, detail)
}
