use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sms_core::ChannelConfig;
use std::env;

/// Environment variables mapped onto dotted config keys.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("ALIYUN_SMS_ACCESS_KEY_ID", "sms.aliyun.access_key_id"),
    ("ALIYUN_SMS_ACCESS_KEY_SECRET", "sms.aliyun.access_key_secret"),
    ("ALIYUN_SMS_REGION_ID", "sms.aliyun.region_id"),
    ("ALIYUN_SMS_SIGN_NAME", "sms.aliyun.sign_name"),
    ("ALIYUN_SMS_TIMEOUT", "sms.aliyun.timeout"),
    (
        "ALIYUN_SMS_TEMPLATE_VERIFICATION",
        "sms.aliyun.templates.verification",
    ),
    (
        "ALIYUN_SMS_TEMPLATE_NOTIFICATION",
        "sms.aliyun.templates.notification",
    ),
    ("ALIYUN_SMS_TEMPLATE_MARKETING", "sms.aliyun.templates.marketing"),
];

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// SMS channels configuration
    pub sms: SmsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// SMS channels configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmsConfig {
    /// Channel type used when the caller doesn't pick one (default: aliyun)
    pub default_channel: String,
    /// Aliyun channel settings (`sms.aliyun.*`)
    pub aliyun: ChannelConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            default_channel: sms_aliyun::CHANNEL_TYPE.to_string(),
            aliyun: ChannelConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::load`], reading the `RUN_MODE` and `ALIYUN_SMS_*`
    /// variables through `lookup`.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let run_mode = lookup("RUN_MODE").unwrap_or_else(|| "development".into());

        let mut builder = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with SMSKIT_)
            .add_source(Environment::with_prefix("SMSKIT").separator("__"));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, lookup(*var))?;
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = AppConfig::load_with(lookup_from(&[])).unwrap();
        assert_eq!(config.sms.default_channel, "aliyun");
        assert_eq!(config.sms.aliyun.region_id, "cn-hangzhou");
        assert_eq!(config.sms.aliyun.timeout, 30);
        assert!(config.sms.aliyun.access_key_id.is_empty());
        assert!(config.sms.aliyun.templates.verification.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.is_json());
    }

    #[test]
    fn aliyun_env_overrides_apply() {
        let config = AppConfig::load_with(lookup_from(&[
            ("ALIYUN_SMS_ACCESS_KEY_ID", "LTAI-test"),
            ("ALIYUN_SMS_ACCESS_KEY_SECRET", "secret"),
            ("ALIYUN_SMS_REGION_ID", "cn-beijing"),
            ("ALIYUN_SMS_SIGN_NAME", "测试签名"),
            ("ALIYUN_SMS_TIMEOUT", "45"),
            ("ALIYUN_SMS_TEMPLATE_VERIFICATION", "SMS_V"),
            ("ALIYUN_SMS_TEMPLATE_MARKETING", "SMS_M"),
        ]))
        .unwrap();

        let aliyun = &config.sms.aliyun;
        assert_eq!(aliyun.access_key_id, "LTAI-test");
        assert_eq!(aliyun.access_key_secret, "secret");
        assert_eq!(aliyun.region_id, "cn-beijing");
        assert_eq!(aliyun.sign_name, "测试签名");
        assert_eq!(aliyun.timeout, 45);
        assert_eq!(aliyun.templates.verification, "SMS_V");
        assert_eq!(aliyun.templates.notification, "");
        assert_eq!(aliyun.templates.marketing, "SMS_M");
    }

    #[test]
    fn log_format_is_case_insensitive() {
        let pretty = LoggingConfig {
            level: "debug".into(),
            format: "pretty".into(),
        };
        assert!(!pretty.is_json());
        let json = LoggingConfig {
            level: "debug".into(),
            format: "JSON".into(),
        };
        assert!(json.is_json());
    }
}
