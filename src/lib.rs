//! # SMS Kit
//!
//! Pluggable SMS channels for Rust: one uniform send contract, interchangeable
//! provider backends.
//!
//! ## Features
//!
//! - **Uniform contract**: every provider implements [`sms_core::SmsChannel`]
//! - **Aliyun backend**: templated single, batch and verification-code sends
//! - **Normalized results**: callers only ever inspect [`sms_core::SendResult`]
//! - **Config validation**: nothing reaches the vendor with missing credentials
//! - **Environment-based configuration**: `ALIYUN_SMS_*` variables and config files
//! - **Observability**: structured logging with `tracing`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smskit::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let registry = smskit::channels::default_registry(&config);
//!     let channel = registry.create("aliyun").expect("aliyun is registered");
//!
//!     let result = channel.send_verification("13800138000", "123456", 10).await;
//!     println!("{}: {}", result.success, result.message);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Settings live under `sms.<provider>.<field>`; the documented environment
//! variables override them:
//!
//! ```rust,ignore
//! use smskit::config::AppConfig;
//!
//! // ALIYUN_SMS_SIGN_NAME=MyApp ALIYUN_SMS_REGION_ID=cn-beijing
//! let config = AppConfig::load()?;
//! println!("region: {}", config.sms.aliyun.region_id);
//! ```

pub mod channels;
pub mod config;
pub mod logging;

pub use crate::config::{AppConfig, LoggingConfig, SmsConfig};

/// Common imports for SMS Kit usage
pub mod prelude {
    pub use crate::channels::{default_channel, default_registry};
    pub use crate::config::{AppConfig, LoggingConfig, SmsConfig};
    pub use sms_aliyun::AliyunChannel;
    pub use sms_core::*;
}
