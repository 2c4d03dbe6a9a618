//! Send a verification code through the Aliyun channel.
//!
//! Credentials come from the usual `ALIYUN_SMS_*` variables; the recipient and
//! code from `--to`/`--code` or `SMS_TO`/`SMS_CODE`.
use smskit::channels::{default_channel, default_registry};
use sms_core::SmsChannel;
use smskit::{AppConfig, logging};

use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    let to = arg_or_env("--to", "SMS_TO").ok_or("missing recipient (--to or SMS_TO)")?;
    let code = arg_or_env("--code", "SMS_CODE").unwrap_or_else(|| "123456".to_string());

    let registry = default_registry(&config);
    let channel = default_channel(&config, &registry)
        .ok_or_else(|| format!("channel {} is not registered", config.sms.default_channel))?;

    let validation = channel.validate_config(&Default::default());
    for warning in &validation.warnings {
        eprintln!("warning: {}", warning);
    }

    let res = channel
        .send_verification(&to, &code, sms_core::DEFAULT_EXPIRE_MINUTES)
        .await;
    println!(
        "Sent via {}: success={} message={}\n{}",
        channel.channel_type(),
        res.success,
        res.message,
        serde_json::to_string_pretty(&res)?
    );
    Ok(())
}

fn arg_or_env(flag: &str, env_key: &str) -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if let Some(idx) = args.iter().position(|a| a == flag) {
        if idx + 1 < args.len() {
            return Some(args[idx + 1].clone());
        }
    }
    env::var(env_key).ok()
}
