//! Composition root: the host registers every channel it wants explicitly.

use crate::config::AppConfig;
use sms_aliyun::{AliyunChannel, AliyunTransport, HttpTransport};
use sms_core::{ChannelRegistry, SmsChannel};
use std::sync::Arc;
use tracing::debug;

/// Registry with every built-in channel, talking to the real vendor endpoints.
pub fn default_registry(config: &AppConfig) -> ChannelRegistry {
    registry_with_transport(config, Arc::new(HttpTransport::new()))
}

/// Like [`default_registry`] but with a caller-supplied Aliyun transport.
///
/// Instances created from the registry share the transport (and its
/// connection pool) but each gets its own copy of the configured settings.
pub fn registry_with_transport(
    config: &AppConfig,
    transport: Arc<dyn AliyunTransport>,
) -> ChannelRegistry {
    let aliyun = config.sms.aliyun.clone();
    debug!(
        channel = sms_aliyun::CHANNEL_TYPE,
        region = aliyun.effective_region(),
        "registering SMS channel"
    );
    ChannelRegistry::new().with(sms_aliyun::CHANNEL_TYPE, move || {
        Box::new(AliyunChannel::with_transport(
            aliyun.clone(),
            transport.clone(),
        )) as Box<dyn SmsChannel>
    })
}

/// Instance of the configured default channel, if it is registered.
pub fn default_channel(
    config: &AppConfig,
    registry: &ChannelRegistry,
) -> Option<Box<dyn SmsChannel>> {
    registry.create(&config.sms.default_channel)
}
