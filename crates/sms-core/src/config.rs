use serde::{Deserialize, Serialize};

pub const DEFAULT_REGION_ID: &str = "cn-hangzhou";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Credentials and settings owned by a single channel instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub access_key_id: String,
    pub access_key_secret: String,
    /// Region used to derive the vendor endpoint (default: cn-hangzhou)
    pub region_id: String,
    /// Sender identity required by the vendor on every message
    pub sign_name: String,
    /// Transport timeout in seconds (default: 30)
    pub timeout: u64,
    pub templates: TemplateIds,
}

/// Pre-registered template ids per message category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateIds {
    pub verification: String,
    pub notification: String,
    pub marketing: String,
}

/// Partial configuration. Present fields override, absent fields are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sign_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    pub templates: TemplateIdsPatch,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateIdsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marketing: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            access_key_secret: String::new(),
            region_id: DEFAULT_REGION_ID.to_string(),
            sign_name: String::new(),
            timeout: DEFAULT_TIMEOUT_SECS,
            templates: TemplateIds::default(),
        }
    }
}

impl ChannelConfig {
    /// Copy of `self` with every field present in `patch` applied on top.
    pub fn merged(&self, patch: &ChannelConfigPatch) -> ChannelConfig {
        let mut out = self.clone();
        out.merge(patch);
        out
    }

    /// In-place variant of [`ChannelConfig::merged`].
    pub fn merge(&mut self, patch: &ChannelConfigPatch) {
        overlay(&mut self.access_key_id, &patch.access_key_id);
        overlay(&mut self.access_key_secret, &patch.access_key_secret);
        overlay(&mut self.region_id, &patch.region_id);
        overlay(&mut self.sign_name, &patch.sign_name);
        if let Some(timeout) = patch.timeout {
            self.timeout = timeout;
        }
        overlay(&mut self.templates.verification, &patch.templates.verification);
        overlay(&mut self.templates.notification, &patch.templates.notification);
        overlay(&mut self.templates.marketing, &patch.templates.marketing);
    }

    /// Region to talk to, falling back to the default when left blank.
    pub fn effective_region(&self) -> &str {
        if is_blank(Some(&self.region_id)) {
            DEFAULT_REGION_ID
        } else {
            &self.region_id
        }
    }
}

fn overlay(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        target.clone_from(v);
    }
}

/// A setting counts as missing when absent, empty, or the falsy string "0".
pub fn is_blank(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v == "0",
    }
}

/// Value of a candidate field, or the stored one when the candidate omits it.
pub fn candidate_or<'a>(candidate: &'a Option<String>, stored: &'a str) -> &'a str {
    candidate.as_deref().unwrap_or(stored)
}
