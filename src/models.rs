use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============ Form Models ============

/// Quick-capture form submitted from the lead-capture page.
///
/// Missing JSON fields deserialize as empty strings so they surface as
/// validation errors instead of body rejections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadFormData {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
}

/// Extended enrollment form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentFormData {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub profession: String,
    pub experience: String,
    /// Free text, never required.
    pub motivation: String,
}

impl From<&EnrollmentFormData> for LeadFormData {
    fn from(form: &EnrollmentFormData) -> Self {
        Self {
            name: form.name.clone(),
            email: form.email.clone(),
            whatsapp: form.phone.clone(),
        }
    }
}

// ============ Notification Models ============

/// Which form produced a lead notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeadSource {
    LeadCapture,
    Enrollment,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSource::LeadCapture => "lead-capture",
            LeadSource::Enrollment => "enrollment",
        }
    }
}

/// Brazil has no daylight saving time since 2019, so São Paulo is a fixed UTC-03:00.
const SAO_PAULO_UTC_OFFSET_HOURS: i64 = -3;

/// Formats an instant the way the pt-BR locale prints a short date/time in
/// São Paulo, e.g. `16/10/2026, 14:30`.
pub fn format_sao_paulo_timestamp(at: DateTime<Utc>) -> String {
    let local = at.naive_utc() + Duration::hours(SAO_PAULO_UTC_OFFSET_HOURS);
    local.format("%d/%m/%Y, %H:%M").to_string()
}

/// Lead data stamped with submission time and origin, used only to render
/// the outbound WhatsApp message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhatsAppMessageData {
    #[serde(flatten)]
    pub lead: LeadFormData,
    pub timestamp: String,
    pub source: LeadSource,
}

impl WhatsAppMessageData {
    pub fn new(lead: LeadFormData, source: LeadSource, at: DateTime<Utc>) -> Self {
        Self {
            lead,
            timestamp: format_sao_paulo_timestamp(at),
            source,
        }
    }
}

// ============ Attribution Models ============

/// The recognized UTM query keys, in canonical order.
pub const UTM_KEYS: [&str; 5] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
];

/// Campaign attribution parameters captured from landing-page URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
}

impl UtmParams {
    /// Extracts the recognized keys from a raw query string.
    ///
    /// A leading `?` is accepted. Empty values are ignored and, for repeated
    /// keys, the first occurrence wins like `URLSearchParams.get`.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            if let Some(slot) = params.slot_mut(&key) {
                if slot.is_none() {
                    *slot = Some(value.into_owned());
                }
            }
        }

        params
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        match key {
            "utm_source" => Some(&mut self.utm_source),
            "utm_medium" => Some(&mut self.utm_medium),
            "utm_campaign" => Some(&mut self.utm_campaign),
            "utm_term" => Some(&mut self.utm_term),
            "utm_content" => Some(&mut self.utm_content),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "utm_source" => self.utm_source.as_deref(),
            "utm_medium" => self.utm_medium.as_deref(),
            "utm_campaign" => self.utm_campaign.as_deref(),
            "utm_term" => self.utm_term.as_deref(),
            "utm_content" => self.utm_content.as_deref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        UTM_KEYS.iter().all(|key| self.get(key).is_none())
    }

    /// Overlays `newer` on top of `self`: keys present in `newer` win,
    /// keys only present in `self` are kept.
    pub fn merge(self, newer: UtmParams) -> UtmParams {
        UtmParams {
            utm_source: newer.utm_source.or(self.utm_source),
            utm_medium: newer.utm_medium.or(self.utm_medium),
            utm_campaign: newer.utm_campaign.or(self.utm_campaign),
            utm_term: newer.utm_term.or(self.utm_term),
            utm_content: newer.utm_content.or(self.utm_content),
        }
    }

    /// Present parameters as an ordered map, handy for spreading into event payloads.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        UTM_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|v| (key.to_string(), v.to_string())))
            .collect()
    }
}
