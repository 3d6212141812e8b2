use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Connection settings for an Evolution API instance.
#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub instance_name: String,
}

// ============ Request ============

/// Body of `POST /message/sendText/{instance}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTextRequest {
    /// Recipient number with country code, digits only (e.g. "5512991246207").
    pub number: String,
    pub text: String,
    /// Milliseconds the provider waits (showing "typing…") before sending.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted: Option<QuotedMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentions_every_one: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentioned: Option<Vec<String>>,
}

impl SendTextRequest {
    pub fn new(number: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotedMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<QuotedKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<QuotedConversation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedKey {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotedConversation {
    pub conversation: String,
}

// ============ Response ============

/// Provider acknowledgement of a sent message.
///
/// Evolution versions differ in shape (v1 sends `messageTimestamp` as a
/// string), so every field tolerates absence and either encoding. Only the
/// 2xx status decides success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendTextResponse {
    pub key: MessageKey,
    pub message: SentMessage,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub message_timestamp: i64,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageKey {
    pub remote_jid: String,
    pub from_me: bool,
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentMessage {
    #[serde(deserialize_with = "lenient_timestamp")]
    pub message_timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedTextMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedTextMessage {
    pub text: String,
}

/// Accepts a timestamp as a JSON number, a numeric string, or null (0).
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Number(i64),
        Float(f64),
        Text(String),
    }

    match Option::<Timestamp>::deserialize(deserializer)? {
        None => Ok(0),
        Some(Timestamp::Number(n)) => Ok(n),
        Some(Timestamp::Float(f)) => Ok(f as i64),
        Some(Timestamp::Text(text)) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid timestamp: {:?}", text))),
    }
}

// ============ Errors ============

/// Error code used when the request never reached the provider.
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
/// Error code used when the provider answered 2xx with an unreadable body.
pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";

/// Structured failure of a provider call.
///
/// `status_code` is the HTTP status returned by the provider, or `0` when the
/// request failed before any response arrived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvolutionApiError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl EvolutionApiError {
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            error: NETWORK_ERROR.to_string(),
            message: message.into(),
            status_code: 0,
        }
    }

    pub fn is_network_error(&self) -> bool {
        self.error == NETWORK_ERROR
    }
}

impl fmt::Display for EvolutionApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.error, self.status_code, self.message)
    }
}

impl std::error::Error for EvolutionApiError {}

/// Outcome of a provider call: either the parsed payload or a structured error.
pub type ApiResponse<T> = Result<T, EvolutionApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_absent_optionals() {
        let request = SendTextRequest::new("5511999999999", "oi");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"number": "5511999999999", "text": "oi"})
        );
    }

    #[test]
    fn test_request_uses_camel_case() {
        let request = SendTextRequest {
            link_preview: Some(false),
            mentions_every_one: Some(true),
            delay: Some(1000),
            ..SendTextRequest::new("1", "x")
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["linkPreview"], false);
        assert_eq!(value["mentionsEveryOne"], true);
        assert_eq!(value["delay"], 1000);
    }

    #[test]
    fn test_parse_send_text_response() {
        let json = r#"
        {
            "key": {"remoteJid": "5512991246207@s.whatsapp.net", "fromMe": true, "id": "BAE5F1"},
            "message": {"extendedTextMessage": {"text": "oi"}},
            "messageTimestamp": 1760630400,
            "status": "PENDING"
        }
        "#;

        let response: SendTextResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.key.id, "BAE5F1");
        assert!(response.key.from_me);
        assert_eq!(response.message_timestamp, 1760630400);
        assert_eq!(
            response.message.extended_text_message.map(|m| m.text),
            Some("oi".to_string())
        );
    }

    #[test]
    fn test_parse_response_with_string_timestamp() {
        let json = r#"
        {
            "key": {"remoteJid": "5512991246207@s.whatsapp.net", "fromMe": true, "id": "3EB0C7"},
            "message": {"extendedTextMessage": {"text": "oi"}, "messageTimestamp": "1689948497"},
            "messageTimestamp": "1689948497",
            "status": "PENDING"
        }
        "#;

        let response: SendTextResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.key.id, "3EB0C7");
        assert_eq!(response.message_timestamp, 1689948497);
        assert_eq!(response.message.message_timestamp, 1689948497);
    }

    #[test]
    fn test_parse_sparse_response() {
        let response: SendTextResponse =
            serde_json::from_str(r#"{"key": {"id": "ABC"}, "messageTimestamp": null}"#).unwrap();

        assert_eq!(response.key.id, "ABC");
        assert_eq!(response.message_timestamp, 0);
        assert!(response.status.is_empty());
    }
}
