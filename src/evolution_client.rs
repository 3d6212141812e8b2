use chrono::Utc;

use crate::evolution_models::{
    ApiResponse, EvolutionApiConfig, EvolutionApiError, SendTextRequest, SendTextResponse,
    INVALID_RESPONSE,
};
use crate::models::{EnrollmentFormData, LeadFormData, LeadSource, WhatsAppMessageData};

/// WhatsApp number that receives lead notifications when no recipient is given.
pub const DEFAULT_RECIPIENT: &str = "5512991246207";

/// Number used by [`EvolutionApiService::test_connection`].
pub const TEST_RECIPIENT: &str = "5512991246207";

pub const TEST_MESSAGE: &str = "🔧 Teste de conexão - Evolution API";

/// Delay the provider waits before delivering lead notifications.
const NOTIFICATION_DELAY_MS: u64 = 1000;

/// Client for sending WhatsApp text messages through an Evolution API instance.
///
/// Every call makes exactly one HTTP attempt. Failures come back as
/// [`EvolutionApiError`] values; nothing here panics or retries.
#[derive(Clone)]
pub struct EvolutionApiService {
    client: reqwest::Client,
    config: EvolutionApiConfig,
    default_recipient: String,
}

impl EvolutionApiService {
    pub fn new(config: EvolutionApiConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    pub fn with_client(client: reqwest::Client, config: EvolutionApiConfig) -> Self {
        Self {
            client,
            config,
            default_recipient: DEFAULT_RECIPIENT.to_string(),
        }
    }

    /// Overrides the number used when a notification has no explicit recipient.
    pub fn with_default_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.default_recipient = recipient.into();
        self
    }

    pub fn default_recipient(&self) -> &str {
        &self.default_recipient
    }

    fn send_text_url(&self) -> String {
        format!(
            "{}/message/sendText/{}",
            self.config.base_url, self.config.instance_name
        )
    }

    /// Sends a text message.
    ///
    /// # Returns
    ///
    /// * `Ok(SendTextResponse)` - The provider accepted the message.
    /// * `Err(EvolutionApiError)` - Provider error with its HTTP status, or
    ///   `NETWORK_ERROR` with status 0 when no response arrived.
    pub async fn send_text(&self, request: &SendTextRequest) -> ApiResponse<SendTextResponse> {
        let url = self.send_text_url();
        tracing::info!(
            "Sending WhatsApp text via Evolution instance '{}'",
            self.config.instance_name
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Evolution API request failed: {}", e);
                EvolutionApiError::network(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EvolutionApiError::network(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            let error = provider_error(status, &body);
            tracing::warn!("Evolution API returned {}: {}", status, error.message);
            return Err(error);
        }

        let data: SendTextResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse Evolution API response: {}", e);
            EvolutionApiError {
                error: INVALID_RESPONSE.to_string(),
                message: format!("Failed to parse Evolution API response: {}", e),
                status_code: status.as_u16(),
            }
        })?;

        tracing::info!("✓ WhatsApp message accepted: {}", data.key.id);
        Ok(data)
    }

    /// Notifies the sales team about a quick-capture lead.
    pub async fn send_lead_notification(
        &self,
        lead: &LeadFormData,
        recipient: Option<&str>,
    ) -> ApiResponse<SendTextResponse> {
        let data = WhatsAppMessageData::new(lead.clone(), LeadSource::LeadCapture, Utc::now());
        let request = self.notification_request(format_lead_message(&data), recipient);
        self.send_text(&request).await
    }

    /// Notifies the sales team about a completed enrollment form.
    pub async fn send_enrollment_notification(
        &self,
        enrollment: &EnrollmentFormData,
        recipient: Option<&str>,
    ) -> ApiResponse<SendTextResponse> {
        let data = WhatsAppMessageData::new(enrollment.into(), LeadSource::Enrollment, Utc::now());
        let request =
            self.notification_request(format_enrollment_message(&data, enrollment), recipient);
        self.send_text(&request).await
    }

    fn notification_request(&self, text: String, recipient: Option<&str>) -> SendTextRequest {
        SendTextRequest {
            delay: Some(NOTIFICATION_DELAY_MS),
            link_preview: Some(false),
            ..SendTextRequest::new(recipient.unwrap_or(&self.default_recipient), text)
        }
    }

    /// True when base URL, API key and instance name are all non-empty.
    pub fn validate_config(&self) -> bool {
        !self.config.base_url.is_empty()
            && !self.config.api_key.is_empty()
            && !self.config.instance_name.is_empty()
    }

    /// Sends a fixed diagnostic message and reports whether it was accepted.
    pub async fn test_connection(&self) -> bool {
        let request = SendTextRequest::new(TEST_RECIPIENT, TEST_MESSAGE);
        match self.send_text(&request).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Evolution API connection test failed: {}", e);
                false
            }
        }
    }
}

/// Builds the error for a non-2xx response.
///
/// The body is read leniently: `error`/`message` are taken from it when
/// present, otherwise the status reason and the raw text are used. The status
/// code always reflects the actual HTTP status.
fn provider_error(status: reqwest::StatusCode, body: &str) -> EvolutionApiError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
    };

    EvolutionApiError {
        error: field("error")
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("HTTP_ERROR").to_string()),
        message: field("message").unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Unknown error".to_string()
            } else {
                body.to_string()
            }
        }),
        status_code: status.as_u16(),
    }
}

/// Renders the WhatsApp notification for a captured lead.
pub fn format_lead_message(data: &WhatsAppMessageData) -> String {
    let mut msg = String::new();

    msg.push_str("🎯 *NOVO LEAD CAPTURADO - UroLaser*\n\n");
    msg.push_str("📝 *Dados do Lead:*\n");
    msg.push_str(&format!("• *Nome:* {}\n", data.lead.name));
    msg.push_str(&format!("• *Email:* {}\n", data.lead.email));
    msg.push_str(&format!("• *WhatsApp:* {}\n\n", data.lead.whatsapp));
    msg.push_str(&format!("⏰ *Data/Hora:* {}\n", data.timestamp));
    msg.push_str(&format!("🔗 *Origem:* {}\n\n", data.source.as_str()));
    msg.push_str("---\n");
    msg.push_str("*Lead interessado em descobrir o segredo para trabalhar em cirurgias sem formação na área da saúde.*\n\n");
    msg.push_str("✅ *Próximos passos:*\n");
    msg.push_str("1. Entrar em contato via WhatsApp\n");
    msg.push_str("2. Enviar material sobre Representante Hospitalar\n");
    msg.push_str("3. Agendar conversa para apresentação");

    msg
}

/// Renders the WhatsApp notification for an enrollment form.
pub fn format_enrollment_message(
    data: &WhatsAppMessageData,
    enrollment: &EnrollmentFormData,
) -> String {
    let mut msg = String::new();

    msg.push_str("🩺 *NOVA INSCRIÇÃO - UroLaser*\n\n");
    msg.push_str("📝 *Dados do Inscrito:*\n");
    msg.push_str(&format!("• *Nome:* {}\n", data.lead.name));
    msg.push_str(&format!("• *Email:* {}\n", data.lead.email));
    msg.push_str(&format!("• *Telefone:* {}\n", data.lead.whatsapp));
    msg.push_str(&format!("• *Cidade:* {}\n", enrollment.city));
    msg.push_str(&format!("• *Profissão:* {}\n", enrollment.profession));
    msg.push_str(&format!("• *Experiência:* {}\n", enrollment.experience));
    if !enrollment.motivation.trim().is_empty() {
        msg.push_str(&format!("• *Motivação:* {}\n", enrollment.motivation.trim()));
    }
    msg.push('\n');
    msg.push_str(&format!("⏰ *Data/Hora:* {}\n", data.timestamp));
    msg.push_str(&format!("🔗 *Origem:* {}", data.source.as_str()));

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn config() -> EvolutionApiConfig {
        EvolutionApiConfig {
            base_url: "https://evo.example.com".to_string(),
            api_key: "key".to_string(),
            instance_name: "formulario".to_string(),
        }
    }

    fn sample_data() -> WhatsAppMessageData {
        let lead = LeadFormData {
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            whatsapp: "11999999999".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 13, 30, 0).unwrap();
        WhatsAppMessageData::new(lead, LeadSource::LeadCapture, at)
    }

    #[test]
    fn test_lead_message_contains_lead_data() {
        let msg = format_lead_message(&sample_data());

        assert!(msg.starts_with("🎯 *NOVO LEAD CAPTURADO - UroLaser*"));
        assert!(msg.contains("• *Nome:* Ana"));
        assert!(msg.contains("• *Email:* ana@x.com"));
        assert!(msg.contains("• *WhatsApp:* 11999999999"));
        assert!(msg.contains("⏰ *Data/Hora:* 16/10/2026, 10:30"));
        assert!(msg.contains("🔗 *Origem:* lead-capture"));
        assert!(msg.ends_with("3. Agendar conversa para apresentação"));
    }

    #[test]
    fn test_enrollment_message_skips_blank_motivation() {
        let enrollment = EnrollmentFormData {
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            phone: "11999999999".to_string(),
            city: "Taubaté".to_string(),
            profession: "Enfermeira".to_string(),
            experience: "3 anos".to_string(),
            motivation: "  ".to_string(),
        };
        let data = WhatsAppMessageData::new(
            (&enrollment).into(),
            LeadSource::Enrollment,
            Utc::now(),
        );
        let msg = format_enrollment_message(&data, &enrollment);

        assert!(msg.contains("• *Cidade:* Taubaté"));
        assert!(msg.contains("🔗 *Origem:* enrollment"));
        assert!(!msg.contains("Motivação"));
    }

    #[test]
    fn test_notification_request_defaults() {
        let service = EvolutionApiService::new(config());
        let request = service.notification_request("oi".to_string(), None);

        assert_eq!(request.number, DEFAULT_RECIPIENT);
        assert_eq!(request.delay, Some(1000));
        assert_eq!(request.link_preview, Some(false));

        let service = service.with_default_recipient("5521987654321");
        let request = service.notification_request("oi".to_string(), None);
        assert_eq!(request.number, "5521987654321");

        let request = service.notification_request("oi".to_string(), Some("5511912345678"));
        assert_eq!(request.number, "5511912345678");
    }

    #[test]
    fn test_validate_config() {
        assert!(EvolutionApiService::new(config()).validate_config());

        for blank in 0..3 {
            let mut cfg = config();
            match blank {
                0 => cfg.base_url.clear(),
                1 => cfg.api_key.clear(),
                _ => cfg.instance_name.clear(),
            }
            assert!(!EvolutionApiService::new(cfg).validate_config());
        }
    }

    #[test]
    fn test_provider_error_parsing() {
        let err = provider_error(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"error": "Unauthorized", "message": "Invalid API key", "statusCode": 401}"#,
        );
        assert_eq!(err.error, "Unauthorized");
        assert_eq!(err.message, "Invalid API key");
        assert_eq!(err.status_code, 401);

        let err = provider_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.error, "Bad Gateway");
        assert_eq!(err.message, "upstream down");
        assert_eq!(err.status_code, 502);
    }
}
