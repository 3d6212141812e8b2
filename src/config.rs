use serde::Deserialize;

use crate::evolution_models::EvolutionApiConfig;
use crate::validation::normalize_recipient;

/// GA4 Measurement Protocol credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct Ga4Config {
    pub measurement_id: String,
    pub api_secret: String,
}

/// Meta Conversions API credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct MetaPixelConfig {
    pub pixel_id: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub evolution: EvolutionApiConfig,
    /// Digits-only WhatsApp number that receives lead notifications.
    pub lead_notify_recipient: Option<String>,
    pub lead_submit_min_ms: u64,
    pub enrollment_submit_min_ms: u64,
    pub ga4: Option<Ga4Config>,
    pub meta_pixel: Option<MetaPixelConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Evolution API settings are mandatory: a missing or blank value fails
    /// startup instead of falling back to a placeholder endpoint.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            port: var("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            evolution: EvolutionApiConfig {
                base_url: var("EVOLUTION_API_URL")
                    .or_else(|| var("NEXT_PUBLIC_EVOLUTION_API_URL"))
                    .ok_or_else(|| {
                        anyhow::anyhow!("EVOLUTION_API_URL environment variable required")
                    })
                    .and_then(|url| {
                        if !url.starts_with("http://") && !url.starts_with("https://") {
                            anyhow::bail!("EVOLUTION_API_URL must start with http:// or https://");
                        }
                        Ok(url.trim_end_matches('/').to_string())
                    })?,
                api_key: var("EVOLUTION_API_KEY")
                    .or_else(|| var("NEXT_PUBLIC_EVOLUTION_API_KEY"))
                    .ok_or_else(|| {
                        anyhow::anyhow!("EVOLUTION_API_KEY environment variable required")
                    })?,
                instance_name: var("EVOLUTION_INSTANCE_NAME")
                    .or_else(|| var("NEXT_PUBLIC_EVOLUTION_INSTANCE_NAME"))
                    .ok_or_else(|| {
                        anyhow::anyhow!("EVOLUTION_INSTANCE_NAME environment variable required")
                    })?,
            },
            lead_notify_recipient: var("LEAD_NOTIFY_RECIPIENT")
                .map(|raw| {
                    normalize_recipient(&raw)
                        .map_err(|e| anyhow::anyhow!("LEAD_NOTIFY_RECIPIENT invalid: {}", e))
                })
                .transpose()?,
            lead_submit_min_ms: parse_millis(var("LEAD_SUBMIT_MIN_MS"), 1500, "LEAD_SUBMIT_MIN_MS")?,
            enrollment_submit_min_ms: parse_millis(
                var("ENROLLMENT_SUBMIT_MIN_MS"),
                2000,
                "ENROLLMENT_SUBMIT_MIN_MS",
            )?,
            ga4: match (var("GA4_MEASUREMENT_ID"), var("GA4_API_SECRET")) {
                (Some(measurement_id), Some(api_secret)) => Some(Ga4Config {
                    measurement_id,
                    api_secret,
                }),
                (None, None) => None,
                _ => anyhow::bail!("GA4_MEASUREMENT_ID and GA4_API_SECRET must be set together"),
            },
            meta_pixel: match (var("META_PIXEL_ID"), var("META_ACCESS_TOKEN")) {
                (Some(pixel_id), Some(access_token)) => Some(MetaPixelConfig {
                    pixel_id,
                    access_token,
                }),
                (None, None) => None,
                _ => anyhow::bail!("META_PIXEL_ID and META_ACCESS_TOKEN must be set together"),
            },
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Evolution API URL: {}", config.evolution.base_url);
        tracing::debug!("Evolution instance: {}", config.evolution.instance_name);
        if let Some(ref recipient) = config.lead_notify_recipient {
            tracing::info!("Lead notifications go to {}", recipient);
        }
        tracing::debug!(
            "Trackers: ga4={}, meta_pixel={}",
            config.ga4.is_some(),
            config.meta_pixel.is_some()
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn parse_millis(raw: Option<String>, default: u64, name: &str) -> anyhow::Result<u64> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a whole number of milliseconds", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("EVOLUTION_API_URL", "https://evo.example.com/"),
        ("EVOLUTION_API_KEY", "secret"),
        ("EVOLUTION_INSTANCE_NAME", "formulario"),
    ];

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.evolution.base_url, "https://evo.example.com");
        assert_eq!(config.lead_submit_min_ms, 1500);
        assert_eq!(config.enrollment_submit_min_ms, 2000);
        assert!(config.lead_notify_recipient.is_none());
        assert!(config.ga4.is_none());
        assert!(config.meta_pixel.is_none());
    }

    #[test]
    fn test_next_public_names_are_accepted() {
        let config = Config::from_lookup(lookup(&[
            ("NEXT_PUBLIC_EVOLUTION_API_URL", "http://localhost:8080"),
            ("NEXT_PUBLIC_EVOLUTION_API_KEY", "key"),
            ("NEXT_PUBLIC_EVOLUTION_INSTANCE_NAME", "site"),
        ]))
        .unwrap();

        assert_eq!(config.evolution.instance_name, "site");
    }

    #[test]
    fn test_missing_api_key_fails_fast() {
        let err = Config::from_lookup(lookup(&[
            ("EVOLUTION_API_URL", "https://evo.example.com"),
            ("EVOLUTION_API_KEY", "  "),
            ("EVOLUTION_INSTANCE_NAME", "formulario"),
        ]))
        .unwrap_err();

        assert!(err.to_string().contains("EVOLUTION_API_KEY"));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars[0] = ("EVOLUTION_API_URL", "evo.example.com");
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_recipient_is_normalized() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("LEAD_NOTIFY_RECIPIENT", "(12) 99124-6207"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.lead_notify_recipient.as_deref(), Some("5512991246207"));
    }

    #[test]
    fn test_half_configured_tracker_is_an_error() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("GA4_MEASUREMENT_ID", "G-123"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }
}
