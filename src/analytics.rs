//! CTA-click analytics.
//!
//! Every click builds one [`CtaEvent`], which is always written to the debug
//! log and then handed to each configured [`TrackingSink`]. Sinks are
//! fire-and-forget: one attempt, no retry, failures only logged.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

use crate::config::{Ga4Config, MetaPixelConfig};
use crate::errors::{AppError, ResultExt};
use crate::models::UtmParams;

pub const CTA_CLICK_EVENT: &str = "cta_click";

pub const GA4_COLLECT_URL: &str = "https://www.google-analytics.com/mp/collect";
pub const META_GRAPH_URL: &str = "https://graph.facebook.com/v19.0";

/// Structured record of a call-to-action click.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CtaEvent {
    pub event_name: String,
    pub event_source: String,
    pub event_action: String,
    /// ISO-8601 UTC with millisecond precision.
    pub timestamp: String,
    #[serde(flatten)]
    pub utm: UtmParams,
    #[serde(skip)]
    pub occurred_at: DateTime<Utc>,
}

impl CtaEvent {
    pub fn new(source: &str, action: &str, utm: UtmParams, at: DateTime<Utc>) -> Self {
        Self {
            event_name: CTA_CLICK_EVENT.to_string(),
            event_source: source.to_string(),
            event_action: action.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            utm,
            occurred_at: at,
        }
    }

    /// UTM parameters as JSON object entries, for spreading into sink payloads.
    fn utm_entries(&self) -> Map<String, Value> {
        self.utm
            .to_map()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    }
}

/// A destination for CTA events.
pub trait TrackingSink: Send + Sync {
    fn name(&self) -> &'static str;
    fn record(&self, event: &CtaEvent);
}

/// Writes events to the structured log at info level.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl TrackingSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn record(&self, event: &CtaEvent) {
        tracing::info!(
            source = %event.event_source,
            action = %event.event_action,
            utm = ?event.utm,
            "cta_click"
        );
    }
}

fn spawn_delivery<F>(sink: &'static str, delivery: F)
where
    F: Future<Output = Result<(), AppError>> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = delivery.await {
                    tracing::warn!("⚠️  {} delivery failed: {}", sink, e);
                }
            });
        }
        Err(_) => tracing::warn!("No async runtime; skipping {} delivery", sink),
    }
}

async fn post_json(
    client: &reqwest::Client,
    url: reqwest::Url,
    body: &Value,
    sink: &'static str,
) -> Result<(), AppError> {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .with_context(|| format!("{} request failed", sink))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AppError::ExternalApiError(format!(
            "{} returned {}: {}",
            sink, status, error_text
        )));
    }

    Ok(())
}

/// Google Analytics 4 via the Measurement Protocol.
#[derive(Clone)]
pub struct Ga4Sink {
    client: reqwest::Client,
    endpoint: String,
    config: Ga4Config,
}

impl Ga4Sink {
    pub fn new(client: reqwest::Client, config: Ga4Config) -> Self {
        Self::with_endpoint(client, config, GA4_COLLECT_URL)
    }

    pub fn with_endpoint(
        client: reqwest::Client,
        config: Ga4Config,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            config,
        }
    }

    /// `cta_click` with the source as category and the action as label.
    pub fn payload(&self, event: &CtaEvent) -> Value {
        let mut params = Map::new();
        params.insert("event_category".to_string(), json!(event.event_source));
        params.insert("event_label".to_string(), json!(event.event_action));
        params.extend(event.utm_entries());

        json!({
            "client_id": uuid::Uuid::new_v4().to_string(),
            "timestamp_micros": event.occurred_at.timestamp_micros(),
            "events": [{ "name": CTA_CLICK_EVENT, "params": params }],
        })
    }

    pub async fn deliver(&self, event: &CtaEvent) -> Result<(), AppError> {
        let url = reqwest::Url::parse_with_params(
            &self.endpoint,
            &[
                ("measurement_id", self.config.measurement_id.as_str()),
                ("api_secret", self.config.api_secret.as_str()),
            ],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build GA4 URL: {}", e)))?;

        post_json(&self.client, url, &self.payload(event), "ga4").await
    }
}

impl TrackingSink for Ga4Sink {
    fn name(&self) -> &'static str {
        "ga4"
    }

    fn record(&self, event: &CtaEvent) {
        let sink = self.clone();
        let event = event.clone();
        spawn_delivery(self.name(), async move { sink.deliver(&event).await });
    }
}

/// Meta (Facebook) Pixel via the Conversions API.
#[derive(Clone)]
pub struct MetaPixelSink {
    client: reqwest::Client,
    graph_url: String,
    config: MetaPixelConfig,
}

impl MetaPixelSink {
    pub fn new(client: reqwest::Client, config: MetaPixelConfig) -> Self {
        Self::with_graph_url(client, config, META_GRAPH_URL)
    }

    pub fn with_graph_url(
        client: reqwest::Client,
        config: MetaPixelConfig,
        graph_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            graph_url: graph_url.into(),
            config,
        }
    }

    /// A `Lead` event named `{source}_{action}`.
    pub fn payload(&self, event: &CtaEvent) -> Value {
        let mut custom_data = Map::new();
        custom_data.insert(
            "content_name".to_string(),
            json!(format!("{}_{}", event.event_source, event.event_action)),
        );
        custom_data.extend(event.utm_entries());

        json!({
            "data": [{
                "event_name": "Lead",
                "event_time": event.occurred_at.timestamp(),
                "action_source": "website",
                "custom_data": custom_data,
            }]
        })
    }

    pub async fn deliver(&self, event: &CtaEvent) -> Result<(), AppError> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/{}/events", self.graph_url, self.config.pixel_id),
            &[("access_token", self.config.access_token.as_str())],
        )
        .map_err(|e| AppError::ExternalApiError(format!("Failed to build Meta URL: {}", e)))?;

        post_json(&self.client, url, &self.payload(event), "meta_pixel").await
    }
}

impl TrackingSink for MetaPixelSink {
    fn name(&self) -> &'static str {
        "meta_pixel"
    }

    fn record(&self, event: &CtaEvent) {
        let sink = self.clone();
        let event = event.clone();
        spawn_delivery(self.name(), async move { sink.deliver(&event).await });
    }
}

/// Builds CTA events and fans them out to the configured sinks.
#[derive(Clone, Default)]
pub struct AnalyticsForwarder {
    sinks: Vec<Arc<dyn TrackingSink>>,
}

impl AnalyticsForwarder {
    pub fn new(sinks: Vec<Arc<dyn TrackingSink>>) -> Self {
        Self { sinks }
    }

    /// Log sink plus whichever third-party trackers are configured.
    pub fn from_config(
        client: reqwest::Client,
        ga4: Option<Ga4Config>,
        meta_pixel: Option<MetaPixelConfig>,
    ) -> Self {
        let mut sinks: Vec<Arc<dyn TrackingSink>> = vec![Arc::new(LogSink)];
        if let Some(config) = ga4 {
            sinks.push(Arc::new(Ga4Sink::new(client.clone(), config)));
        }
        if let Some(config) = meta_pixel {
            sinks.push(Arc::new(MetaPixelSink::new(client, config)));
        }
        Self { sinks }
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn track_cta_click(&self, source: &str, action: &str, utm: &UtmParams) -> CtaEvent {
        let event = CtaEvent::new(source, action, utm.clone(), Utc::now());
        tracing::debug!("CTA Click: {:?}", event);

        for sink in &self.sinks {
            sink.record(&event);
        }

        event
    }
}
