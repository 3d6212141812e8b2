use axum::{
    extract::{rejection::JsonRejection, RawQuery, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::{AnalyticsForwarder, CtaEvent};
use crate::config::Config;
use crate::cta::{redirect_for, StickyCta};
use crate::errors::AppError;
use crate::evolution_client::EvolutionApiService;
use crate::evolution_models::{ApiResponse, SendTextResponse};
use crate::models::{EnrollmentFormData, LeadFormData, UtmParams};
use crate::storage::{KeyValueStore, MokaStore, ScopedStore};
use crate::submission::{lead_fingerprint, SubmissionGuard, SubmissionPipeline};
use crate::utm::UtmTracker;
use crate::validation::Validate;

/// Header carrying the anonymous visitor id the landing pages keep locally.
pub const VISITOR_HEADER: &str = "x-visitor-id";

/// Where the quick-capture page sends the visitor after submitting.
pub const LEAD_REDIRECT: &str = "/vendas";

const VISITOR_STORE_CAPACITY: u64 = 100_000;
const IN_FLIGHT_TTL: Duration = Duration::from_secs(60);

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// WhatsApp notifier for captured leads.
    pub notifier: EvolutionApiService,
    /// Per-visitor key/value state (UTM attribution, CTA dismissal).
    pub visitor_store: Arc<dyn KeyValueStore>,
    /// CTA-click analytics fan-out.
    pub analytics: AnalyticsForwarder,
    /// In-flight lock preventing duplicate concurrent submissions of the same lead.
    pub submission_guard: SubmissionGuard,
    pub lead_pipeline: SubmissionPipeline,
    pub enrollment_pipeline: SubmissionPipeline,
}

impl AppState {
    pub fn from_config(config: Config) -> Self {
        let client = reqwest::Client::new();

        let mut notifier =
            EvolutionApiService::with_client(client.clone(), config.evolution.clone());
        if let Some(ref recipient) = config.lead_notify_recipient {
            notifier = notifier.with_default_recipient(recipient.clone());
        }

        let analytics =
            AnalyticsForwarder::from_config(client, config.ga4.clone(), config.meta_pixel.clone());

        Self {
            notifier,
            visitor_store: Arc::new(MokaStore::new(VISITOR_STORE_CAPACITY)),
            analytics,
            submission_guard: SubmissionGuard::new(IN_FLIGHT_TTL),
            lead_pipeline: SubmissionPipeline::from_millis(config.lead_submit_min_ms),
            enrollment_pipeline: SubmissionPipeline::from_millis(config.enrollment_submit_min_ms),
            config,
        }
    }

    fn visitor_store(&self, visitor_id: &str) -> ScopedStore {
        ScopedStore::new(self.visitor_store.clone(), visitor_id)
    }
}

/// Reads the visitor id header.
///
/// Ids are opaque but restricted to a short alphanumeric alphabet so they are
/// safe to embed in storage keys.
fn visitor_id(headers: &HeaderMap) -> Result<Option<String>, AppError> {
    let Some(value) = headers.get(VISITOR_HEADER) else {
        return Ok(None);
    };

    let id = value
        .to_str()
        .map_err(|_| AppError::BadRequest("Invalid visitor id".to_string()))?
        .trim();

    let well_formed = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !well_formed {
        return Err(AppError::BadRequest("Invalid visitor id".to_string()));
    }

    Ok(Some(id.to_string()))
}

fn require_visitor_id(headers: &HeaderMap) -> Result<String, AppError> {
    visitor_id(headers)?
        .ok_or_else(|| AppError::BadRequest(format!("Missing {} header", VISITOR_HEADER)))
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "urolaser-leads",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Fallback for unknown paths.
pub async fn not_found(uri: axum::http::Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

/// Response for both lead forms.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmissionResponse {
    pub success: bool,
    /// Page the visitor should be sent to next, if any.
    pub redirect: Option<String>,
    /// Whether the WhatsApp notification was accepted by the provider.
    pub notified: bool,
    pub message_id: Option<String>,
}

impl SubmissionResponse {
    fn from_outcome(outcome: ApiResponse<SendTextResponse>, redirect: Option<&str>) -> Self {
        let (notified, message_id) = match outcome {
            Ok(response) => (true, Some(response.key.id)),
            Err(e) => {
                tracing::warn!("⚠️  Lead notification not delivered: {}", e);
                (false, None)
            }
        };

        Self {
            success: true,
            redirect: redirect.map(str::to_string),
            notified,
            message_id,
        }
    }
}

/// POST /api/v1/leads
///
/// Quick-capture form (name, email, WhatsApp). Valid submissions notify the
/// sales team and redirect to the sales page. A failed notification is
/// reported in the body but never fails the submission.
pub async fn submit_lead(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LeadFormData>, JsonRejection>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let Json(form) = payload?;
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let fingerprint = lead_fingerprint(&form.email, &form.whatsapp);
    let Some(lease) = state.submission_guard.try_acquire(&fingerprint).await else {
        return Err(AppError::Conflict("Envio já em andamento".to_string()));
    };
    tracing::info!("📨 Lead submitted: {}", &fingerprint[..12]);

    let outcome = state
        .lead_pipeline
        .run(state.notifier.send_lead_notification(&form, None))
        .await;
    lease.release().await;

    Ok(Json(SubmissionResponse::from_outcome(
        outcome,
        Some(LEAD_REDIRECT),
    )))
}

/// POST /api/v1/enrollments
///
/// Extended enrollment form. Same flow as the quick-capture form, without a redirect.
pub async fn submit_enrollment(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EnrollmentFormData>, JsonRejection>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let Json(form) = payload?;
    let errors = form.validate();
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let fingerprint = lead_fingerprint(&form.email, &form.phone);
    let Some(lease) = state.submission_guard.try_acquire(&fingerprint).await else {
        return Err(AppError::Conflict("Envio já em andamento".to_string()));
    };
    tracing::info!("📨 Enrollment submitted: {}", &fingerprint[..12]);

    let outcome = state
        .enrollment_pipeline
        .run(state.notifier.send_enrollment_notification(&form, None))
        .await;
    lease.release().await;

    Ok(Json(SubmissionResponse::from_outcome(outcome, None)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UtmResponse {
    pub visitor_id: String,
    pub params: UtmParams,
}

/// GET /api/v1/utm?{page query string}
///
/// Called on page load with the landing page's own query string. Visitors
/// without an id get a fresh one, echoed in the body and the response header.
pub async fn capture_utm(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<([(&'static str, String); 1], Json<UtmResponse>), AppError> {
    let visitor_id = match visitor_id(&headers)? {
        Some(id) => id,
        None => uuid::Uuid::new_v4().to_string(),
    };

    let store = state.visitor_store(&visitor_id);
    let params = UtmTracker::new(&store).capture(query.as_deref().unwrap_or(""));

    Ok((
        [(VISITOR_HEADER, visitor_id.clone())],
        Json(UtmResponse { visitor_id, params }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CtaClickRequest {
    pub source: String,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct CtaClickResponse {
    pub event: CtaEvent,
    pub redirect: Option<&'static str>,
}

/// POST /api/v1/events/cta
///
/// Records a CTA click with the visitor's stored attribution.
pub async fn track_cta(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CtaClickRequest>, JsonRejection>,
) -> Result<Json<CtaClickResponse>, AppError> {
    let Json(request) = payload?;
    let source = request.source.trim();
    let action = request.action.trim();
    if source.is_empty() || action.is_empty() {
        return Err(AppError::BadRequest(
            "source and action are required".to_string(),
        ));
    }

    let utm = match visitor_id(&headers)? {
        Some(id) => UtmTracker::new(&state.visitor_store(&id)).current(),
        None => UtmParams::default(),
    };

    let event = state.analytics.track_cta_click(source, action, &utm);

    Ok(Json(CtaClickResponse {
        event,
        redirect: redirect_for(action),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StickyCtaResponse {
    pub visible: bool,
}

/// GET /api/v1/cta/sticky
pub async fn sticky_cta_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StickyCtaResponse>, AppError> {
    let visible = match visitor_id(&headers)? {
        Some(id) => StickyCta::new(&state.visitor_store(&id)).is_visible(Utc::now()),
        None => true,
    };

    Ok(Json(StickyCtaResponse { visible }))
}

/// POST /api/v1/cta/sticky/dismiss
///
/// Hides the sticky banner for this visitor for the next 12 hours.
pub async fn dismiss_sticky_cta(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StickyCtaResponse>, AppError> {
    let id = require_visitor_id(&headers)?;
    StickyCta::new(&state.visitor_store(&id)).dismiss(Utc::now());
    tracing::debug!("Sticky CTA dismissed by visitor {}", id);

    Ok(Json(StickyCtaResponse { visible: false }))
}
