//! UroLaser Lead Service Library
//!
//! Backend for the UroLaser course landing pages: lead form validation, UTM
//! attribution, CTA-click analytics, and WhatsApp lead notifications through
//! the Evolution API.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Domain logic and shared models.
//! - `integrations`: External service clients.
//! - `analytics`: CTA-click event forwarding to tracking sinks.
//! - `config`: Configuration management.
//! - `cta`: Sticky call-to-action dismissal state.
//! - `errors`: Error handling types.
//! - `evolution_client`: Evolution API (WhatsApp) client.
//! - `evolution_models`: Evolution API wire types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Form, notification and attribution models.
//! - `routes`: Router assembly and middleware.
//! - `storage`: Key/value persistence for visitor state.
//! - `submission`: Submission pipeline and in-flight guard.
//! - `utm`: UTM parameter capture.
//! - `validation`: Form validation rules.

pub mod api;
pub mod core;
pub mod integrations;

pub mod analytics;
pub mod config;
pub mod cta;
pub mod errors;
pub mod evolution_client;
pub mod evolution_models;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod storage;
pub mod submission;
pub mod utm;
pub mod validation;
