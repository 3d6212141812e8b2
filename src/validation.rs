//! Client-facing form validation.
//!
//! The checks are intentionally loose: required fields plus a permissive email
//! and phone shape. Nothing here verifies that a phone number exists or that an
//! email is deliverable.

use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::models::{EnrollmentFormData, LeadFormData};

/// Field name to human-readable message, one entry per failing field.
pub type FieldErrors = BTreeMap<&'static str, &'static str>;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s\-\(\)\+]+$").expect("static phone regex"));

/// Accepts `local@domain.tld` shapes without whitespace.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Accepts digits, spaces, parentheses, hyphens and plus signs.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// A form that can report its own field errors.
pub trait Validate {
    fn validate(&self) -> FieldErrors;

    fn is_submittable(&self) -> bool {
        self.validate().is_empty()
    }
}

fn require(errors: &mut FieldErrors, field: &'static str, value: &str, message: &'static str) {
    if value.trim().is_empty() {
        errors.insert(field, message);
    }
}

fn check_email(errors: &mut FieldErrors, value: &str) {
    if value.trim().is_empty() {
        errors.insert("email", "Email é obrigatório");
    } else if !is_valid_email(value) {
        errors.insert("email", "Email inválido");
    }
}

fn check_phone(
    errors: &mut FieldErrors,
    field: &'static str,
    value: &str,
    missing: &'static str,
    invalid: &'static str,
) {
    if value.trim().is_empty() {
        errors.insert(field, missing);
    } else if !is_valid_phone(value) {
        errors.insert(field, invalid);
    }
}

impl Validate for LeadFormData {
    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", &self.name, "Nome é obrigatório");
        check_email(&mut errors, &self.email);
        check_phone(
            &mut errors,
            "whatsapp",
            &self.whatsapp,
            "WhatsApp é obrigatório",
            "WhatsApp inválido",
        );
        errors
    }
}

impl Validate for EnrollmentFormData {
    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        require(&mut errors, "name", &self.name, "Nome é obrigatório");
        check_email(&mut errors, &self.email);
        check_phone(
            &mut errors,
            "phone",
            &self.phone,
            "Telefone é obrigatório",
            "Telefone inválido",
        );
        require(&mut errors, "city", &self.city, "Cidade é obrigatória");
        require(
            &mut errors,
            "profession",
            &self.profession,
            "Profissão é obrigatória",
        );
        require(
            &mut errors,
            "experience",
            &self.experience,
            "Experiência é obrigatória",
        );
        errors
    }
}

/// Validate and normalize a Brazilian number for use as a WhatsApp recipient.
///
/// Uses the phonenumber library (port of Google's libphonenumber) and returns
/// the E.164 digits without the leading `+`, which is what Evolution expects
/// (e.g. `(12) 99124-6207` → `5512991246207`).
pub fn normalize_recipient(raw: &str) -> Result<String, String> {
    if raw.trim().is_empty() {
        return Err("Recipient number is empty".to_string());
    }

    let number = phonenumber::parse(Some(CountryId::BR), raw)
        .map_err(|e| format!("Failed to parse recipient '{}': {:?}", raw, e))?;

    if !phonenumber::is_valid(&number) {
        return Err(format!("Invalid Brazilian phone number: {}", raw));
    }

    let formatted = number.format().mode(Mode::E164).to_string();
    tracing::debug!("✓ Valid recipient: {} → {}", raw, formatted);
    Ok(formatted.trim_start_matches('+').to_string())
}
