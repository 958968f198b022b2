// Request forms: field-level validation with errors reported back to the client.
//
// A form that fails validation is answered with 422 and the form itself, its
// submitted values and a map of field name to error messages, so the client
// can redisplay it. Nothing is persisted in that case.

pub mod item;
pub mod module;
pub mod project;
pub mod structure;

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Field name to error messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Limit shared by every short text column.
pub const MAX_LENGTH: usize = 200;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str = "Select a valid choice. That choice is not one of the available choices.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Widget {
    Text,
    Textarea,
    Url,
    File,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub widget: Widget,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    pub value: Option<String>,
}

pub fn add_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// Records an error if `value` is blank.
pub fn check_required(errors: &mut FieldErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        add_error(errors, field, REQUIRED);
        return false;
    }
    true
}

pub fn check_max_length(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        add_error(
            errors,
            field,
            format!("Ensure this value has at most {max} characters (it has {len})."),
        );
    }
}

pub fn check_slug(errors: &mut FieldErrors, field: &str, value: &str) {
    if check_required(errors, field, value) {
        if !is_valid_slug(value) {
            add_error(
                errors,
                field,
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }
        check_max_length(errors, field, value, MAX_LENGTH);
    }
}

pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lowercases, drops punctuation and joins words with hyphens.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for word in value
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
    {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    slug
}

/// 422 response echoing the rejected form.
pub fn rejected<T: Serialize>(form: T) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(form)).into_response()
}
