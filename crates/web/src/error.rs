//! Error shapes of the web layer.
//!
//! [`ApiError`] is the structured application error a handler may return:
//! an error code, the field or resource it concerns, and a human message.
//! The dispatch loop serializes it into a JSON mapping. Binding failures
//! ([`BindError`]) are a separate taxonomy and surface as plain HTTP 400
//! responses, not as the structured shape.

use serde::Serialize;
use thiserror::Error;

/// The well-known application error: `{error, data, message}`.
///
/// Deliberately not a `std::error::Error`: handlers convert every other
/// failure into [`HandlerError::Internal`](crate::handler::HandlerError)
/// through `?`, while `ApiError` stays a first-class result the dispatch
/// loop turns into a JSON body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: String,
    pub data: String,
    pub message: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, data: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: error.into(), data: data.into(), message: message.into() }
    }

    /// An invalid or missing input value; `data` names the offending field.
    pub fn value_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: "value:invalid".to_string(), data: field.into(), message: message.into() }
    }

    /// A missing resource; `data` names what was looked up.
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self { error: "value:notfound".to_string(), data: resource.into(), message: message.into() }
    }

    /// The caller lacks permission. Fixed data, optional message.
    pub fn permission(message: impl Into<String>) -> Self {
        Self { error: "permission:forbidden".to_string(), data: "permission".to_string(), message: message.into() }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.error, self.message, self.data)
    }
}

/// Argument-binding failures. Each becomes a direct 400 with the message as
/// a plain-text body.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("Missing Content-Type.")]
    MissingContentType,

    #[error("Unsupported Content-Type: {0}")]
    UnsupportedContentType(String),

    #[error("JSON body must be object.")]
    JsonNotObject,

    #[error("Malformed JSON body: {0}")]
    MalformedJson(String),

    #[error("Malformed request body.")]
    MalformedBody,

    #[error("Missing argument: {0}")]
    MissingArgument(String),
}

/// Route-table misconfiguration, raised at registration time by
/// [`Router::build`](crate::router::RouterBuilder::build) — never at request
/// time.
#[derive(Debug, Error)]
pub enum RouterBuildError {
    #[error("invalid route `{path}`: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("route `{path}` declares keyword `{name}` more than once")]
    DuplicateKeyword { path: String, name: &'static str },

    #[error("route `{path}` declares a keyword named `request`; use `with_request` instead")]
    ReservedKeyword { path: String },

    #[error("route `{path}` declares keywords after `with_request`; the raw request must come last")]
    RequestNotLast { path: String },
}

#[derive(Debug, Error)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,

    #[error("address must be set")]
    MissingAddress,

    #[error("invalid address: {0}")]
    InvalidAddress(#[from] std::io::Error),
}

/// Template loading or rendering failure; surfaces as HTTP 500.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("no template engine configured")]
    NoEngine,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_serializes_to_the_wire_shape() {
        let err = ApiError::value_invalid("email", "Invalid email.");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": "value:invalid",
                "data": "email",
                "message": "Invalid email."
            })
        );
    }

    #[test]
    fn permission_error_has_fixed_data() {
        let err = ApiError::permission("admin only");
        assert_eq!(err.error, "permission:forbidden");
        assert_eq!(err.data, "permission");
    }

    #[test]
    fn bind_error_messages_name_the_problem() {
        assert_eq!(BindError::MissingArgument("email".to_string()).to_string(), "Missing argument: email");
        assert_eq!(
            BindError::UnsupportedContentType("text/csv".to_string()).to_string(),
            "Unsupported Content-Type: text/csv"
        );
    }
}
