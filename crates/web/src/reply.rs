//! Handler return values and their normalization into HTTP responses.
//!
//! [`Reply`] is the explicit palette of things a handler can produce; the
//! [`into_response`] step maps each variant onto the transport response:
//! redirect-marked strings become 302s, JSON objects carrying `__template__`
//! render through the engine, status/message pairs become plain responses,
//! and pre-built responses (streaming included) pass through unchanged.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{Response, StatusCode};
use serde_json::{Map, Value};
use tracing::error;

use crate::body::ResponseBody;
use crate::view::Views;

/// The marker prefix turning a text reply into an HTTP redirect.
const REDIRECT_MARKER: &str = "redirect:";

/// The mapping key selecting template rendering over JSON serialization.
pub const TEMPLATE_KEY: &str = "__template__";

#[derive(Debug)]
pub enum Reply {
    /// Raw bytes, served as an octet stream.
    Raw(Bytes),
    /// HTML text, or a redirect when prefixed with `redirect:`.
    Text(String),
    /// A JSON value; objects with a `__template__` key render instead.
    Json(Value),
    /// An explicit template render.
    Template { name: String, model: Value },
    /// A bare status code.
    Status(u16),
    /// A status code with a plain-text body.
    StatusMessage(u16, String),
    /// A pre-built response passed through unchanged.
    Response(Response<ResponseBody>),
}

impl Reply {
    pub fn redirect(path: impl AsRef<str>) -> Self {
        Reply::Text(format!("{REDIRECT_MARKER}{}", path.as_ref()))
    }

    pub fn html(body: impl Into<String>) -> Self {
        Reply::Text(body.into())
    }

    pub fn template(name: impl Into<String>, model: Value) -> Self {
        Reply::Template { name: name.into(), model }
    }

    pub fn ok() -> Self {
        Reply::Status(200)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

fn status(code: u16) -> Option<StatusCode> {
    (100..600).contains(&code).then(|| StatusCode::from_u16(code).ok()).flatten()
}

fn with_content_type(content_type: &str, body: ResponseBody) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    if let Ok(value) = content_type.parse() {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}

fn plain_text(text: String) -> Response<ResponseBody> {
    with_content_type("text/plain;charset=utf-8", ResponseBody::from(text))
}

fn server_error(reason: &str) -> Response<ResponseBody> {
    let mut response = plain_text("Internal Server Error".to_string());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    error!(reason, "response normalization failed");
    response
}

fn render_template(name: &str, model: &Value, views: Option<&Views>) -> Response<ResponseBody> {
    let Some(views) = views else {
        return server_error("no template engine configured");
    };
    match views.render(name, model) {
        Ok(html) => with_content_type("text/html;charset=utf-8", ResponseBody::from(html)),
        Err(e) => server_error(&e.to_string()),
    }
}

fn json_response(value: &Value) -> Response<ResponseBody> {
    match serde_json::to_string(value) {
        Ok(body) => with_content_type("application/json;charset=utf-8", ResponseBody::from(body)),
        Err(e) => server_error(&e.to_string()),
    }
}

/// Splits the template name out of a mapping, leaving the rest as the model.
fn take_template(map: &Map<String, Value>) -> Option<(String, Value)> {
    let name = map.get(TEMPLATE_KEY)?.as_str()?.to_string();
    let model: Map<String, Value> =
        map.iter().filter(|(key, _)| *key != TEMPLATE_KEY).map(|(k, v)| (k.clone(), v.clone())).collect();
    Some((name, Value::Object(model)))
}

/// Maps a handler's reply onto the transport response.
pub fn into_response(reply: Reply, views: Option<&Views>) -> Response<ResponseBody> {
    match reply {
        Reply::Response(response) => response,

        Reply::Raw(bytes) => with_content_type("application/octet-stream", ResponseBody::once(bytes)),

        Reply::Text(text) => {
            if let Some(target) = text.strip_prefix(REDIRECT_MARKER) {
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = StatusCode::FOUND;
                if let Ok(value) = target.parse() {
                    response.headers_mut().insert(LOCATION, value);
                }
                response
            } else {
                with_content_type("text/html;charset=utf-8", ResponseBody::from(text))
            }
        }

        Reply::Json(value) => match value.as_object().and_then(take_template) {
            Some((name, model)) => render_template(&name, &model, views),
            None => json_response(&value),
        },

        Reply::Template { name, model } => render_template(&name, &model, views),

        Reply::Status(code) => match status(code) {
            Some(code) => {
                let mut response = Response::new(ResponseBody::empty());
                *response.status_mut() = code;
                response
            }
            None => plain_text(code.to_string()),
        },

        Reply::StatusMessage(code, message) => match status(code) {
            Some(code) => {
                let mut response = plain_text(message);
                *response.status_mut() = code;
                response
            }
            None => plain_text(format!("({code}, {message})")),
        },
    }
}
