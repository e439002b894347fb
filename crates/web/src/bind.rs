//! Argument binding: from request payloads to a handler's keyword map.
//!
//! Each route declares a [`Binding`] describing which keywords its handler
//! accepts. The classification happens once, at registration; per request
//! the binder assembles a JSON keyword map from the body, query string and
//! path parameters, checks it against the declaration, and hands the result
//! to the handler as [`Args`].

use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::Method;
use mime::Mime;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{BindError, RouterBuildError};
use crate::form;
use crate::request::{RequestContext, SessionUser};

#[derive(Debug, Clone)]
struct Keyword {
    name: &'static str,
    default: Option<Value>,
}

/// Parameter classification for one handler, declared at registration time
/// and immutable afterwards.
#[derive(Debug, Clone, Default)]
pub struct Binding {
    keywords: Vec<Keyword>,
    catch_all: bool,
    wants_request: bool,
    // keyword count at the moment with_request was declared
    request_position: Option<usize>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    /// A keyword the handler requires; binding fails with a 400 when absent.
    pub fn required(mut self, name: &'static str) -> Self {
        self.keywords.push(Keyword { name, default: None });
        self
    }

    /// A keyword with a fallback value used when the request omits it.
    pub fn optional(mut self, name: &'static str, default: impl Into<Value>) -> Self {
        self.keywords.push(Keyword { name, default: Some(default.into()) });
        self
    }

    /// Accept arbitrary body/query keys instead of discarding undeclared ones.
    pub fn catch_all(mut self) -> Self {
        self.catch_all = true;
        self
    }

    /// Hand the handler the raw request context. Must be the final
    /// declaration on the binding.
    pub fn with_request(mut self) -> Self {
        self.wants_request = true;
        self.request_position = Some(self.keywords.len());
        self
    }

    /// True when the handler accepts keyword input at all; when false, body
    /// and query extraction are skipped entirely.
    pub fn has_keywords(&self) -> bool {
        !self.keywords.is_empty() || self.catch_all
    }

    pub fn wants_request(&self) -> bool {
        self.wants_request
    }

    fn is_declared(&self, name: &str) -> bool {
        self.keywords.iter().any(|keyword| keyword.name == name)
    }

    /// Registration-time validation; the route path is only for the error
    /// message.
    pub(crate) fn validate(&self, path: &str) -> Result<(), RouterBuildError> {
        for (index, keyword) in self.keywords.iter().enumerate() {
            if keyword.name == "request" {
                return Err(RouterBuildError::ReservedKeyword { path: path.to_string() });
            }
            if self.keywords[..index].iter().any(|other| other.name == keyword.name) {
                return Err(RouterBuildError::DuplicateKeyword { path: path.to_string(), name: keyword.name });
            }
        }
        if let Some(position) = self.request_position {
            if position != self.keywords.len() {
                return Err(RouterBuildError::RequestNotLast { path: path.to_string() });
            }
        }
        Ok(())
    }
}

/// What a handler receives: the assembled keyword map, and the request
/// context when the binding asked for it.
#[derive(Debug, Clone)]
pub struct Args {
    values: Map<String, Value>,
    ctx: Option<Arc<RequestContext>>,
}

impl Args {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values, ctx: None }
    }

    pub fn with_request(values: Map<String, Value>, ctx: Arc<RequestContext>) -> Self {
        Self { values, ctx: Some(ctx) }
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// String coercion: JSON strings verbatim, other values through their
    /// JSON rendering, absent or null as empty.
    pub fn string(&self, name: &str) -> String {
        match self.values.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Boolean coercion covering JSON booleans and the form-checkbox strings
    /// `true` and `on`.
    pub fn flag(&self, name: &str) -> bool {
        match self.values.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true" || s == "on",
            _ => false,
        }
    }

    /// The raw request, present only when the binding declared
    /// `with_request`.
    pub fn request(&self) -> Option<&RequestContext> {
        self.ctx.as_deref()
    }

    /// The session user from the request context, when both are present.
    pub fn user(&self) -> Option<&SessionUser> {
        self.ctx.as_ref().and_then(|ctx| ctx.user())
    }
}

/// Assembles the keyword map for one request.
///
/// `body` is the collected request body for POST requests whose binding
/// accepts keywords; callers skip collection otherwise.
pub fn bind_args(binding: &Binding, ctx: &Arc<RequestContext>, body: Option<Bytes>) -> Result<Args, BindError> {
    let mut extracted: Option<Map<String, Value>> = None;

    if binding.has_keywords() {
        if ctx.method() == Method::POST {
            extracted = Some(parse_post_body(ctx, body.unwrap_or_default())?);
        } else if ctx.method() == Method::GET {
            if let Some(query) = ctx.uri().query().filter(|q| !q.is_empty()) {
                extracted = Some(form::parse_urlencoded(query.as_bytes()));
            }
        }
    }

    let mut values = match extracted {
        // no usable payload: path parameters only
        None => {
            let mut values = Map::new();
            for (name, value) in ctx.params().iter() {
                values.insert(name.to_string(), Value::String(value.to_string()));
            }
            values
        }
        Some(mut extracted) => {
            if !binding.catch_all && !binding.keywords.is_empty() {
                extracted.retain(|name, _| binding.is_declared(name));
            }
            for (name, value) in ctx.params().iter() {
                if extracted.contains_key(name) {
                    warn!(name, path = ctx.path(), "path parameter collides with payload key");
                }
                extracted.insert(name.to_string(), Value::String(value.to_string()));
            }
            extracted
        }
    };

    for keyword in &binding.keywords {
        if let Some(default) = &keyword.default {
            if !values.contains_key(keyword.name) {
                values.insert(keyword.name.to_string(), default.clone());
            }
        }
    }

    for keyword in &binding.keywords {
        if keyword.default.is_none() && !values.contains_key(keyword.name) {
            return Err(BindError::MissingArgument(keyword.name.to_string()));
        }
    }

    let ctx = binding.wants_request.then(|| Arc::clone(ctx));
    Ok(Args { values, ctx })
}

fn parse_post_body(ctx: &RequestContext, body: Bytes) -> Result<Map<String, Value>, BindError> {
    let content_type = ctx.headers().get(CONTENT_TYPE).ok_or(BindError::MissingContentType)?;
    let raw = content_type.to_str().map_err(|_| BindError::MissingContentType)?;
    let mime: Mime = raw.parse().map_err(|_| BindError::UnsupportedContentType(raw.to_string()))?;

    if mime.type_() == mime::APPLICATION && mime.subtype() == mime::JSON {
        let parsed: Value =
            serde_json::from_slice(&body).map_err(|e| BindError::MalformedJson(e.to_string()))?;
        match parsed {
            Value::Object(map) => Ok(map),
            _ => Err(BindError::JsonNotObject),
        }
    } else if mime.type_() == mime::APPLICATION && mime.subtype() == mime::WWW_FORM_URLENCODED {
        Ok(form::parse_urlencoded(&body))
    } else if mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA {
        let boundary = form::multipart_boundary(&mime).ok_or(BindError::MalformedBody)?;
        Ok(form::parse_multipart_fields(&body, &boundary))
    } else {
        Err(BindError::UnsupportedContentType(mime.essence_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PathParams;
    use http::Request;
    use serde_json::json;

    fn ctx(method: Method, uri: &str, content_type: Option<&str>) -> Arc<RequestContext> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let (head, ()) = builder.body(()).unwrap().into_parts();
        Arc::new(RequestContext::new(head))
    }

    fn with_id_param(method: Method, uri: &str, id: &str, content_type: Option<&str>) -> Arc<RequestContext> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        let (head, ()) = builder.body(()).unwrap().into_parts();
        let mut context = RequestContext::new(head);
        let mut router = matchit::Router::new();
        router.insert("/x/{id}", ()).unwrap();
        context.set_params(PathParams::from(router.at(&format!("/x/{id}")).unwrap().params));
        Arc::new(context)
    }

    #[test]
    fn required_present_and_optional_defaulted() {
        let binding = Binding::new().required("a").optional("b", "x");
        let context = ctx(Method::POST, "/", Some("application/json"));
        let args = bind_args(&binding, &context, Some(Bytes::from(r#"{"a": 1}"#))).unwrap();
        assert_eq!(args.value("a"), Some(&json!(1)));
        assert_eq!(args.string("b"), "x");
    }

    #[test]
    fn missing_required_names_the_argument() {
        let binding = Binding::new().required("a").optional("b", "x");
        let context = ctx(Method::POST, "/", Some("application/json"));
        let err = bind_args(&binding, &context, Some(Bytes::from("{}"))).unwrap_err();
        assert!(matches!(err, BindError::MissingArgument(name) if name == "a"));
    }

    #[test]
    fn no_keyword_binding_ignores_body_and_query() {
        let binding = Binding::new();
        let context = with_id_param(Method::GET, "/x/42?spurious=1", "42", None);
        let args = bind_args(&binding, &context, None).unwrap();
        assert_eq!(args.value("spurious"), None);
        assert_eq!(args.string("id"), "42");
    }

    #[test]
    fn post_without_content_type_is_rejected() {
        let binding = Binding::new().required("a");
        let context = ctx(Method::POST, "/", None);
        let err = bind_args(&binding, &context, Some(Bytes::from("{}"))).unwrap_err();
        assert!(matches!(err, BindError::MissingContentType));
    }

    #[test]
    fn post_with_unsupported_content_type_is_rejected() {
        let binding = Binding::new().required("a");
        let context = ctx(Method::POST, "/", Some("text/csv"));
        let err = bind_args(&binding, &context, Some(Bytes::from("a,b"))).unwrap_err();
        assert!(matches!(err, BindError::UnsupportedContentType(ct) if ct == "text/csv"));
    }

    #[test]
    fn non_object_json_is_rejected() {
        let binding = Binding::new().required("a");
        let context = ctx(Method::POST, "/", Some("application/json"));
        let err = bind_args(&binding, &context, Some(Bytes::from("[1, 2]"))).unwrap_err();
        assert!(matches!(err, BindError::JsonNotObject));
    }

    #[test]
    fn form_encoded_body_binds() {
        let binding = Binding::new().required("email").required("passwd");
        let context = ctx(Method::POST, "/", Some("application/x-www-form-urlencoded"));
        let args =
            bind_args(&binding, &context, Some(Bytes::from("email=a%40b.c&passwd=secret"))).unwrap();
        assert_eq!(args.string("email"), "a@b.c");
        assert_eq!(args.string("passwd"), "secret");
    }

    #[test]
    fn get_query_first_value_wins() {
        let binding = Binding::new().optional("page", "1");
        let context = ctx(Method::GET, "/?page=3&page=9", None);
        let args = bind_args(&binding, &context, None).unwrap();
        assert_eq!(args.string("page"), "3");
    }

    #[test]
    fn undeclared_keys_are_discarded_without_catch_all() {
        let binding = Binding::new().required("name");
        let context = ctx(Method::POST, "/", Some("application/json"));
        let args =
            bind_args(&binding, &context, Some(Bytes::from(r#"{"name": "n", "extra": true}"#))).unwrap();
        assert_eq!(args.value("extra"), None);
    }

    #[test]
    fn catch_all_retains_undeclared_keys() {
        let binding = Binding::new().catch_all();
        let context = ctx(Method::POST, "/", Some("application/json"));
        let args =
            bind_args(&binding, &context, Some(Bytes::from(r#"{"anything": [1, 2]}"#))).unwrap();
        assert_eq!(args.value("anything"), Some(&json!([1, 2])));
    }

    #[test]
    fn path_parameters_overlay_payload_keys() {
        let binding = Binding::new().required("id").catch_all();
        let context = with_id_param(Method::POST, "/x/42", "42", Some("application/json"));
        // the payload also carries "id"; the path value wins
        let args = bind_args(&binding, &context, Some(Bytes::from(r#"{"id": "payload"}"#))).unwrap();
        assert_eq!(args.string("id"), "42");
    }

    #[test]
    fn request_injection_follows_the_binding() {
        let binding = Binding::new().with_request();
        let context = ctx(Method::GET, "/", None);
        let args = bind_args(&binding, &context, None).unwrap();
        assert!(args.request().is_some());

        let binding = Binding::new().required("a").optional("a2", "");
        let context = ctx(Method::POST, "/", Some("application/json"));
        let args = bind_args(&binding, &context, Some(Bytes::from(r#"{"a": 1}"#))).unwrap();
        assert!(args.request().is_none());
    }

    #[test]
    fn binding_validation_rejects_duplicates_and_reserved_names() {
        let dup = Binding::new().required("a").optional("a", "");
        assert!(matches!(
            dup.validate("/p"),
            Err(RouterBuildError::DuplicateKeyword { name: "a", .. })
        ));

        let reserved = Binding::new().required("request");
        assert!(matches!(reserved.validate("/p"), Err(RouterBuildError::ReservedKeyword { .. })));

        let fine = Binding::new().required("a").optional("b", "1").with_request();
        assert!(fine.validate("/p").is_ok());
    }

    #[test]
    fn request_declared_before_keywords_is_a_configuration_error() {
        let out_of_order = Binding::new().with_request().required("a");
        assert!(matches!(out_of_order.validate("/p"), Err(RouterBuildError::RequestNotLast { .. })));
    }
}
