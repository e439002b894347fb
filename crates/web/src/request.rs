//! Request-scoped state handed to interceptors, the binder and handlers.
//!
//! [`RequestContext`] owns the request head and the path parameters captured
//! by the router match. The session user resolved by the auth interceptor
//! rides along for the rest of the request; it is never persisted.

use http::header::COOKIE;
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};
use serde::Serialize;

/// The identity resolved from the session cookie, or absent for anonymous
/// requests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub admin: bool,
    pub image: String,
}

/// Named path segments captured from the matched route, e.g. `id` in
/// `/blog/{id}`. Owned so the context can outlive the router borrow.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    items: Vec<(String, String)>,
}

impl PathParams {
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.items.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl<'k, 'v> From<matchit::Params<'k, 'v>> for PathParams {
    fn from(params: matchit::Params<'k, 'v>) -> Self {
        Self { items: params.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect() }
    }
}

/// Everything about one request except its body: the head, the matched path
/// parameters and the resolved session user.
#[derive(Debug)]
pub struct RequestContext {
    head: Parts,
    params: PathParams,
    user: Option<SessionUser>,
}

impl RequestContext {
    pub fn new(head: Parts) -> Self {
        Self { head, params: PathParams::empty(), user: None }
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn path(&self) -> &str {
        self.head.uri.path()
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: SessionUser) {
        self.user = Some(user);
    }

    /// The value of one cookie, searching every `Cookie` header. First match
    /// wins.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.head.headers.get_all(COOKIE).iter().find_map(|header| {
            let raw = header.to_str().ok()?;
            raw.split(';').map(str::trim).find_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                (key == name).then_some(value)
            })
        })
    }
}
