//! The ordered interceptor chain wrapping every request/response pair.
//!
//! `on_request` may short-circuit dispatch by returning a response (the auth
//! interceptor redirects unauthorized `/manage/` requests this way);
//! returning `None` always means "continue to the handler" — there is no
//! silent drop path. `on_response` observes and may mutate the final
//! response.

use async_trait::async_trait;
use http::Response;
use tracing::info;

use crate::body::ResponseBody;
use crate::request::RequestContext;

#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Runs before dispatch. `Some(response)` short-circuits the request;
    /// `None` continues to the next interceptor and then the handler.
    async fn on_request(&self, _ctx: &mut RequestContext) -> Option<Response<ResponseBody>> {
        None
    }

    /// Runs after the response is built, in chain order.
    async fn on_response(&self, _ctx: &RequestContext, _response: &mut Response<ResponseBody>) {}
}

/// The composed chain, built once at startup.
pub struct Interceptors {
    inner: Vec<Box<dyn Interceptor>>,
}

impl Interceptors {
    pub fn builder() -> InterceptorsBuilder {
        InterceptorsBuilder::new()
    }

    pub async fn on_request(&self, ctx: &mut RequestContext) -> Option<Response<ResponseBody>> {
        for interceptor in &self.inner {
            if let Some(response) = interceptor.on_request(ctx).await {
                return Some(response);
            }
        }
        None
    }

    pub async fn on_response(&self, ctx: &RequestContext, response: &mut Response<ResponseBody>) {
        for interceptor in &self.inner {
            interceptor.on_response(ctx, response).await;
        }
    }
}

impl std::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptors").field("len", &self.inner.len()).finish()
    }
}

pub struct InterceptorsBuilder {
    inner: Vec<Box<dyn Interceptor>>,
}

impl std::fmt::Debug for InterceptorsBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorsBuilder").field("len", &self.inner.len()).finish()
    }
}

impl InterceptorsBuilder {
    fn new() -> Self {
        Self { inner: Vec::new() }
    }

    pub fn add_last<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.push(Box::new(interceptor));
        self
    }

    pub fn add_first<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.inner.insert(0, Box::new(interceptor));
        self
    }

    pub fn build(self) -> Interceptors {
        Interceptors { inner: self.inner }
    }
}

/// Request/response logging, first in the default chain.
#[derive(Debug, Default)]
pub struct AccessLog;

#[async_trait]
impl Interceptor for AccessLog {
    async fn on_request(&self, ctx: &mut RequestContext) -> Option<Response<ResponseBody>> {
        info!(method = %ctx.method(), path = ctx.path(), "request");
        None
    }

    async fn on_response(&self, ctx: &RequestContext, response: &mut Response<ResponseBody>) {
        info!(status = %response.status(), path = ctx.path(), "response");
    }
}
