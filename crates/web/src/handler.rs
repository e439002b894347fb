//! The handler contract: bound arguments in, an explicit result out.
//!
//! Handlers return `Result<Reply, HandlerError>`: the application error
//! variant becomes a structured JSON body, anything else propagates to the
//! dispatch loop's 500 path. Expected failures never travel as panics or
//! opaque errors.

use async_trait::async_trait;
use std::future::Future;

use crate::bind::Args;
use crate::error::ApiError;
use crate::reply::Reply;

/// A handler failure: either the well-known application error, or an
/// internal one destined for the outer 500 handler.
#[derive(Debug)]
pub enum HandlerError {
    Api(ApiError),
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl From<ApiError> for HandlerError {
    fn from(err: ApiError) -> Self {
        HandlerError::Api(err)
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        HandlerError::Internal(Box::new(err))
    }
}

pub type HandlerResult = Result<Reply, HandlerError>;

#[async_trait]
pub trait ApiHandler: Send + Sync {
    async fn invoke(&self, args: Args) -> HandlerResult;
}

/// Adapter turning any async `Fn(Args)` into an [`ApiHandler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps an async function as a registrable handler.
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> ApiHandler for FnHandler<F>
where
    F: Fn(Args) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn invoke(&self, args: Args) -> HandlerResult {
        (self.f)(args).await
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnHandler")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_is_handler<T: ApiHandler>(_handler: &T) {
        // no op
    }

    #[tokio::test]
    async fn async_fn_is_a_handler() {
        async fn hello(_args: Args) -> HandlerResult {
            Ok(Reply::html("hello"))
        }

        let handler = handler_fn(hello);
        assert_is_handler(&handler);

        let reply = handler.invoke(Args::new(Default::default())).await;
        assert!(reply.is_ok());
    }

    #[tokio::test]
    async fn api_errors_flow_through_the_error_variant() {
        async fn failing(_args: Args) -> HandlerResult {
            Err(ApiError::permission("nope").into())
        }

        let handler = handler_fn(failing);
        match handler.invoke(Args::new(Default::default())).await {
            Err(HandlerError::Api(err)) => assert_eq!(err.error, "permission:forbidden"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
