//! The web layer of the weblog application.
//!
//! A thin routing/middleware layer over hyper: routes are explicit
//! registration records carrying a parameter [`Binding`]; per request the
//! binder assembles a keyword map from JSON, form or query input plus path
//! parameters, the handler returns an explicit [`Reply`] or [`ApiError`],
//! and the normalization step maps that onto the transport response.
//!
//! # Example
//!
//! ```no_run
//! use weblog_web::{get, handler_fn, Args, HandlerResult, Reply, Router, Server};
//!
//! async fn index(_args: Args) -> HandlerResult {
//!     Ok(Reply::html("<h1>hello</h1>"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::builder().route(get("/", handler_fn(index))).build()?;
//!     Server::builder().router(router).address("127.0.0.1:9000").build()?.serve().await?;
//!     Ok(())
//! }
//! ```

mod bind;
mod body;
mod error;
mod form;
mod handler;
mod reply;
mod request;
mod server;
mod static_files;
mod view;

pub mod interceptor;
pub mod router;

pub use bind::{bind_args, Args, Binding};
pub use body::ResponseBody;
pub use error::{ApiError, BindError, RouterBuildError, ServerBuildError, ViewError};
pub use handler::{handler_fn, ApiHandler, FnHandler, HandlerError, HandlerResult};
pub use interceptor::{AccessLog, Interceptor, Interceptors};
pub use reply::{into_response, Reply, TEMPLATE_KEY};
pub use request::{PathParams, RequestContext, SessionUser};
pub use router::{get, post, RouteEntry, Router};
pub use server::{Server, ServerBuilder};
pub use view::Views;
