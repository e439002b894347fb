//! The HTTP server: accept loop, dispatch pipeline and graceful shutdown.
//!
//! Connection handling is delegated to hyper; this module owns the request
//! pipeline: interceptors, static assets, route lookup, argument binding,
//! handler invocation, error translation and response normalization.

use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;

use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::bind::{bind_args, Args};
use crate::body::ResponseBody;
use crate::error::{BindError, ServerBuildError};
use crate::handler::{ApiHandler, HandlerError, HandlerResult};
use crate::interceptor::Interceptors;
use crate::reply::{self, Reply};
use crate::request::RequestContext;
use crate::router::Router;
use crate::static_files;
use crate::view::Views;

pub struct ServerBuilder {
    router: Option<Router>,
    address: Option<std::io::Result<Vec<SocketAddr>>>,
    interceptors: Interceptors,
    views: Option<Views>,
    static_dir: Option<PathBuf>,
    default_handler: Option<Box<dyn ApiHandler>>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self {
            router: None,
            address: None,
            interceptors: Interceptors::builder().build(),
            views: None,
            static_dir: None,
            default_handler: None,
        }
    }

    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        self.address = Some(address.to_socket_addrs().map(|addrs| addrs.collect()));
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn interceptors(mut self, interceptors: Interceptors) -> Self {
        self.interceptors = interceptors;
        self
    }

    /// The template engine used for rendered replies.
    pub fn views(mut self, views: Views) -> Self {
        self.views = Some(views);
        self
    }

    /// Serve files below this directory under `/static/`.
    pub fn static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    /// Invoked when no route matches; a plain 404 otherwise.
    pub fn default_handler(mut self, handler: impl ApiHandler + 'static) -> Self {
        self.default_handler = Some(Box::new(handler));
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)??;
        Ok(Server {
            address,
            app: Arc::new(App {
                router,
                interceptors: self.interceptors,
                views: self.views,
                static_dir: self.static_dir,
                default_handler: self.default_handler,
            }),
        })
    }
}

pub struct Server {
    address: Vec<SocketAddr>,
    app: Arc<App>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server").field("address", &self.address).finish()
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("has_router", &self.router.is_some()).finish()
    }
}

/// Everything dispatch needs, shared across connection tasks.
pub(crate) struct App {
    router: Router,
    interceptors: Interceptors,
    views: Option<Views>,
    static_dir: Option<PathBuf>,
    default_handler: Option<Box<dyn ApiHandler>>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Accepts connections until SIGINT/SIGTERM, then stops accepting and
    /// waits for in-flight connections to finish.
    pub async fn serve(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.address.as_slice()).await?;
        info!(addr = ?self.address, "start listening");

        let app = self.app;
        let mut tasks = JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                accepted = listener.accept() => {
                    let (stream, remote_addr) = match accepted {
                        Ok(stream_and_addr) => stream_and_addr,
                        Err(e) => {
                            warn!(cause = %e, "failed to accept");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    tasks.spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { Ok::<_, Infallible>(app.dispatch(req).await) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new()).serve_connection(io, service).await {
                            debug!(peer = %remote_addr, cause = %e, "connection shutdown");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}
        info!("server stopped");
        Ok(())
    }
}

impl App {
    pub(crate) async fn dispatch<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: http_body::Body,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = req.into_parts();
        let mut ctx = RequestContext::new(parts);

        if let Some(mut response) = self.interceptors.on_request(&mut ctx).await {
            self.interceptors.on_response(&ctx, &mut response).await;
            return response;
        }

        if let Some(dir) = &self.static_dir {
            if let Some(rest) = ctx.path().strip_prefix("/static/") {
                let rest = rest.to_string();
                let mut response = static_files::serve(dir, &rest).await;
                self.interceptors.on_response(&ctx, &mut response).await;
                return response;
            }
        }

        let Some((entry, params)) = self.router.at(ctx.method(), ctx.path()) else {
            let mut response = match &self.default_handler {
                Some(handler) => self.finish(handler.invoke(Args::new(Default::default())).await),
                None => {
                    let mut response = Response::new(ResponseBody::from("404 Not Found"));
                    *response.status_mut() = StatusCode::NOT_FOUND;
                    response
                }
            };
            self.interceptors.on_response(&ctx, &mut response).await;
            return response;
        };
        ctx.set_params(params);

        // the body is read only when the binding can consume keyword input
        let body_bytes = if entry.binding().has_keywords() && ctx.method() == Method::POST {
            match body.collect().await {
                Ok(collected) => Some(collected.to_bytes()),
                Err(e) => {
                    warn!(cause = %e, "failed to read request body");
                    let mut response = bad_request(BindError::MalformedBody.to_string());
                    self.interceptors.on_response(&ctx, &mut response).await;
                    return response;
                }
            }
        } else {
            None
        };

        let ctx = Arc::new(ctx);
        let mut response = match bind_args(entry.binding(), &ctx, body_bytes) {
            Ok(args) => self.finish(entry.handler().invoke(args).await),
            Err(e) => bad_request(e.to_string()),
        };
        self.interceptors.on_response(&ctx, &mut response).await;
        response
    }

    /// Translates the handler outcome: replies normalize, application errors
    /// become their JSON mapping, internal failures become a logged 500.
    fn finish(&self, result: HandlerResult) -> Response<ResponseBody> {
        match result {
            Ok(r) => reply::into_response(r, self.views.as_ref()),
            Err(HandlerError::Api(e)) => {
                let mapping = json!({ "error": e.error, "data": e.data, "message": e.message });
                reply::into_response(Reply::Json(mapping), self.views.as_ref())
            }
            Err(HandlerError::Internal(e)) => {
                error!(cause = %e, "handler failed");
                let mut response = Response::new(ResponseBody::from("Internal Server Error"));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            }
        }
    }
}

fn bad_request(message: String) -> Response<ResponseBody> {
    let mut response = Response::new(ResponseBody::from(message));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    if let Ok(value) = "text/plain;charset=utf-8".parse() {
        response.headers_mut().insert(http::header::CONTENT_TYPE, value);
    }
    response
}

/// Resolves on the first SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::Binding;
    use crate::error::ApiError;
    use crate::handler::handler_fn;
    use crate::router::{get, post};
    use bytes::Bytes;
    use http_body_util::Full;

    async fn hello(_args: Args) -> HandlerResult {
        Ok(Reply::html("hello"))
    }

    async fn create(args: Args) -> HandlerResult {
        if args.string("name").is_empty() {
            return Err(ApiError::value_invalid("name", "name cannot be empty").into());
        }
        Ok(Reply::Json(json!({"name": args.string("name")})))
    }

    async fn broken(_args: Args) -> HandlerResult {
        Err(std::io::Error::other("boom").into())
    }

    fn app() -> App {
        let router = Router::builder()
            .route(get("/", handler_fn(hello)))
            .route(post("/api/things", handler_fn(create)).binding(Binding::new().required("name")))
            .route(get("/broken", handler_fn(broken)))
            .build()
            .unwrap();
        App {
            router,
            interceptors: Interceptors::builder().build(),
            views: None,
            static_dir: None,
            default_handler: None,
        }
    }

    fn request(method: Method, uri: &str, content_type: Option<&str>, body: &str) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(http::header::CONTENT_TYPE, ct);
        }
        builder.body(Full::new(Bytes::from(body.to_string()))).unwrap()
    }

    async fn body_string(response: Response<ResponseBody>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn routes_dispatch() {
        let app = app();
        let response = app.dispatch(request(Method::GET, "/", None, "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "hello");
    }

    #[tokio::test]
    async fn unmatched_path_is_404() {
        let app = app();
        let response = app.dispatch(request(Method::GET, "/missing", None, "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn binding_failure_is_a_plain_400() {
        let app = app();
        let response = app
            .dispatch(request(Method::POST, "/api/things", Some("application/json"), "{}"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Missing argument: name");
    }

    #[tokio::test]
    async fn api_error_becomes_structured_json() {
        let app = app();
        let response = app
            .dispatch(request(Method::POST, "/api/things", Some("application/json"), r#"{"name": ""}"#))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "value:invalid");
        assert_eq!(body["data"], "name");
    }

    #[tokio::test]
    async fn successful_post_binds_and_replies_json() {
        let app = app();
        let response = app
            .dispatch(request(Method::POST, "/api/things", Some("application/json"), r#"{"name": "x"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["name"], "x");
    }

    #[tokio::test]
    async fn internal_error_is_500() {
        let app = app();
        let response = app.dispatch(request(Method::GET, "/broken", None, "")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn missing_router_fails_build() {
        let result = Server::builder().address("127.0.0.1:0").build();
        assert!(matches!(result, Err(ServerBuildError::MissingRouter)));
    }
}
