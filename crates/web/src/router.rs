//! The route table: explicit registration records built once at startup.
//!
//! Every handler is registered with an explicit call carrying its method,
//! path pattern, handler and parameter [`Binding`]; the builder validates
//! the binding and inserts into one matchit tree per method. Entries are
//! immutable after `build`.

use http::Method;
use matchit::Router as PathRouter;

use crate::bind::Binding;
use crate::error::RouterBuildError;
use crate::handler::ApiHandler;
use crate::request::PathParams;

/// One registered route: `{method, path, handler, binding}`.
pub struct RouteEntry {
    method: Method,
    path: String,
    binding: Binding,
    handler: Box<dyn ApiHandler>,
}

impl RouteEntry {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn handler(&self) -> &dyn ApiHandler {
        self.handler.as_ref()
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("binding", &self.binding)
            .finish()
    }
}

/// A route under construction; produced by [`get`] / [`post`].
#[must_use]
pub struct RouteBuilder {
    method: Method,
    path: String,
    binding: Binding,
    handler: Box<dyn ApiHandler>,
}

impl RouteBuilder {
    /// Attaches the parameter classification for this handler.
    pub fn binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }
}

macro_rules! method_route {
    ($name:ident, $method:ident) => {
        pub fn $name<H: ApiHandler + 'static>(path: impl Into<String>, handler: H) -> RouteBuilder {
            RouteBuilder {
                method: Method::$method,
                path: path.into(),
                binding: Binding::new(),
                handler: Box::new(handler),
            }
        }
    };
}

method_route!(get, GET);
method_route!(post, POST);

#[derive(Debug, Default)]
pub struct RouterBuilder {
    routes: Vec<RouteBuilder>,
}

impl std::fmt::Debug for RouteBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteBuilder").field("method", &self.method).field("path", &self.path).finish()
    }
}

impl RouterBuilder {
    pub fn route(mut self, route: RouteBuilder) -> Self {
        self.routes.push(route);
        self
    }

    /// Validates every binding and builds the per-method match trees.
    pub fn build(self) -> Result<Router, RouterBuildError> {
        let mut entries = Vec::with_capacity(self.routes.len());
        let mut get_tree = PathRouter::new();
        let mut post_tree = PathRouter::new();

        for route in self.routes {
            route.binding.validate(&route.path)?;

            let index = entries.len();
            let tree = match route.method {
                Method::POST => &mut post_tree,
                _ => &mut get_tree,
            };
            tree.insert(&route.path, index)
                .map_err(|source| RouterBuildError::InvalidPath { path: route.path.clone(), source })?;

            entries.push(RouteEntry {
                method: route.method,
                path: route.path,
                binding: route.binding,
                handler: route.handler,
            });
        }

        Ok(Router { entries, get_tree, post_tree })
    }
}

/// The immutable route table, looked up per request.
pub struct Router {
    entries: Vec<RouteEntry>,
    get_tree: PathRouter<usize>,
    post_tree: PathRouter<usize>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::default()
    }

    /// Finds the entry for a method + path, with the captured path
    /// parameters.
    pub fn at(&self, method: &Method, path: &str) -> Option<(&RouteEntry, PathParams)> {
        let tree = match *method {
            Method::GET | Method::HEAD => &self.get_tree,
            Method::POST => &self.post_tree,
            _ => return None,
        };
        let matched = tree.at(path).ok()?;
        Some((&self.entries[*matched.value], PathParams::from(matched.params)))
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("entries", &self.entries).finish()
    }
}
