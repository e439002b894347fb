//! The application context: built once in `main`, passed by handle into
//! every handler and interceptor. Replaces process-global singletons.

/// Shared application state. `D` is the database handle; tests substitute a
/// mock.
pub struct AppState<D> {
    pub db: D,
    /// Secret mixed into session-cookie digests.
    pub secret: String,
}

impl<D> std::fmt::Debug for AppState<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppState")
    }
}
