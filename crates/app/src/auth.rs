//! Session resolution and the administrative gate.
//!
//! Runs before dispatch on every request: a valid session cookie resolves to
//! a [`SessionUser`] stored on the context; requests under `/manage/`
//! without an admin user short-circuit to the sign-in page. Anonymous
//! requests continue to the handler explicitly — a missing cookie is not an
//! error and never drops the request.

use std::sync::Arc;

use async_trait::async_trait;
use http::Response;
use tracing::{debug, info, warn};
use weblog_orm::{find_by_id, Database};
use weblog_web::{into_response, Interceptor, Reply, RequestContext, ResponseBody, SessionUser};

use crate::models::User;
use crate::session;
use crate::state::AppState;

const ADMIN_PREFIX: &str = "/manage/";

pub struct AuthInterceptor<D> {
    state: Arc<AppState<D>>,
}

impl<D> AuthInterceptor<D> {
    pub fn new(state: Arc<AppState<D>>) -> Self {
        Self { state }
    }
}

impl<D: Database> AuthInterceptor<D> {
    async fn resolve(&self, cookie: &str) -> Option<SessionUser> {
        let (user_id, expires, digest) = session::split_cookie(cookie)?;
        if expires < session::now_secs() {
            debug!(user_id, "session cookie expired");
            return None;
        }

        let user: User = match find_by_id(&self.state.db, user_id).await {
            Ok(found) => found?,
            Err(e) => {
                warn!(cause = %e, "session user lookup failed");
                return None;
            }
        };

        if !session::digest_matches(user_id, &user.passwd(), expires, &self.state.secret, digest) {
            warn!(user_id, "session cookie digest mismatch");
            return None;
        }

        Some(SessionUser {
            id: user_id.to_string(),
            name: user.name(),
            email: user.email(),
            admin: user.is_admin(),
            image: user.image(),
        })
    }
}

#[async_trait]
impl<D: Database + 'static> Interceptor for AuthInterceptor<D> {
    async fn on_request(&self, ctx: &mut RequestContext) -> Option<Response<ResponseBody>> {
        if let Some(cookie) = ctx.cookie(session::COOKIE_NAME).map(str::to_string) {
            if let Some(user) = self.resolve(&cookie).await {
                info!(email = %user.email, "session user resolved");
                ctx.set_user(user);
            }
        }

        let is_admin = ctx.user().map(|user| user.admin).unwrap_or(false);
        if ctx.path().starts_with(ADMIN_PREFIX) && !is_admin {
            return Some(into_response(Reply::redirect("/signin"), None));
        }

        None
    }
}

impl<D> std::fmt::Debug for AuthInterceptor<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthInterceptor")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{COOKIE, LOCATION};
    use http::{Method, Request, StatusCode};
    use serde_json::json;
    use weblog_orm::{MockDatabase, Row};

    fn user_row(id: &str, passwd: &str, admin: bool) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(id));
        row.insert("email".to_string(), json!("a@b.c"));
        row.insert("passwd".to_string(), json!(passwd));
        row.insert("admin".to_string(), json!(admin));
        row.insert("name".to_string(), json!("Admin"));
        row.insert("image".to_string(), json!("about:blank"));
        row.insert("created_at".to_string(), json!(1.0));
        row
    }

    fn ctx(path: &str, cookie: Option<&str>) -> RequestContext {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(value) = cookie {
            builder = builder.header(COOKIE, format!("{}={}", session::COOKIE_NAME, value));
        }
        let (head, ()) = builder.body(()).unwrap().into_parts();
        RequestContext::new(head)
    }

    fn interceptor(db: MockDatabase) -> AuthInterceptor<MockDatabase> {
        AuthInterceptor::new(Arc::new(AppState { db, secret: "s3cret".to_string() }))
    }

    fn signed_cookie(id: &str, passwd: &str) -> String {
        let expires = session::now_secs() + session::COOKIE_MAX_AGE;
        session::sign_cookie(id, passwd, expires, "s3cret")
    }

    #[tokio::test]
    async fn anonymous_request_continues() {
        let auth = interceptor(MockDatabase::new());
        let mut context = ctx("/", None);
        assert!(auth.on_request(&mut context).await.is_none());
        assert!(context.user().is_none());
    }

    #[tokio::test]
    async fn valid_cookie_resolves_the_user() {
        let passwd = session::password_digest("u1", "pw");
        let row = user_row("u1", &passwd, false);
        let mut db = MockDatabase::new();
        db.expect_fetch_optional().returning(move |_, _, _| Ok(Some(row.clone())));

        let auth = interceptor(db);
        let mut context = ctx("/", Some(&signed_cookie("u1", &passwd)));
        assert!(auth.on_request(&mut context).await.is_none());
        assert_eq!(context.user().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn admin_path_without_user_redirects_to_signin() {
        let auth = interceptor(MockDatabase::new());
        let mut context = ctx("/manage/blogs", None);
        let response = auth.on_request(&mut context).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/signin");
    }

    #[tokio::test]
    async fn admin_path_with_non_admin_user_redirects() {
        let passwd = session::password_digest("u1", "pw");
        let row = user_row("u1", &passwd, false);
        let mut db = MockDatabase::new();
        db.expect_fetch_optional().returning(move |_, _, _| Ok(Some(row.clone())));

        let auth = interceptor(db);
        let mut context = ctx("/manage/blogs", Some(&signed_cookie("u1", &passwd)));
        let response = auth.on_request(&mut context).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
    }

    #[tokio::test]
    async fn admin_path_with_admin_user_continues() {
        let passwd = session::password_digest("u1", "pw");
        let row = user_row("u1", &passwd, true);
        let mut db = MockDatabase::new();
        db.expect_fetch_optional().returning(move |_, _, _| Ok(Some(row.clone())));

        let auth = interceptor(db);
        let mut context = ctx("/manage/blogs", Some(&signed_cookie("u1", &passwd)));
        assert!(auth.on_request(&mut context).await.is_none());
        assert!(context.user().unwrap().admin);
    }

    #[tokio::test]
    async fn tampered_cookie_stays_anonymous() {
        let passwd = session::password_digest("u1", "pw");
        let row = user_row("u1", &passwd, true);
        let mut db = MockDatabase::new();
        db.expect_fetch_optional().returning(move |_, _, _| Ok(Some(row.clone())));

        let auth = interceptor(db);
        let expires = session::now_secs() + 60;
        let forged = format!("u1-{expires}-deadbeef");
        let mut context = ctx("/", Some(&forged));
        assert!(auth.on_request(&mut context).await.is_none());
        assert!(context.user().is_none());
    }

    #[tokio::test]
    async fn expired_cookie_stays_anonymous() {
        let passwd = session::password_digest("u1", "pw");
        let auth = interceptor(MockDatabase::new());
        let cookie = session::sign_cookie("u1", &passwd, 10, "s3cret");
        let mut context = ctx("/", Some(&cookie));
        assert!(auth.on_request(&mut context).await.is_none());
        assert!(context.user().is_none());
    }
}
