//! Page and API handlers, and the route table wiring them up.
//!
//! Pages render templates; APIs speak JSON. Validation failures surface as
//! structured application errors with the offending field name; missing
//! resources and permission failures likewise. Database failures propagate
//! to the dispatch loop's 500 path.

use std::sync::Arc;

use http::header::{REFERER, SET_COOKIE};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::info;
use weblog_orm::{count, find_by_id, find_where, next_id, remove, save, update, Database, Entity};
use weblog_web::{
    get, handler_fn, into_response, ApiError, Args, Binding, HandlerError, HandlerResult, Reply, Router,
    RouterBuildError, SessionUser,
};

use crate::models::{Blog, Comment, User};
use crate::page::{self, Page};
use crate::session;
use crate::state::AppState;

static RE_EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9.\-_]+@[a-z0-9\-_]+(\.[a-z0-9\-_]+){1,4}$").expect("email regex"));

const MIN_PASSWD_LEN: usize = 6;

fn entity_json<E: Entity>(entity: &E) -> Value {
    Value::Object(entity.row().clone())
}

/// A user as exposed over the wire: the password digest is blanked.
fn user_json(user: &User) -> Value {
    let mut row = user.row().clone();
    row.insert("passwd".to_string(), json!("******"));
    Value::Object(row)
}

fn check_signed_in(args: &Args) -> Result<SessionUser, HandlerError> {
    args.user().cloned().ok_or_else(|| ApiError::permission("please sign in first").into())
}

fn check_admin(args: &Args) -> Result<SessionUser, HandlerError> {
    let user = check_signed_in(args)?;
    if !user.admin {
        return Err(ApiError::permission("admin only").into());
    }
    Ok(user)
}

fn non_empty(args: &Args, field: &str) -> Result<String, HandlerError> {
    let value = args.string(field);
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::value_invalid(field, format!("{field} cannot be empty")).into());
    }
    Ok(trimmed.to_string())
}

fn session_cookie(user_id: &str, passwd_digest: &str, secret: &str) -> String {
    let expires = session::now_secs() + session::COOKIE_MAX_AGE;
    let signed = session::sign_cookie(user_id, passwd_digest, expires, secret);
    format!(
        "{}={signed}; Path=/; Max-Age={}; HttpOnly",
        session::COOKIE_NAME,
        session::COOKIE_MAX_AGE
    )
}

/// A JSON reply carrying a session cookie.
fn json_with_cookie(body: Value, cookie: String) -> HandlerResult {
    let mut response = into_response(Reply::Json(body), None);
    response.headers_mut().append(SET_COOKIE, cookie.parse()?);
    Ok(Reply::Response(response))
}

// ---- pages -----------------------------------------------------------------

pub async fn index<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let total = count::<Blog, _>(&state.db, "", Vec::new()).await?;
    let page = Page::new(total, page::page_index(&args));
    let blogs: Vec<Blog> = if total == 0 {
        Vec::new()
    } else {
        find_where(&state.db, "", Vec::new(), Some("`created_at` DESC"), Some((page.offset, page.limit)))
            .await?
    };

    Ok(Reply::template(
        "blogs.html",
        json!({
            "page": page,
            "blogs": blogs.iter().map(entity_json).collect::<Vec<_>>(),
            "user": args.user(),
        }),
    ))
}

pub async fn blog_detail<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let id = args.string("id");
    let blog: Blog = find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("blog", "blog not found"))?;
    let comments: Vec<Comment> =
        find_where(&state.db, "`blog_id` = ?", vec![json!(id)], Some("`created_at` DESC"), None).await?;

    Ok(Reply::template(
        "blog.html",
        json!({
            "blog": entity_json(&blog),
            "comments": comments.iter().map(entity_json).collect::<Vec<_>>(),
            "user": args.user(),
        }),
    ))
}

pub async fn register_page<D: Database>(_state: Arc<AppState<D>>, _args: Args) -> HandlerResult {
    Ok(Reply::template("register.html", json!({})))
}

pub async fn signin_page<D: Database>(_state: Arc<AppState<D>>, _args: Args) -> HandlerResult {
    Ok(Reply::template("signin.html", json!({})))
}

/// Clears the session cookie and bounces back to where the user came from.
pub async fn signout<D: Database>(_state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let referer = args
        .request()
        .and_then(|req| req.headers().get(REFERER))
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("/")
        .to_string();

    let mut response = into_response(Reply::redirect(referer), None);
    let cleared = format!("{}=deleted; Path=/; Max-Age=0", session::COOKIE_NAME);
    response.headers_mut().append(SET_COOKIE, cleared.parse()?);
    info!("user signed out");
    Ok(Reply::Response(response))
}

pub async fn manage_blogs<D: Database>(_state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    Ok(Reply::template(
        "manage_blogs.html",
        json!({ "page_index": page::page_index(&args), "user": args.user() }),
    ))
}

pub async fn manage_blog_create<D: Database>(_state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    Ok(Reply::template(
        "manage_blog_edit.html",
        json!({ "id": "", "action": "/api/blogs", "user": args.user() }),
    ))
}

pub async fn manage_blog_edit<D: Database>(_state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let id = args.string("id");
    Ok(Reply::template(
        "manage_blog_edit.html",
        json!({ "id": id, "action": format!("/api/blogs/{id}"), "user": args.user() }),
    ))
}

pub async fn manage_comments<D: Database>(_state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    Ok(Reply::template(
        "manage_comments.html",
        json!({ "page_index": page::page_index(&args), "user": args.user() }),
    ))
}

pub async fn manage_users<D: Database>(_state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    Ok(Reply::template(
        "manage_users.html",
        json!({ "page_index": page::page_index(&args), "user": args.user() }),
    ))
}

// ---- user APIs -------------------------------------------------------------

pub async fn api_users<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let total = count::<User, _>(&state.db, "", Vec::new()).await?;
    let page = Page::new(total, page::page_index(&args));
    let users: Vec<User> = if total == 0 {
        Vec::new()
    } else {
        find_where(&state.db, "", Vec::new(), Some("`created_at` DESC"), Some((page.offset, page.limit)))
            .await?
    };

    Ok(Reply::Json(json!({
        "page": page,
        "users": users.iter().map(user_json).collect::<Vec<_>>(),
    })))
}

pub async fn api_register<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let name = non_empty(&args, "name")?;
    let email = args.string("email").trim().to_lowercase();
    let passwd = args.string("passwd");

    if !RE_EMAIL.is_match(&email) {
        return Err(ApiError::value_invalid("email", "Invalid email.").into());
    }
    if passwd.len() < MIN_PASSWD_LEN {
        return Err(ApiError::value_invalid("passwd", "Password is too short.").into());
    }

    let existing: Vec<User> = find_where(&state.db, "`email` = ?", vec![json!(email)], None, None).await?;
    if !existing.is_empty() {
        return Err(ApiError::new("register:failed", "email", "Email is already in use.").into());
    }

    let user_id = next_id();
    let digest = session::password_digest(&user_id, &passwd);

    let mut user = User::new();
    user.set("id", user_id.clone());
    user.set("email", email);
    user.set("passwd", digest.clone());
    user.set("admin", false);
    user.set("name", name);
    user.set("image", "about:blank");
    save(&state.db, &mut user).await?;
    info!(email = %user.email(), "registered user");

    json_with_cookie(user_json(&user), session_cookie(&user_id, &digest, &state.secret))
}

pub async fn api_authenticate<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let email = args.string("email").trim().to_lowercase();
    let passwd = args.string("passwd");
    if email.is_empty() {
        return Err(ApiError::value_invalid("email", "Invalid email.").into());
    }
    if passwd.is_empty() {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }

    let users: Vec<User> = find_where(&state.db, "`email` = ?", vec![json!(email)], None, None).await?;
    let user = users
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::value_invalid("email", "Email not exist."))?;

    let user_id = user.text("id");
    let digest = session::password_digest(&user_id, &passwd);
    if digest != user.passwd() {
        return Err(ApiError::value_invalid("passwd", "Invalid password.").into());
    }
    info!(email = %user.email(), "user signed in");

    json_with_cookie(user_json(&user), session_cookie(&user_id, &digest, &state.secret))
}

// ---- blog APIs -------------------------------------------------------------

pub async fn api_blogs<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let total = count::<Blog, _>(&state.db, "", Vec::new()).await?;
    let page = Page::new(total, page::page_index(&args));
    let blogs: Vec<Blog> = if total == 0 {
        Vec::new()
    } else {
        find_where(&state.db, "", Vec::new(), Some("`created_at` DESC"), Some((page.offset, page.limit)))
            .await?
    };

    Ok(Reply::Json(json!({
        "page": page,
        "blogs": blogs.iter().map(entity_json).collect::<Vec<_>>(),
    })))
}

pub async fn api_get_blog<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let id = args.string("id");
    let blog: Blog = find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("blog", "blog not found"))?;
    Ok(Reply::Json(entity_json(&blog)))
}

pub async fn api_create_blog<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let user = check_admin(&args)?;
    let name = non_empty(&args, "name")?;
    let summary = non_empty(&args, "summary")?;
    let content = non_empty(&args, "content")?;

    let mut blog = Blog::new();
    blog.set("user_id", user.id);
    blog.set("user_name", user.name);
    blog.set("user_image", user.image);
    blog.set("name", name);
    blog.set("summary", summary);
    blog.set("content", content);
    save(&state.db, &mut blog).await?;
    info!(id = %blog.text("id"), "created blog");

    Ok(Reply::Json(entity_json(&blog)))
}

pub async fn api_update_blog<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    check_admin(&args)?;
    let id = args.string("id");
    let name = non_empty(&args, "name")?;
    let summary = non_empty(&args, "summary")?;
    let content = non_empty(&args, "content")?;

    let mut blog: Blog = find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("blog", "blog not found"))?;
    blog.set("name", name);
    blog.set("summary", summary);
    blog.set("content", content);
    update(&state.db, &blog).await?;
    info!(%id, "updated blog");

    Ok(Reply::Json(entity_json(&blog)))
}

pub async fn api_delete_blog<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    check_admin(&args)?;
    let id = args.string("id");
    let blog: Blog = find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("blog", "blog not found"))?;
    remove(&state.db, &blog).await?;
    info!(%id, "deleted blog");

    Ok(Reply::Json(json!({ "id": id })))
}

// ---- comment APIs ----------------------------------------------------------

pub async fn api_comments<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let total = count::<Comment, _>(&state.db, "", Vec::new()).await?;
    let page = Page::new(total, page::page_index(&args));
    let comments: Vec<Comment> = if total == 0 {
        Vec::new()
    } else {
        find_where(&state.db, "", Vec::new(), Some("`created_at` DESC"), Some((page.offset, page.limit)))
            .await?
    };

    Ok(Reply::Json(json!({
        "page": page,
        "comments": comments.iter().map(entity_json).collect::<Vec<_>>(),
    })))
}

pub async fn api_create_comment<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    let user = check_signed_in(&args)?;
    let blog_id = args.string("id");
    let content = non_empty(&args, "content")?;

    let blog: Blog = find_by_id(&state.db, &blog_id)
        .await?
        .ok_or_else(|| ApiError::not_found("blog", "blog not found"))?;

    let mut comment = Comment::new();
    comment.set("blog_id", blog.text("id"));
    comment.set("user_id", user.id);
    comment.set("user_name", user.name);
    comment.set("user_image", user.image);
    comment.set("content", content);
    save(&state.db, &mut comment).await?;
    info!(%blog_id, "created comment");

    Ok(Reply::Json(entity_json(&comment)))
}

pub async fn api_delete_comment<D: Database>(state: Arc<AppState<D>>, args: Args) -> HandlerResult {
    check_admin(&args)?;
    let id = args.string("id");
    let comment: Comment = find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("comment", "comment not found"))?;
    remove(&state.db, &comment).await?;
    info!(%id, "deleted comment");

    Ok(Reply::Json(json!({ "id": id })))
}

pub async fn not_found_page(_args: Args) -> HandlerResult {
    Ok(Reply::StatusMessage(404, "404 Not Found".to_string()))
}

// ---- registration ----------------------------------------------------------

/// The explicit route table: every handler registered with its method, path
/// and parameter binding.
pub fn routes<D: Database + 'static>(state: &Arc<AppState<D>>) -> Result<Router, RouterBuildError> {
    use weblog_web::post;

    macro_rules! h {
        ($f:path) => {{
            let state = Arc::clone(state);
            handler_fn(move |args| $f(Arc::clone(&state), args))
        }};
    }

    Router::builder()
        .route(get("/", h!(index)).binding(Binding::new().optional("page", "1").with_request()))
        .route(get("/blog/{id}", h!(blog_detail)).binding(Binding::new().with_request()))
        .route(get("/register", h!(register_page)))
        .route(get("/signin", h!(signin_page)))
        .route(get("/signout", h!(signout)).binding(Binding::new().with_request()))
        .route(get("/manage/blogs", h!(manage_blogs)).binding(Binding::new().optional("page", "1").with_request()))
        .route(get("/manage/blogs/create", h!(manage_blog_create)).binding(Binding::new().with_request()))
        .route(get("/manage/blogs/edit", h!(manage_blog_edit)).binding(Binding::new().required("id").with_request()))
        .route(get("/manage/comments", h!(manage_comments)).binding(Binding::new().optional("page", "1").with_request()))
        .route(get("/manage/users", h!(manage_users)).binding(Binding::new().optional("page", "1").with_request()))
        .route(get("/api/users", h!(api_users)).binding(Binding::new().optional("page", "1")))
        .route(
            post("/api/users", h!(api_register))
                .binding(Binding::new().required("name").required("email").required("passwd")),
        )
        .route(
            post("/api/authenticate", h!(api_authenticate))
                .binding(Binding::new().required("email").required("passwd")),
        )
        .route(get("/api/blogs", h!(api_blogs)).binding(Binding::new().optional("page", "1")))
        .route(get("/api/blogs/{id}", h!(api_get_blog)))
        .route(
            post("/api/blogs", h!(api_create_blog)).binding(
                Binding::new().required("name").required("summary").required("content").with_request(),
            ),
        )
        .route(
            post("/api/blogs/{id}", h!(api_update_blog)).binding(
                Binding::new().required("name").required("summary").required("content").with_request(),
            ),
        )
        .route(post("/api/blogs/{id}/delete", h!(api_delete_blog)).binding(Binding::new().with_request()))
        .route(get("/api/comments", h!(api_comments)).binding(Binding::new().optional("page", "1")))
        .route(
            post("/api/blogs/{id}/comments", h!(api_create_comment))
                .binding(Binding::new().required("content").with_request()),
        )
        .route(post("/api/comments/{id}/delete", h!(api_delete_comment)).binding(Binding::new().with_request()))
        .build()
}
