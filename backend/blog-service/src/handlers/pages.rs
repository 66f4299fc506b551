/// Page handlers - the browser-facing surface
///
/// Each page responds with its template context as JSON. Writes follow the
/// post/redirect/get pattern: success and refused mutations both answer with a
/// 302, anonymous writers are sent to the login page with `next=` set, and
/// invalid forms are re-rendered with their errors.
use crate::error::{AppError, FieldErrors, Result};
use crate::handlers::forms::{CommentForm, PostForm, SearchForm, SearchQuery};
use crate::middleware::UserId;
use crate::models::Post;
use crate::services::{Mutation, PageQuery, PageRequest};
use crate::AppState;
use actix_web::{http::header, web, HttpRequest, HttpResponse};
use serde_json::json;

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Fixed prefixes first: `/{username}/` would otherwise capture them.
    cfg.route("/", web::get().to(index))
        .route("/group/", web::get().to(groups_index))
        .route("/group/{slug}/", web::get().to(group_posts))
        .route("/follow/", web::get().to(follow_index))
        .service(
            web::resource("/search/")
                .route(web::get().to(search_page))
                .route(web::post().to(search_submit)),
        )
        .service(
            web::resource("/new/")
                .route(web::get().to(new_post_form))
                .route(web::post().to(new_post)),
        )
        .route("/{username}/", web::get().to(profile))
        .route("/{username}/follow/", web::get().to(profile_follow))
        .route("/{username}/unfollow/", web::get().to(profile_unfollow))
        .route("/{username}/{post_id}/", web::get().to(post_view))
        .service(
            web::resource("/{username}/{post_id}/edit/")
                .route(web::get().to(post_edit_form))
                .route(web::post().to(post_edit)),
        )
        .route("/{username}/{post_id}/delete/", web::get().to(post_delete))
        .route("/{username}/{post_id}/comment/", web::post().to(add_comment));
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

/// Send an anonymous visitor to sign in, remembering where they were going.
fn login_redirect(state: &AppState, req: &HttpRequest) -> HttpResponse {
    let next = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.path());
    redirect(&format!(
        "{}?next={}",
        state.login_url,
        urlencoding::encode(next)
    ))
}

pub fn profile_url(username: &str) -> String {
    format!("/{}/", urlencoding::encode(username))
}

pub fn post_url(username: &str, post_id: i64) -> String {
    format!("/{}/{}/", urlencoding::encode(username), post_id)
}

fn post_link(post: &Post) -> String {
    post_url(&post.author, post.id)
}

/// Global feed
pub async fn index(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let page = state.feeds.global(PageRequest::from(&*query)).await?;
    let user_count = state.users.count().await?;
    Ok(HttpResponse::Ok().json(json!({ "page": page, "user_count": user_count })))
}

/// Posts by the authors the visitor follows
pub async fn follow_index(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };
    let page = state
        .feeds
        .follow(Some(user_id), PageRequest::from(&*query))
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "page": page })))
}

pub async fn groups_index(
    state: web::Data<AppState>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let page = state.groups.list_page(PageRequest::from(&*query)).await?;
    Ok(HttpResponse::Ok().json(json!({ "page": page })))
}

pub async fn group_posts(
    state: web::Data<AppState>,
    slug: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let feed = state
        .feeds
        .group(&slug, PageRequest::from(&*query))
        .await?;
    Ok(HttpResponse::Ok().json(feed))
}

pub async fn profile(
    state: web::Data<AppState>,
    user: Option<UserId>,
    username: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse> {
    let feed = state
        .feeds
        .profile(&username, user.map(|u| u.0), PageRequest::from(&*query))
        .await?;
    let user_count = state.users.count().await?;
    Ok(HttpResponse::Ok().json(json!({
        "author": feed.author,
        "page": feed.page,
        "following": feed.following,
        "posts_count": feed.posts_count,
        "following_count": feed.following_count,
        "followers_count": feed.followers_count,
        "user_count": user_count,
    })))
}

/// Single post with its comments
pub async fn post_view(
    state: web::Data<AppState>,
    user: Option<UserId>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse> {
    let (username, post_id) = path.into_inner();
    let post = state.posts.get_by_author(&username, post_id).await?;
    let author = state.users.get_by_username(&post.author).await?;
    let comments = state.comments.list_for_post(post.id).await?;
    let following = state
        .follows
        .is_following(user.map(|u| u.0), author.id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "author": author,
        "post": post,
        "comments": comments,
        "following": following,
    })))
}

pub async fn profile_follow(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };
    // Self-follow and repeat follows are quietly ignored here.
    let (author, _) = state.follows.follow(user_id, &username).await?;
    Ok(redirect(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    username: web::Path<String>,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };
    let (author, _) = state.follows.unfollow(user_id, &username).await?;
    Ok(redirect(&profile_url(&author.username)))
}

async fn render_post_form(
    state: &AppState,
    form: &PostForm,
    errors: Option<FieldErrors>,
    post: Option<&Post>,
) -> Result<HttpResponse> {
    let groups = state.groups.list_all().await?;
    Ok(HttpResponse::Ok().json(json!({
        "form": {
            "fields": form,
            "errors": errors.unwrap_or_default(),
        },
        "groups": groups,
        "post": post,
    })))
}

pub async fn new_post_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
) -> Result<HttpResponse> {
    if user.is_none() {
        return Ok(login_redirect(&state, &req));
    }
    render_post_form(&state, &PostForm::default(), None, None).await
}

pub async fn new_post(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    payload: web::Payload,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };

    let form = PostForm::from_request(&req, payload, state.posts.max_upload_bytes()).await?;
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return render_post_form(&state, &form, Some(errors), None).await,
    };

    match state.posts.create(Some(user_id), input).await {
        Ok(_) => Ok(redirect("/")),
        Err(AppError::Validation(errors)) => {
            render_post_form(&state, &form, Some(errors), None).await
        }
        Err(e) => Err(e),
    }
}

pub async fn post_edit_form(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };
    let (username, post_id) = path.into_inner();
    let post = state.posts.get_by_author(&username, post_id).await?;
    if post.author_id != user_id {
        return Ok(redirect(&post_link(&post)));
    }

    let form = PostForm {
        text: post.text.clone(),
        group: post.group_id.map(|id| id.to_string()).unwrap_or_default(),
        ..Default::default()
    };
    render_post_form(&state, &form, None, Some(&post)).await
}

pub async fn post_edit(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    path: web::Path<(String, i64)>,
    payload: web::Payload,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };
    let (username, post_id) = path.into_inner();
    let post = state.posts.get_by_author(&username, post_id).await?;
    let location = post_link(&post);
    if post.author_id != user_id {
        return Ok(redirect(&location));
    }

    let form = PostForm::from_request(&req, payload, state.posts.max_upload_bytes()).await?;
    let input = match form.to_input() {
        Ok(input) => input,
        Err(errors) => return render_post_form(&state, &form, Some(errors), Some(&post)).await,
    };

    match state.posts.edit(Some(user_id), post.clone(), input).await {
        Ok(Mutation::Applied(_)) | Ok(Mutation::NotOwner(_)) => Ok(redirect(&location)),
        Err(AppError::Validation(errors)) => {
            render_post_form(&state, &form, Some(errors), Some(&post)).await
        }
        Err(e) => Err(e),
    }
}

pub async fn post_delete(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };
    let (username, post_id) = path.into_inner();
    let post = state.posts.get_by_author(&username, post_id).await?;

    match state.posts.delete(Some(user_id), post).await? {
        Mutation::Applied(()) => Ok(redirect(&profile_url(&username))),
        Mutation::NotOwner(post) => Ok(redirect(&post_link(&post))),
    }
}

pub async fn add_comment(
    req: HttpRequest,
    state: web::Data<AppState>,
    user: Option<UserId>,
    path: web::Path<(String, i64)>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse> {
    let Some(UserId(user_id)) = user else {
        return Ok(login_redirect(&state, &req));
    };
    let (username, post_id) = path.into_inner();
    let post = state.posts.get_by_author(&username, post_id).await?;

    // An empty comment is dropped; the visitor lands back on the post either way.
    match state.comments.create(Some(user_id), &post, &form.text).await {
        Ok(_) | Err(AppError::Validation(_)) => Ok(redirect(&post_link(&post))),
        Err(e) => Err(e),
    }
}

pub async fn search_page(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    let q = query.q.clone().unwrap_or_default();
    let results = state.search.search(&q).await?;
    Ok(HttpResponse::Ok().json(json!({
        "form": { "search": q },
        "find_user": results.users,
        "find_post": results.posts,
    })))
}

pub async fn search_submit(
    state: web::Data<AppState>,
    form: web::Form<SearchForm>,
) -> Result<HttpResponse> {
    let results = state.search.search(&form.search).await?;
    Ok(HttpResponse::Ok().json(json!({
        "form": { "search": form.search },
        "find_user": results.users,
        "find_post": results.posts,
    })))
}
