//! REST API over HTTP: authentication, ownership and field errors

mod common;

use actix_web::http::StatusCode;
use actix_web::test;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use blog_service::handlers::api::comments::CommentResponse;
use blog_service::handlers::api::follows::FollowResponse;
use blog_service::handlers::api::posts::PostResponse;
use common::{bearer, blog_app, TestContext, SMALL_GIF};
use serde_json::{json, Value};

#[actix_web::test]
async fn reads_are_public_and_writes_need_a_token() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let post = ctx.post(&alice, "hello", None).await;
    let app = blog_app!(ctx.state);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/posts/{}/", post.id))
        .to_request();
    let fetched: PostResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched.text, "hello");
    assert_eq!(fetched.author, "alice");

    let req = test::TestRequest::post()
        .uri("/api/v1/posts/")
        .set_json(json!({"text": "anonymous"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get().uri("/api/v1/follow/").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn invalid_bearer_token_is_rejected() {
    let ctx = TestContext::new();
    let app = blog_app!(ctx.state);

    let req = test::TestRequest::get()
        .uri("/api/v1/posts/")
        .insert_header(("Authorization", "Bearer forged.token.value"))
        .to_request();
    let status = match test::try_call_service(&app, req).await {
        Ok(resp) => resp.status(),
        Err(err) => err.as_response_error().status_code(),
    };
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn create_stamps_the_caller_as_author() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let group = ctx.group("test-slug").await;
    let app = blog_app!(ctx.state);

    let image = format!("data:image/gif;base64,{}", STANDARD.encode(SMALL_GIF));
    let req = test::TestRequest::post()
        .uri("/api/v1/posts/")
        .insert_header(bearer(&alice))
        .set_json(json!({
            "text": "  posted over the api  ",
            "group": group.id,
            "image": image,
            "author": "somebody-else",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let created: PostResponse = test::read_body_json(resp).await;
    assert_eq!(created.author, "alice");
    assert_eq!(created.text, "posted over the api");
    assert_eq!(created.group, Some(group.id));
    let image = created.image.expect("image stored");
    assert!(ctx.media_dir.path().join(image).exists());
}

#[actix_web::test]
async fn invalid_post_payload_reports_field_errors() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let app = blog_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts/")
        .insert_header(bearer(&alice))
        .set_json(json!({"text": "", "group": 424242}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["text"].is_array());
    assert!(body["group"].is_array());

    let req = test::TestRequest::post()
        .uri("/api/v1/posts/")
        .insert_header(bearer(&alice))
        .set_json(json!({"text": "with a broken image", "image": "%%%not-base64%%%"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["image"].is_array());
}

#[actix_web::test]
async fn only_the_author_may_change_a_post() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let mallory = ctx.user("mallory").await;
    let post = ctx.post(&alice, "original", None).await;
    let app = blog_app!(ctx.state);
    let uri = format!("/api/v1/posts/{}/", post.id);

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(bearer(&mallory))
        .set_json(json!({"text": "defaced"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(&mallory))
        .set_json(json!({"text": "defaced"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&mallory))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    assert_eq!(ctx.state.posts.get(post.id).await.unwrap(), post);

    let req = test::TestRequest::delete()
        .uri(&uri)
        .insert_header(bearer(&alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&uri).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn patch_merges_and_put_replaces() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let group = ctx.group("test-slug").await;
    let post = ctx.post(&alice, "original", Some(&group)).await;
    let app = blog_app!(ctx.state);
    let uri = format!("/api/v1/posts/{}/", post.id);

    let req = test::TestRequest::patch()
        .uri(&uri)
        .insert_header(bearer(&alice))
        .set_json(json!({"text": "patched"}))
        .to_request();
    let patched: PostResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(patched.text, "patched");
    assert_eq!(patched.group, Some(group.id));

    let req = test::TestRequest::put()
        .uri(&uri)
        .insert_header(bearer(&alice))
        .set_json(json!({"text": "replaced"}))
        .to_request();
    let replaced: PostResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(replaced.text, "replaced");
    assert_eq!(replaced.group, None);
    assert_eq!(replaced.author, "alice");
    assert_eq!(replaced.id, post.id);
}

#[actix_web::test]
async fn list_filters_by_author_and_group() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;
    let group = ctx.group("test-slug").await;
    ctx.post(&alice, "alice plain", None).await;
    ctx.post(&alice, "alice grouped", Some(&group)).await;
    ctx.post(&bob, "bob grouped", Some(&group)).await;
    let app = blog_app!(ctx.state);

    let cases = [
        ("/api/v1/posts/", 3),
        ("/api/v1/posts/?author=alice", 2),
        ("/api/v1/posts/?group=test-slug", 2),
        ("/api/v1/posts/?author=bob&group=test-slug", 1),
        ("/api/v1/posts/?author=nobody", 0),
        ("/api/v1/posts/?group=missing", 0),
    ];
    for (uri, expected) in cases {
        let req = test::TestRequest::get().uri(uri).to_request();
        let posts: Vec<PostResponse> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(posts.len(), expected, "GET {}", uri);
    }
}

#[actix_web::test]
async fn comment_lifecycle_respects_authorship() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;
    let post = ctx.post(&alice, "discuss", None).await;
    let app = blog_app!(ctx.state);
    let list_uri = format!("/api/v1/posts/{}/comments/", post.id);

    let req = test::TestRequest::post()
        .uri(&list_uri)
        .insert_header(bearer(&bob))
        .set_json(json!({"text": "nice post"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let comment: CommentResponse = test::read_body_json(resp).await;
    assert_eq!(comment.author, "bob");
    assert_eq!(comment.post, post.id);

    let item_uri = format!("{}{}/", list_uri, comment.id);

    let req = test::TestRequest::patch()
        .uri(&item_uri)
        .insert_header(bearer(&alice))
        .set_json(json!({"text": "hijacked"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::put()
        .uri(&item_uri)
        .insert_header(bearer(&bob))
        .set_json(json!({"text": "nice post, edited"}))
        .to_request();
    let edited: CommentResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(edited.text, "nice post, edited");

    let req = test::TestRequest::get().uri(&list_uri).to_request();
    let listed: Vec<CommentResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed.len(), 1);

    let req = test::TestRequest::delete()
        .uri(&item_uri)
        .insert_header(bearer(&alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&item_uri)
        .insert_header(bearer(&bob))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri(&item_uri).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn comments_on_missing_post_are_not_found() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let app = blog_app!(ctx.state);

    let req = test::TestRequest::get()
        .uri("/api/v1/posts/999/comments/")
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/v1/posts/999/comments/")
        .insert_header(bearer(&alice))
        .set_json(json!({"text": "hello?"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn follow_rejects_self_duplicate_and_unknown_authors() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    ctx.user("bob").await;
    let app = blog_app!(ctx.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/follow/")
        .insert_header(bearer(&alice))
        .set_json(json!({"author": "bob"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let follow: FollowResponse = test::read_body_json(resp).await;
    assert_eq!(follow.user, "alice");
    assert_eq!(follow.author, "bob");

    for payload in [
        json!({"author": "bob"}),
        json!({"author": "alice"}),
        json!({"author": "nobody"}),
        json!({}),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/v1/follow/")
            .insert_header(bearer(&alice))
            .set_json(&payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload {}", payload);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["author"].is_array(), "payload {}", payload);
    }

    assert_eq!(ctx.state.follows.following_count(alice.id).await.unwrap(), 1);
}

#[actix_web::test]
async fn follow_list_is_scoped_to_caller_and_searchable() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let bob = ctx.user("bob").await;
    ctx.user("carol").await;
    ctx.user("caroline").await;
    ctx.state.follows.follow(alice.id, "carol").await.unwrap();
    ctx.state.follows.follow(alice.id, "caroline").await.unwrap();
    ctx.state.follows.follow(alice.id, "bob").await.unwrap();
    ctx.state.follows.follow(bob.id, "carol").await.unwrap();
    let app = blog_app!(ctx.state);

    let req = test::TestRequest::get()
        .uri("/api/v1/follow/")
        .insert_header(bearer(&alice))
        .to_request();
    let all: Vec<FollowResponse> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|f| f.user == "alice"));

    let req = test::TestRequest::get()
        .uri("/api/v1/follow/?search=CAROL")
        .insert_header(bearer(&alice))
        .to_request();
    let found: Vec<FollowResponse> = test::call_and_read_body_json(&app, req).await;
    let mut authors: Vec<&str> = found.iter().map(|f| f.author.as_str()).collect();
    authors.sort_unstable();
    assert_eq!(authors, vec!["carol", "caroline"]);

    let req = test::TestRequest::delete()
        .uri("/api/v1/follow/bob/")
        .insert_header(bearer(&alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::delete()
        .uri("/api/v1/follow/bob/")
        .insert_header(bearer(&alice))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn groups_are_read_only() {
    let ctx = TestContext::new();
    let alice = ctx.user("alice").await;
    let group = ctx.group("test-slug").await;
    let app = blog_app!(ctx.state);

    let req = test::TestRequest::get().uri("/api/v1/groups/").to_request();
    let groups: Vec<Value> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["slug"], "test-slug");

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/groups/{}/", group.id))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["title"], group.title);

    let req = test::TestRequest::post()
        .uri("/api/v1/groups/")
        .insert_header(bearer(&alice))
        .set_json(json!({"slug": "new", "title": "New"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(ctx.state.groups.list_all().await.unwrap().len(), 1);
}
